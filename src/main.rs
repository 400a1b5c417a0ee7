use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tracing::{error, info, warn};

use fuelops_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::handlers::health::init_start_time();

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;
    if cfg.auto_migrate {
        if cfg.is_production() {
            warn!("auto_migrate is enabled in production");
        }
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Audit entries are written off the request path
    let (audit_sender, audit_rx) = api::audit::AuditSender::channel(cfg.audit_channel_capacity);
    let audit_sink: Arc<dyn api::audit::AuditSink> = if cfg.audit_log_only {
        Arc::new(api::audit::TracingAuditSink)
    } else {
        Arc::new(api::audit::DatabaseAuditSink::new(db_arc.clone()))
    };
    let audit_worker = tokio::spawn(api::audit::process_audit_log(audit_rx, audit_sink));

    let app_state = api::AppState::new(db_arc.clone(), cfg.clone(), audit_sender);
    let app = api::build_router(app_state).layer(CompressionLayer::new());

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;
    info!(%addr, environment = %cfg.environment, "fuelops-api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and with it every AuditSender) is gone; drain what is queued.
    if let Err(e) = audit_worker.await {
        warn!("audit worker ended abnormally: {}", e);
    }

    if let Ok(pool) = Arc::try_unwrap(db_arc) {
        api::db::close_pool(pool).await?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
