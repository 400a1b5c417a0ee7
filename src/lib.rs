//! FuelOps API Library
//!
//! Stock transfers between filling stations, reconciled against a locked,
//! journaled stock ledger.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{middleware, response::Json, routing::get, Router};
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{HealthHandlerState, StockTransferHandlerState};
use crate::services::stock_transfers::StockTransferService;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub stock_transfers: StockTransferService,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        audit: audit::AuditSender,
    ) -> Self {
        let stock_transfers = StockTransferService::from_config(db.clone(), audit, &config);
        Self {
            db,
            config,
            stock_transfers,
        }
    }
}

impl StockTransferHandlerState for AppState {
    fn stock_transfer_service(&self) -> &StockTransferService {
        &self.stock_transfers
    }
}

impl HealthHandlerState for AppState {
    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .nest(
            "/stock-transfers-product",
            handlers::stock_transfers::stock_transfer_routes::<AppState>(),
        )
}

async fn api_status() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "fuelops-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if cfg.should_allow_permissive_cors() {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                ::tracing::warn!(origin = o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(origins)
}

/// Full application router: versioned API, health probes, Swagger UI and
/// the request-id, tracing and CORS layers.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .nest("/api/v1", api_v1_routes())
        .nest("/health", handlers::health::health_routes::<AppState>())
        .merge(openapi::swagger_ui())
        .with_state(state)
        .layer(crate::tracing::configure_http_tracing())
        .layer(middleware::from_fn(crate::tracing::request_id_middleware))
        .layer(cors)
}

pub mod prelude {
    pub use crate::audit::{AuditEntry, AuditSender};
    pub use crate::auth::Actor;
    pub use crate::errors::*;
    pub use crate::services::stock_transfers::StockTransferService;
    pub use crate::services::transfer_command::{TransferCommand, TransferRequest, TransferRules};
    pub use crate::AppState;
}
