#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use fuelops_api::{
    audit::{AuditEntry, AuditSender},
    config::AppConfig,
    db,
    entities::{filling_history, product, product_transfer, station},
    services::{
        reconciliation::LedgerKey,
        stock_ledger::{self, Diagnostic},
        stock_transfers::StockTransferService,
        transfer_command::TransferRules,
    },
    AppState,
};

pub const STATION_A: i32 = 1;
pub const STATION_B: i32 = 2;
pub const STATION_C: i32 = 3;
pub const DIESEL: i32 = 1;
pub const OIL_40: i32 = 2;
pub const OIL_60: i32 = 3;
pub const PETROL: i32 = 4;

/// Helper harness backed by a private SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub db: Arc<DatabaseConnection>,
    audit_rx: mpsc::Receiver<AuditEntry>,
    _dir: Option<TempDir>,
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.auto_migrate = true;
    // One connection keeps the in-memory database alive and shared.
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg
}

impl TestApp {
    /// Construct a new test application with a migrated, seeded in-memory database.
    pub async fn new() -> Self {
        Self::with_config(test_config(), None).await
    }

    /// Same as [`TestApp::new`], but on a database file with a pool of
    /// `connections`, so transactions really run side by side.
    pub async fn file_backed(connections: u32) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut cfg = test_config();
        cfg.database_url = format!("sqlite://{}?mode=rwc", dir.path().join("fuelops.db").display());
        cfg.db_max_connections = connections;
        cfg.db_min_connections = 1;
        Self::with_config(cfg, Some(dir)).await
    }

    async fn with_config(cfg: AppConfig, dir: Option<TempDir>) -> Self {
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db = Arc::new(pool);
        seed_reference_data(&db).await;

        let (audit, audit_rx) = AuditSender::channel(64);
        let state = AppState::new(db.clone(), cfg, audit);
        let router = fuelops_api::build_router(state.clone());

        Self {
            router,
            state,
            db,
            audit_rx,
            _dir: dir,
        }
    }

    pub fn service(&self) -> &StockTransferService {
        &self.state.stock_transfers
    }

    /// A second service over the same database with a different transaction budget.
    pub fn service_with_timeout(&self, timeout: Duration) -> StockTransferService {
        let (audit, _rx) = AuditSender::channel(1);
        StockTransferService::new(self.db.clone(), audit, TransferRules::default(), timeout)
    }

    pub async fn set_stock(&self, station_id: i32, product_id: i32, quantity: Decimal) {
        stock_ledger::upsert(
            self.db.as_ref(),
            LedgerKey::new(station_id, product_id),
            quantity,
            &Diagnostic::default(),
        )
        .await
        .expect("seed stock");
    }

    pub async fn stock(&self, station_id: i32, product_id: i32) -> Option<Decimal> {
        stock_ledger::get(self.db.as_ref(), LedgerKey::new(station_id, product_id))
            .await
            .expect("read stock")
            .map(|row| row.stock)
    }

    pub async fn transfers(&self) -> Vec<product_transfer::Model> {
        product_transfer::Entity::find()
            .all(self.db.as_ref())
            .await
            .expect("read transfers")
    }

    pub async fn journal(&self) -> Vec<filling_history::Model> {
        filling_history::Entity::find()
            .all(self.db.as_ref())
            .await
            .expect("read journal")
    }

    pub async fn execute(&self, sql: &str) {
        self.db
            .execute_unprepared(sql)
            .await
            .expect("execute test sql");
    }

    /// Audit entries emitted so far, in order.
    pub fn drain_audit(&mut self) -> Vec<AuditEntry> {
        let mut entries = Vec::new();
        while let Ok(entry) = self.audit_rx.try_recv() {
            entries.push(entry);
        }
        entries
    }

    /// Send a request through the full router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

async fn seed_reference_data(db: &DatabaseConnection) {
    for (id, name) in [
        (STATION_A, "Central Depot"),
        (STATION_B, "Northgate Station"),
        (STATION_C, "Riverside Station"),
    ] {
        station::ActiveModel {
            id: Set(id),
            station_name: Set(name.to_string()),
        }
        .insert(db)
        .await
        .expect("seed station");
    }

    for (id, name) in [
        (DIESEL, "Diesel"),
        (OIL_40, "Industrial Oil 40"),
        (OIL_60, "Industrial Oil 60"),
        (PETROL, "Petrol"),
    ] {
        product::ActiveModel {
            id: Set(id),
            pname: Set(name.to_string()),
        }
        .insert(db)
        .await
        .expect("seed product");
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("response body is json")
}
