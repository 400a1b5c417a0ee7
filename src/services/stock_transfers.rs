use crate::{
    audit::{AuditEntry, AuditSender},
    auth::Actor,
    config::AppConfig,
    entities::{
        filling_history::{self, TransType},
        product::{self, Entity as ProductEntity},
        product_transfer::{self, Entity as ProductTransferEntity, TransferStatus},
        station::{self, Entity as StationEntity},
    },
    errors::ServiceError,
    services::{
        reconciliation::{LedgerKey, Movement, TransferEffect},
        stock_ledger::{self, Diagnostic},
        transfer_command::{TransferCommand, TransferRules},
        transfer_journal::{self, JournalContext},
    },
};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    EntityTrait, IntoActiveModel, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

const AUDIT_PAGE: &str = "Stock Transfer";
const AUDIT_SECTION: &str = "Product Transfer";
const AUDIT_RECORD_TYPE: &str = "product_transfers";

/// Human-facing code of a transfer, as shown on the back-office screens.
pub fn transfer_code(id: i32) -> String {
    format!("PT-{}", id)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StationOption {
    pub id: i32,
    pub station_name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductOption {
    pub id: i32,
    pub pname: String,
}

/// Lookup data for building the transfer form.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransferFormLookups {
    pub stations: Vec<StationOption>,
    pub products: Vec<ProductOption>,
}

/// A transfer joined with the names of the stations and products it references.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransferDetails {
    pub id: i32,
    pub unique_code: String,
    pub station_from: i32,
    pub station_from_name: Option<String>,
    pub station_to: i32,
    pub station_to_name: Option<String>,
    pub product_id: i32,
    pub product_name: Option<String>,
    pub product_to: Option<i32>,
    pub product_to_name: Option<String>,
    pub transfer_quantity: Decimal,
    pub status: TransferStatus,
    pub remarks: Option<String>,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StockLevelView {
    pub station_id: i32,
    pub product_id: i32,
    pub quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JournalEntryView {
    pub id: i32,
    pub station_id: i32,
    pub product_id: i32,
    pub direction: TransType,
    pub stock_before: Decimal,
    pub delta_quantity: Decimal,
    pub stock_after: Decimal,
    pub occurred_at: DateTime<Utc>,
    pub created_by: Option<i32>,
    pub reversal: bool,
}

impl From<filling_history::Model> for JournalEntryView {
    fn from(m: filling_history::Model) -> Self {
        Self {
            id: m.id,
            station_id: m.fs_id,
            product_id: m.product_id,
            direction: m.trans_type,
            stock_before: m.current_stock,
            delta_quantity: m.filling_qty,
            stock_after: m.available_stock,
            occurred_at: m.filling_date,
            created_by: m.created_by,
            reversal: m.reversal,
        }
    }
}

/// Ledger effect a stored transfer had when it was last applied.
fn recorded_effect(record: &product_transfer::Model) -> TransferEffect {
    let destination = match record.product_to {
        Some(product_to) if record.station_from == record.station_to => {
            LedgerKey::new(record.station_to, product_to)
        }
        _ => LedgerKey::new(record.station_to, record.product_id),
    };
    TransferEffect {
        source: LedgerKey::new(record.station_from, record.product_id),
        destination,
        quantity: record.transfer_quantity,
    }
}

fn storage(err: sea_orm::DbErr) -> ServiceError {
    ServiceError::transaction(err)
}

/// Transfer reconciliation engine.
///
/// Every create and edit runs in one database transaction that locks the
/// affected ledger rows, so either all ledger, journal and transfer writes
/// land or none do. Audit entries are emitted only after commit.
#[derive(Clone)]
pub struct StockTransferService {
    db: Arc<DatabaseConnection>,
    audit: AuditSender,
    rules: TransferRules,
    transaction_timeout: Duration,
}

impl StockTransferService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        audit: AuditSender,
        rules: TransferRules,
        transaction_timeout: Duration,
    ) -> Self {
        Self {
            db,
            audit,
            rules,
            transaction_timeout,
        }
    }

    pub fn from_config(db: Arc<DatabaseConnection>, audit: AuditSender, cfg: &AppConfig) -> Self {
        Self::new(db, audit, TransferRules::from(cfg), cfg.transaction_timeout())
    }

    pub fn rules(&self) -> &TransferRules {
        &self.rules
    }

    /// Runs `body` inside a transaction bounded by the configured timeout.
    /// The transaction is rolled back when `body` fails or time runs out.
    async fn in_transaction<T, F, Fut>(&self, body: F) -> Result<T, ServiceError>
    where
        F: FnOnce(DatabaseTransaction) -> Fut,
        Fut: Future<Output = Result<(T, DatabaseTransaction), ServiceError>>,
    {
        let limit = self.transaction_timeout;
        let work = async {
            let txn = self.db.begin().await.map_err(storage)?;
            match txn.get_database_backend() {
                DbBackend::Postgres => {
                    txn.execute_unprepared(&format!(
                        "SET LOCAL statement_timeout = {}",
                        limit.as_millis()
                    ))
                    .await
                    .map_err(storage)?;
                }
                DbBackend::Sqlite => stock_ledger::reserve_writer(&txn)
                    .await
                    .map_err(storage)?,
                _ => {}
            }
            let (value, txn) = body(txn).await?;
            txn.commit().await.map_err(storage)?;
            Ok(value)
        };

        match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::TransactionError(format!(
                "transaction exceeded {}ms",
                limit.as_millis()
            ))),
        }
    }

    fn record_outcome<T>(
        &self,
        operation: &'static str,
        started: Instant,
        result: &Result<T, ServiceError>,
    ) {
        histogram!(
            "fuelops.transfers.duration_seconds",
            started.elapsed().as_secs_f64(),
            "operation" => operation
        );
        match result {
            Ok(_) if operation == "create" => {
                counter!("fuelops.transfers.created", 1);
            }
            Ok(_) => {
                counter!("fuelops.transfers.edited", 1);
            }
            Err(e) => {
                counter!("fuelops.transfers.failed", 1, "reason" => e.kind(), "operation" => operation);
                match e {
                    ServiceError::TransactionError(_) | ServiceError::InternalError(_) => {
                        error!(operation, error = %e, "transfer rolled back")
                    }
                    _ => warn!(operation, error = %e, "transfer rejected"),
                }
            }
        }
    }

    fn audit_entry(
        &self,
        action: &str,
        actor: &Actor,
        record_id: i32,
        old_value: Option<serde_json::Value>,
        new_value: Option<serde_json::Value>,
        remarks: Option<String>,
    ) -> AuditEntry {
        AuditEntry {
            page: AUDIT_PAGE.to_string(),
            unique_code: Some(transfer_code(record_id)),
            section: AUDIT_SECTION.to_string(),
            user_id: actor.user_id,
            user_name: actor.user_name.clone(),
            action: action.to_string(),
            remarks,
            old_value,
            new_value,
            record_type: AUDIT_RECORD_TYPE.to_string(),
            record_id: Some(record_id),
            occurred_at: Utc::now(),
        }
    }

    /// Creates a transfer: debits the source, credits the destination,
    /// journals both movements and stores the transfer record.
    #[instrument(
        skip(self, command, actor),
        fields(
            station_from = command.station_from,
            station_to = command.station_to,
            product_id = command.product_id,
            quantity = %command.quantity
        )
    )]
    pub async fn create_transfer(
        &self,
        command: TransferCommand,
        actor: &Actor,
    ) -> Result<product_transfer::Model, ServiceError> {
        let started = Instant::now();
        let result = self
            .in_transaction(|txn| async move {
                let record = create_in_txn(&txn, &command, actor).await?;
                Ok((record, txn))
            })
            .await;
        self.record_outcome("create", started, &result);

        let record = result?;
        info!(
            transfer_id = record.id,
            status = %record.status,
            "stock transfer created"
        );

        let entry = self.audit_entry(
            "Create",
            actor,
            record.id,
            None,
            serde_json::to_value(&record).ok(),
            record.remarks.clone(),
        );
        self.audit.emit(entry);

        Ok(record)
    }

    /// Replaces a transfer: reverses the effect it had, then applies the new one.
    #[instrument(
        skip(self, command, actor),
        fields(
            station_from = command.station_from,
            station_to = command.station_to,
            product_id = command.product_id,
            quantity = %command.quantity
        )
    )]
    pub async fn edit_transfer(
        &self,
        id: i32,
        command: TransferCommand,
        actor: &Actor,
    ) -> Result<product_transfer::Model, ServiceError> {
        let started = Instant::now();
        let result = self
            .in_transaction(|txn| async move {
                let outcome = edit_in_txn(&txn, id, &command, actor).await?;
                Ok((outcome, txn))
            })
            .await;
        self.record_outcome("edit", started, &result);

        let (old, new) = result?;
        info!(
            transfer_id = new.id,
            old_quantity = %old.transfer_quantity,
            new_quantity = %new.transfer_quantity,
            status = %new.status,
            "stock transfer edited"
        );

        let entry = self.audit_entry(
            "Edit",
            actor,
            new.id,
            serde_json::to_value(&old).ok(),
            serde_json::to_value(&new).ok(),
            new.remarks.clone(),
        );
        self.audit.emit(entry);

        Ok(new)
    }

    #[instrument(skip(self))]
    pub async fn form_lookups(&self) -> Result<TransferFormLookups, ServiceError> {
        let db = &*self.db;
        let stations = StationEntity::find()
            .order_by_asc(station::Column::StationName)
            .all(db)
            .await?
            .into_iter()
            .map(|s| StationOption {
                id: s.id,
                station_name: s.station_name,
            })
            .collect();
        let products = ProductEntity::find()
            .order_by_asc(product::Column::Pname)
            .all(db)
            .await?
            .into_iter()
            .map(|p| ProductOption {
                id: p.id,
                pname: p.pname,
            })
            .collect();

        Ok(TransferFormLookups { stations, products })
    }

    #[instrument(skip(self))]
    pub async fn get_transfer(&self, id: i32) -> Result<TransferDetails, ServiceError> {
        let db = &*self.db;
        let record = ProductTransferEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("transfer {} not found", id)))?;

        let station_name = |station_id: i32| async move {
            StationEntity::find_by_id(station_id)
                .one(db)
                .await
                .map(|s| s.map(|s| s.station_name))
        };
        let product_name = |product_id: i32| async move {
            ProductEntity::find_by_id(product_id)
                .one(db)
                .await
                .map(|p| p.map(|p| p.pname))
        };

        let station_from_name = station_name(record.station_from).await?;
        let station_to_name = station_name(record.station_to).await?;
        let product_name_value = product_name(record.product_id).await?;
        let product_to_name = match record.product_to {
            Some(product_to) => product_name(product_to).await?,
            None => None,
        };

        Ok(TransferDetails {
            id: record.id,
            unique_code: transfer_code(record.id),
            station_from: record.station_from,
            station_from_name,
            station_to: record.station_to,
            station_to_name,
            product_id: record.product_id,
            product_name: product_name_value,
            product_to: record.product_to,
            product_to_name,
            transfer_quantity: record.transfer_quantity,
            status: record.status,
            remarks: record.remarks,
            created_by: record.created_by,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    #[instrument(skip(self))]
    pub async fn stock_level(
        &self,
        station_id: i32,
        product_id: i32,
    ) -> Result<StockLevelView, ServiceError> {
        let key = LedgerKey::new(station_id, product_id);
        let row = stock_ledger::get(&*self.db, key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no stock for {}", key)))?;

        Ok(StockLevelView {
            station_id: row.fs_id,
            product_id: row.product,
            quantity: row.stock,
            updated_at: row.updated_at,
        })
    }

    #[instrument(skip(self))]
    pub async fn history(&self, transfer_id: i32) -> Result<Vec<JournalEntryView>, ServiceError> {
        let db = &*self.db;
        if ProductTransferEntity::find_by_id(transfer_id)
            .one(db)
            .await?
            .is_none()
        {
            return Err(ServiceError::NotFound(format!(
                "transfer {} not found",
                transfer_id
            )));
        }

        let entries = transfer_journal::for_transfer(db, transfer_id).await?;
        Ok(entries.into_iter().map(JournalEntryView::from).collect())
    }
}

async fn create_in_txn(
    txn: &DatabaseTransaction,
    command: &TransferCommand,
    actor: &Actor,
) -> Result<product_transfer::Model, ServiceError> {
    let effect = command.effect();

    let mut book = stock_ledger::lock_keys(txn, effect.keys(), &[effect.destination])
        .await
        .map_err(storage)?;
    let movements = book.apply(&effect)?;

    let now = Utc::now();
    let record = product_transfer::ActiveModel {
        station_from: Set(command.station_from),
        station_to: Set(command.station_to),
        product_id: Set(command.product_id),
        product_to: Set(command.product_to()),
        transfer_quantity: Set(command.quantity),
        status: Set(command.status.unwrap_or_default()),
        remarks: Set(command.remarks.clone()),
        created_by: Set(actor.user_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await
    .map_err(storage)?;

    let diagnostic = Diagnostic {
        message: Some(format!("Stock transfer {}", transfer_code(record.id))),
        remark: command.remarks.clone(),
    };
    stock_ledger::write_changes(txn, &book.changes(), &diagnostic)
        .await
        .map_err(storage)?;

    let ctx = JournalContext {
        transfer_id: record.id,
        created_by: actor.user_id,
        occurred_at: now,
    };
    transfer_journal::append_all(txn, &movements, &ctx)
        .await
        .map_err(storage)?;

    Ok(record)
}

async fn edit_in_txn(
    txn: &DatabaseTransaction,
    id: i32,
    command: &TransferCommand,
    actor: &Actor,
) -> Result<(product_transfer::Model, product_transfer::Model), ServiceError> {
    let query = ProductTransferEntity::find_by_id(id);
    let query = match txn.get_database_backend() {
        DbBackend::Sqlite => query,
        _ => query.lock_exclusive(),
    };
    let old = query
        .one(txn)
        .await
        .map_err(storage)?
        .ok_or_else(|| ServiceError::NotFound(format!("transfer {} not found", id)))?;

    let old_effect = recorded_effect(&old);
    let new_effect = command.effect();

    let mut book = stock_ledger::lock_keys(
        txn,
        old_effect.keys().into_iter().chain(new_effect.keys()),
        &[new_effect.destination],
    )
    .await
    .map_err(storage)?;

    let mut movements: Vec<Movement> = book.reverse(&old_effect)?;
    movements.extend(book.apply(&new_effect)?);

    let now = Utc::now();
    let mut active = old.clone().into_active_model();
    active.station_from = Set(command.station_from);
    active.station_to = Set(command.station_to);
    active.product_id = Set(command.product_id);
    active.product_to = Set(command.product_to());
    active.transfer_quantity = Set(command.quantity);
    active.status = Set(command.status.unwrap_or(old.status));
    active.remarks = Set(command.remarks.clone());
    active.updated_at = Set(now);
    let new = active.update(txn).await.map_err(storage)?;

    let diagnostic = Diagnostic {
        message: Some(format!("Stock transfer {} edited", transfer_code(id))),
        remark: command.remarks.clone(),
    };
    stock_ledger::write_changes(txn, &book.changes(), &diagnostic)
        .await
        .map_err(storage)?;

    let ctx = JournalContext {
        transfer_id: id,
        created_by: actor.user_id,
        occurred_at: now,
    };
    transfer_journal::append_all(txn, &movements, &ctx)
        .await
        .map_err(storage)?;

    Ok((old, new))
}
