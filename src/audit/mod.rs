//! Post-commit audit trail.
//!
//! Services hand an [`AuditEntry`] to an [`AuditSender`] after their
//! transaction commits. The sender never blocks and never fails the caller;
//! a background task started with [`process_audit_log`] drains the channel
//! into an [`AuditSink`].

use crate::entities::audit_log;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

/// One compliance record, shaped after the back-office audit log table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub page: String,
    pub unique_code: Option<String>,
    pub section: String,
    pub user_id: Option<i32>,
    pub user_name: Option<String>,
    pub action: String,
    pub remarks: Option<String>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub record_type: String,
    pub record_id: Option<i32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AuditSender {
    sender: mpsc::Sender<AuditEntry>,
}

impl AuditSender {
    pub fn new(sender: mpsc::Sender<AuditEntry>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with the receiver to pass to [`process_audit_log`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AuditEntry>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Queues an entry without waiting. Returns whether it was accepted.
    pub fn emit(&self, entry: AuditEntry) -> bool {
        match self.sender.try_send(entry) {
            Ok(()) => true,
            Err(TrySendError::Full(entry)) => {
                warn!(
                    action = %entry.action,
                    record_id = ?entry.record_id,
                    "audit channel full, dropping entry"
                );
                counter!("fuelops.audit.dropped", 1, "reason" => "full");
                false
            }
            Err(TrySendError::Closed(entry)) => {
                error!(
                    action = %entry.action,
                    record_id = ?entry.record_id,
                    "audit channel closed, dropping entry"
                );
                counter!("fuelops.audit.dropped", 1, "reason" => "closed");
                false
            }
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> Result<(), DbErr>;
}

/// Writes entries to the `audit_logs` table.
pub struct DatabaseAuditSink {
    db: Arc<DatabaseConnection>,
}

impl DatabaseAuditSink {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn to_text(value: &Option<serde_json::Value>) -> Option<String> {
    value.as_ref().map(|v| v.to_string())
}

#[async_trait]
impl AuditSink for DatabaseAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), DbErr> {
        let row = audit_log::ActiveModel {
            page: Set(entry.page.clone()),
            unique_code: Set(entry.unique_code.clone()),
            section: Set(entry.section.clone()),
            user_id: Set(entry.user_id),
            user_name: Set(entry.user_name.clone()),
            action: Set(entry.action.clone()),
            remarks: Set(entry.remarks.clone()),
            old_value: Set(to_text(&entry.old_value)),
            new_value: Set(to_text(&entry.new_value)),
            record_type: Set(entry.record_type.clone()),
            record_id: Set(entry.record_id),
            created_at: Set(entry.occurred_at),
            ..Default::default()
        };
        row.insert(self.db.as_ref()).await?;
        Ok(())
    }
}

/// Emits entries as structured log lines. Used when no audit table is wanted.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), DbErr> {
        info!(
            target: "audit",
            page = %entry.page,
            section = %entry.section,
            action = %entry.action,
            unique_code = ?entry.unique_code,
            user_id = ?entry.user_id,
            record_type = %entry.record_type,
            record_id = ?entry.record_id,
            "audit"
        );
        Ok(())
    }
}

/// Drains the audit channel until every sender is dropped.
pub async fn process_audit_log(mut rx: mpsc::Receiver<AuditEntry>, sink: Arc<dyn AuditSink>) {
    info!("Starting audit log processing loop");

    while let Some(entry) = rx.recv().await {
        debug!(action = %entry.action, record_id = ?entry.record_id, "writing audit entry");
        if let Err(e) = sink.record(&entry).await {
            error!(
                action = %entry.action,
                record_id = ?entry.record_id,
                error = %e,
                "Failed to write audit entry"
            );
            counter!("fuelops.audit.failed", 1);
        }
    }

    info!("Audit log processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    fn entry(action: &str) -> AuditEntry {
        AuditEntry {
            page: "Stock Transfer".into(),
            unique_code: Some("PT-1".into()),
            section: "Product Transfer".into(),
            user_id: Some(3),
            user_name: Some("clerk".into()),
            action: action.into(),
            remarks: None,
            old_value: None,
            new_value: Some(serde_json::json!({"id": 1})),
            record_type: "product_transfer".into(),
            record_id: Some(1),
            occurred_at: Utc::now(),
        }
    }

    #[derive(Default)]
    struct FlakySink {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AuditSink for FlakySink {
        async fn record(&self, entry: &AuditEntry) -> Result<(), DbErr> {
            self.seen.lock().await.push(entry.action.clone());
            if entry.action == "fail" {
                return Err(DbErr::Custom("sink down".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn full_channel_drops_without_blocking() {
        let (sender, _rx) = AuditSender::channel(1);
        assert!(sender.emit(entry("create")));
        assert!(!sender.emit(entry("edit")));
    }

    #[tokio::test]
    async fn closed_channel_drops_without_error() {
        let (sender, rx) = AuditSender::channel(4);
        drop(rx);
        assert!(!sender.emit(entry("create")));
    }

    #[tokio::test]
    async fn tracing_sink_accepts_everything() {
        let (sender, rx) = AuditSender::channel(4);
        sender.emit(entry("create"));
        drop(sender);

        process_audit_log(rx, Arc::new(TracingAuditSink)).await;
    }

    #[tokio::test]
    async fn sink_failures_do_not_stop_the_loop() {
        let (sender, rx) = AuditSender::channel(8);
        let sink = Arc::new(FlakySink::default());

        sender.emit(entry("fail"));
        sender.emit(entry("create"));
        drop(sender);

        process_audit_log(rx, sink.clone()).await;
        assert_eq!(*sink.seen.lock().await, vec!["fail", "create"]);
    }
}
