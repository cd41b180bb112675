//! Audit trail for inventory mutations.
//!
//! Entries are written after a transaction commits. A failing audit sink is
//! logged and otherwise ignored; it never undoes a committed movement.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use stockledger_core::UserId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: Option<UserId>,
    /// e.g. `inventory.receive`
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub changes: JsonValue,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor_id: Option<UserId>,
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl ToString,
        changes: JsonValue,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            actor_id,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.to_string(),
            changes,
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),

    #[error("audit entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait AuditLogger: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

impl<A> AuditLogger for Arc<A>
where
    A: AuditLogger + ?Sized,
{
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        (**self).record(entry)
    }
}

/// Emits each entry as a structured `info` event on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let changes = serde_json::to_string(&entry.changes)?;
        info!(
            target: "audit",
            audit_id = %entry.id,
            actor_id = ?entry.actor_id,
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            changes = %changes,
            "audit"
        );
        Ok(())
    }
}

/// Keeps entries in memory. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn actions(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.action).collect()
    }
}

impl AuditLogger for InMemoryAuditLog {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .write()
            .map_err(|_| AuditError::Unavailable("audit log lock poisoned".to_string()))?
            .push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn in_memory_log_keeps_entries_in_order() {
        let log = InMemoryAuditLog::new();
        let actor = UserId::new();
        log.record(AuditEntry::new(Some(actor), "inventory.receive", "inventory_item", "a", json!({"quantity": "5"})))
            .unwrap();
        log.record(AuditEntry::new(None, "inventory.issue", "inventory_item", "a", json!({})))
            .unwrap();

        assert_eq!(log.actions(), vec!["inventory.receive", "inventory.issue"]);
        assert_eq!(log.entries()[0].actor_id, Some(actor));
        assert_eq!(log.entries()[0].changes["quantity"], "5");
    }

    #[test]
    fn tracing_logger_accepts_entries() {
        let logger = Arc::new(TracingAuditLogger);
        assert!(logger
            .record(AuditEntry::new(None, "inventory.adjust", "inventory_item", "x", json!({"delta": "-1"})))
            .is_ok());
    }
}
