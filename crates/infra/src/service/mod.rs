//! Application service: every inventory operation as one retried,
//! all-or-nothing store transaction, followed by best-effort audit and
//! alert evaluation once the transaction has committed.

mod alerts;
pub mod commands;
mod items;
mod movements;
mod queries;
mod transfer;

use tracing::warn;

use stockledger_core::ItemId;
use stockledger_inventory::{Batch, BatchDraw, InventoryError, InventoryItem, InventoryResult};

use crate::audit::{AuditEntry, AuditLogger, TracingAuditLogger};
use crate::config::StockLedgerConfig;
use crate::store::{InventoryStore, StoreTx};

pub use commands::{
    AdjustInventory, AdjustmentOutcome, IssueInventory, IssueOutcome, ReceiptOutcome, ReceiveInventory,
    TransferInventory, TransferOutcome,
};

pub struct InventoryService<S, A = TracingAuditLogger> {
    store: S,
    audit: A,
    config: StockLedgerConfig,
}

impl<S> InventoryService<S> {
    /// Service with default configuration that audits to `tracing`.
    pub fn new(store: S) -> Self {
        Self::with_audit(store, TracingAuditLogger)
    }
}

impl<S, A> InventoryService<S, A> {
    pub fn with_audit(store: S, audit: A) -> Self {
        Self {
            store,
            audit,
            config: StockLedgerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: StockLedgerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn audit_log(&self) -> &A {
        &self.audit
    }

    pub fn config(&self) -> &StockLedgerConfig {
        &self.config
    }
}

impl<S, A> InventoryService<S, A>
where
    S: InventoryStore,
    A: AuditLogger,
{
    /// Run `work` in a transaction over `scope`, re-running it on conflicts.
    fn write<T, F>(&self, operation: &'static str, scope: &[ItemId], work: F) -> InventoryResult<T>
    where
        F: Fn(&mut dyn StoreTx) -> InventoryResult<T>,
    {
        self.config
            .retry
            .run(operation, || self.store.transaction(scope, &work))
    }

    fn record_audit(&self, entry: AuditEntry) {
        let action = entry.action.clone();
        if let Err(err) = self.audit.record(entry) {
            warn!(action = %action, error = %err, "audit write failed");
        }
    }

    /// Alert evaluation never fails the movement that triggered it.
    fn refresh_alerts(&self, item_ids: &[ItemId]) {
        for &item_id in item_ids {
            if let Err(err) = self.check_stock_alerts(item_id) {
                warn!(item_id = %item_id, error = %err, "alert evaluation failed");
            }
        }
    }
}

fn load_item(tx: &dyn StoreTx, item_id: ItemId) -> InventoryResult<InventoryItem> {
    tx.find_item(item_id)?
        .ok_or(InventoryError::ItemNotFound(item_id))
}

fn single<T>(rows: &[T]) -> Option<&T> {
    match rows {
        [one] => Some(one),
        _ => None,
    }
}

/// Withdraw each draw from its lot in `batches` and persist the lots.
fn withdraw_draws(tx: &mut dyn StoreTx, batches: &[Batch], draws: &[BatchDraw]) -> InventoryResult<Vec<Batch>> {
    let mut touched = Vec::with_capacity(draws.len());
    for draw in draws {
        let mut batch = batches
            .iter()
            .find(|b| b.id == draw.batch_id)
            .cloned()
            .ok_or_else(|| InventoryError::storage(format!("batch {} missing from draw pool", draw.batch_id)))?;
        batch.withdraw(draw.quantity)?;
        tx.update_batch(&batch)?;
        touched.push(batch);
    }
    Ok(touched)
}
