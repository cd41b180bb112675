use std::sync::Arc;

use stockledger_core::{ItemId, WarehouseId};
use stockledger_inventory::{
    Batch, InventoryItem, InventoryResult, MovementFilter, ReceiptOrder, SerialNumber, StockAlert,
    StockMovement,
};

/// Typed view of the inventory tables inside one transaction.
///
/// Reads see the transaction's own writes. Nothing is visible to other
/// transactions until the owning [`InventoryStore::transaction`] commits.
///
/// ## Versioning
///
/// `update_item` must be given an item whose `version` is the one read in
/// this transaction; the store rejects stale writes with
/// `InventoryError::TransactionConflict` and bumps the version on commit.
///
/// ## Uniqueness
///
/// Implementations enforce:
/// - one item per `(warehouse_id, sku)`
/// - one serial record per serial number
/// - at most one unresolved alert per `(item, alert_type)`
pub trait StoreTx {
    fn find_item(&self, id: ItemId) -> InventoryResult<Option<InventoryItem>>;

    fn find_item_by_sku(&self, warehouse_id: WarehouseId, sku: &str) -> InventoryResult<Option<InventoryItem>>;

    fn list_items(&self) -> InventoryResult<Vec<InventoryItem>>;

    fn insert_item(&mut self, item: InventoryItem) -> InventoryResult<()>;

    fn update_item(&mut self, item: &InventoryItem) -> InventoryResult<()>;

    /// Active batches of an item, sorted in `order`.
    fn list_active_batches(&self, item_id: ItemId, order: ReceiptOrder) -> InventoryResult<Vec<Batch>>;

    fn find_batch_by_number(&self, item_id: ItemId, batch_number: &str) -> InventoryResult<Option<Batch>>;

    fn insert_batch(&mut self, batch: Batch) -> InventoryResult<()>;

    fn update_batch(&mut self, batch: &Batch) -> InventoryResult<()>;

    /// Serial records for the given numbers, whatever their item or status.
    fn find_serials(&self, serial_numbers: &[String]) -> InventoryResult<Vec<SerialNumber>>;

    fn list_in_stock_serials(&self, item_id: ItemId) -> InventoryResult<Vec<SerialNumber>>;

    fn insert_serial(&mut self, serial: SerialNumber) -> InventoryResult<()>;

    fn update_serial(&mut self, serial: &SerialNumber) -> InventoryResult<()>;

    /// Append to the movement ledger. There is no update or delete.
    fn append_movement(&mut self, movement: StockMovement) -> InventoryResult<()>;

    /// An item's movements matching `filter`, newest first.
    fn list_movements(&self, item_id: ItemId, filter: &MovementFilter) -> InventoryResult<Vec<StockMovement>>;

    fn list_unresolved_alerts(&self, item_id: ItemId) -> InventoryResult<Vec<StockAlert>>;

    fn insert_alert(&mut self, alert: StockAlert) -> InventoryResult<()>;

    fn update_alert(&mut self, alert: &StockAlert) -> InventoryResult<()>;
}

/// Transactional inventory persistence.
///
/// `transaction` runs `work` against a [`StoreTx`] and commits its writes
/// atomically when `work` returns `Ok`. On `Err` nothing is persisted.
///
/// `lock_scope` names the items the transaction intends to mutate. They are
/// locked exclusively (in a stable order) for the duration of `work`, so two
/// transactions touching the same item serialize. Items outside the scope may
/// still be written; the commit-time version check then decides, and a lost
/// race surfaces as `InventoryError::TransactionConflict`.
pub trait InventoryStore: Send + Sync {
    fn transaction<T, F>(&self, lock_scope: &[ItemId], work: F) -> InventoryResult<T>
    where
        F: FnOnce(&mut dyn StoreTx) -> InventoryResult<T>;

    /// Read-only transaction: no locks, writes are discarded.
    fn read<T, F>(&self, work: F) -> InventoryResult<T>
    where
        F: FnOnce(&dyn StoreTx) -> InventoryResult<T>;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore,
{
    fn transaction<T, F>(&self, lock_scope: &[ItemId], work: F) -> InventoryResult<T>
    where
        F: FnOnce(&mut dyn StoreTx) -> InventoryResult<T>,
    {
        (**self).transaction(lock_scope, work)
    }

    fn read<T, F>(&self, work: F) -> InventoryResult<T>
    where
        F: FnOnce(&dyn StoreTx) -> InventoryResult<T>,
    {
        (**self).read(work)
    }
}
