use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard};

use stockledger_core::{Entity, ExpectedVersion, ItemId, WarehouseId};
use stockledger_inventory::{
    Batch, InventoryError, InventoryItem, InventoryResult, MovementFilter, ReceiptOrder, SerialNumber,
    StockAlert, StockMovement,
};

use super::locks::ItemLocks;
use super::r#trait::{InventoryStore, StoreTx};

type Table<E> = HashMap<<E as Entity>::Id, E>;

#[derive(Debug, Default)]
struct Tables {
    items: Table<InventoryItem>,
    batches: Table<Batch>,
    serials: Table<SerialNumber>,
    alerts: Table<StockAlert>,
    movements: HashMap<ItemId, Vec<StockMovement>>,
}

/// In-memory transactional inventory store.
///
/// Intended for tests/dev. Transactions buffer their writes in an overlay
/// and reconcile with committed state under one write lock at commit:
/// every row the transaction overwrote must still equal what it read, and
/// the uniqueness rules of [`StoreTx`] must hold for the merged result.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    tables: RwLock<Tables>,
    locks: ItemLocks,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total committed movement rows (all items).
    pub fn movement_count(&self) -> usize {
        self.tables
            .read()
            .map(|t| t.movements.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn transaction<T, F>(&self, lock_scope: &[ItemId], work: F) -> InventoryResult<T>
    where
        F: FnOnce(&mut dyn StoreTx) -> InventoryResult<T>,
    {
        let _guard = self.locks.acquire(lock_scope)?;
        let mut tx = InMemoryTx::new(&self.tables);
        let out = work(&mut tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn read<T, F>(&self, work: F) -> InventoryResult<T>
    where
        F: FnOnce(&dyn StoreTx) -> InventoryResult<T>,
    {
        let tx = InMemoryTx::new(&self.tables);
        work(&tx)
    }
}

fn read_tables(lock: &RwLock<Tables>) -> InventoryResult<RwLockReadGuard<'_, Tables>> {
    lock.read()
        .map_err(|_| InventoryError::storage("inventory tables lock poisoned"))
}

/// Rows one transaction wrote to a table, plus the committed row each write
/// replaced (`None` for inserts).
#[derive(Debug)]
struct Overlay<E: Entity> {
    table: &'static str,
    rows: BTreeMap<E::Id, E>,
    base: BTreeMap<E::Id, Option<E>>,
}

impl<E> Overlay<E>
where
    E: Entity + Clone + PartialEq,
{
    fn new(table: &'static str) -> Self {
        Self {
            table,
            rows: BTreeMap::new(),
            base: BTreeMap::new(),
        }
    }

    fn get(&self, committed: &Table<E>, id: E::Id) -> Option<E> {
        self.rows.get(&id).or_else(|| committed.get(&id)).cloned()
    }

    /// Committed rows merged with this transaction's writes.
    fn visible<P>(&self, committed: &Table<E>, pred: P) -> Vec<E>
    where
        P: Fn(&E) -> bool,
    {
        let mut out: Vec<E> = committed
            .values()
            .filter(|row| !self.rows.contains_key(&row.id()) && pred(row))
            .cloned()
            .collect();
        out.extend(self.rows.values().filter(|row| pred(row)).cloned());
        out
    }

    fn insert(&mut self, committed: &Table<E>, row: E) -> InventoryResult<()> {
        let id = row.id();
        if self.get(committed, id).is_some() {
            return Err(InventoryError::storage(format!("{} row {id:?} already exists", self.table)));
        }
        self.base.insert(id, None);
        self.rows.insert(id, row);
        Ok(())
    }

    fn update(&mut self, committed: &Table<E>, row: E) -> InventoryResult<()> {
        let id = row.id();
        if !self.rows.contains_key(&id) {
            let current = committed
                .get(&id)
                .ok_or_else(|| InventoryError::storage(format!("{} row {id:?} does not exist", self.table)))?;
            self.base.insert(id, Some(current.clone()));
        }
        self.rows.insert(id, row);
        Ok(())
    }

    /// Every overwritten row must be unchanged since it was read.
    fn validate(&self, committed: &Table<E>) -> InventoryResult<()> {
        for (id, base) in &self.base {
            if committed.get(id) != base.as_ref() {
                return Err(InventoryError::conflict(format!(
                    "{} row {id:?} changed concurrently",
                    self.table
                )));
            }
        }
        Ok(())
    }

    /// Keys produced by `key` must be unique across the merged table.
    fn validate_unique<K, F>(&self, committed: &Table<E>, key: F) -> InventoryResult<()>
    where
        K: Eq + Hash + std::fmt::Debug,
        F: Fn(&E) -> Option<K>,
    {
        let mut claimed: HashMap<K, E::Id> = HashMap::new();
        for row in self.rows.values() {
            if let Some(k) = key(row) {
                if claimed.insert(k, row.id()).is_some() {
                    return Err(InventoryError::conflict(format!(
                        "duplicate {} key in transaction",
                        self.table
                    )));
                }
            }
        }
        if claimed.is_empty() {
            return Ok(());
        }
        for row in committed.values().filter(|r| !self.rows.contains_key(&r.id())) {
            if let Some(k) = key(row) {
                if claimed.contains_key(&k) {
                    return Err(InventoryError::conflict(format!(
                        "{} key {k:?} already taken",
                        self.table
                    )));
                }
            }
        }
        Ok(())
    }
}

struct InMemoryTx<'a> {
    committed: &'a RwLock<Tables>,
    items: Overlay<InventoryItem>,
    batches: Overlay<Batch>,
    serials: Overlay<SerialNumber>,
    alerts: Overlay<StockAlert>,
    movements: Vec<StockMovement>,
}

impl<'a> InMemoryTx<'a> {
    fn new(committed: &'a RwLock<Tables>) -> Self {
        Self {
            committed,
            items: Overlay::new("inventory_items"),
            batches: Overlay::new("batches"),
            serials: Overlay::new("serial_numbers"),
            alerts: Overlay::new("stock_alerts"),
            movements: Vec::new(),
        }
    }

    fn tables(&self) -> InventoryResult<RwLockReadGuard<'a, Tables>> {
        read_tables(self.committed)
    }

    fn commit(self) -> InventoryResult<()> {
        let mut tables = self
            .committed
            .write()
            .map_err(|_| InventoryError::storage("inventory tables lock poisoned"))?;

        self.items.validate(&tables.items)?;
        self.batches.validate(&tables.batches)?;
        self.serials.validate(&tables.serials)?;
        self.alerts.validate(&tables.alerts)?;

        self.items
            .validate_unique(&tables.items, |i| Some((i.warehouse_id, i.sku.clone())))?;
        self.serials
            .validate_unique(&tables.serials, |s| Some(s.serial_number.clone()))?;
        self.alerts.validate_unique(&tables.alerts, |a| {
            a.is_open().then_some((a.inventory_item_id, a.alert_type))
        })?;

        for (id, mut item) in self.items.rows {
            if let Some(Some(base)) = self.items.base.get(&id) {
                item.version = base.version + 1;
            }
            tables.items.insert(id, item);
        }
        tables.batches.extend(self.batches.rows);
        tables.serials.extend(self.serials.rows);
        tables.alerts.extend(self.alerts.rows);
        for movement in self.movements {
            tables
                .movements
                .entry(movement.inventory_item_id)
                .or_default()
                .push(movement);
        }
        Ok(())
    }
}

impl StoreTx for InMemoryTx<'_> {
    fn find_item(&self, id: ItemId) -> InventoryResult<Option<InventoryItem>> {
        let tables = self.tables()?;
        Ok(self.items.get(&tables.items, id))
    }

    fn find_item_by_sku(&self, warehouse_id: WarehouseId, sku: &str) -> InventoryResult<Option<InventoryItem>> {
        let tables = self.tables()?;
        Ok(self
            .items
            .visible(&tables.items, |i| i.warehouse_id == warehouse_id && i.sku == sku)
            .into_iter()
            .next())
    }

    fn list_items(&self) -> InventoryResult<Vec<InventoryItem>> {
        let tables = self.tables()?;
        Ok(self.items.visible(&tables.items, |_| true))
    }

    fn insert_item(&mut self, item: InventoryItem) -> InventoryResult<()> {
        if self.find_item_by_sku(item.warehouse_id, &item.sku)?.is_some() {
            return Err(InventoryError::validation(format!(
                "sku {} already exists in warehouse {}",
                item.sku, item.warehouse_id
            )));
        }
        let tables = self.tables()?;
        self.items.insert(&tables.items, item)
    }

    fn update_item(&mut self, item: &InventoryItem) -> InventoryResult<()> {
        let tables = self.tables()?;
        let current = self
            .items
            .get(&tables.items, item.id)
            .ok_or(InventoryError::ItemNotFound(item.id))?;
        ExpectedVersion::Exact(item.version).check(current.version)?;
        self.items.update(&tables.items, item.clone())
    }

    fn list_active_batches(&self, item_id: ItemId, order: ReceiptOrder) -> InventoryResult<Vec<Batch>> {
        let tables = self.tables()?;
        let mut batches = self
            .batches
            .visible(&tables.batches, |b| b.inventory_item_id == item_id && b.is_active);
        order.sort(&mut batches);
        Ok(batches)
    }

    fn find_batch_by_number(&self, item_id: ItemId, batch_number: &str) -> InventoryResult<Option<Batch>> {
        let tables = self.tables()?;
        let mut found = self.batches.visible(&tables.batches, |b| {
            b.inventory_item_id == item_id && b.batch_number == batch_number
        });
        ReceiptOrder::OldestFirst.sort(&mut found);
        // Prefer a lot that still holds stock.
        let active = found.iter().position(|b| b.is_active).unwrap_or(0);
        Ok((!found.is_empty()).then(|| found.swap_remove(active)))
    }

    fn insert_batch(&mut self, batch: Batch) -> InventoryResult<()> {
        let tables = self.tables()?;
        self.batches.insert(&tables.batches, batch)
    }

    fn update_batch(&mut self, batch: &Batch) -> InventoryResult<()> {
        let tables = self.tables()?;
        self.batches.update(&tables.batches, batch.clone())
    }

    fn find_serials(&self, serial_numbers: &[String]) -> InventoryResult<Vec<SerialNumber>> {
        let tables = self.tables()?;
        Ok(self
            .serials
            .visible(&tables.serials, |s| serial_numbers.contains(&s.serial_number)))
    }

    fn list_in_stock_serials(&self, item_id: ItemId) -> InventoryResult<Vec<SerialNumber>> {
        let tables = self.tables()?;
        Ok(self
            .serials
            .visible(&tables.serials, |s| s.inventory_item_id == item_id && s.is_in_stock()))
    }

    fn insert_serial(&mut self, serial: SerialNumber) -> InventoryResult<()> {
        if !self.find_serials(std::slice::from_ref(&serial.serial_number))?.is_empty() {
            return Err(InventoryError::validation(format!(
                "serial number {} already exists",
                serial.serial_number
            )));
        }
        let tables = self.tables()?;
        self.serials.insert(&tables.serials, serial)
    }

    fn update_serial(&mut self, serial: &SerialNumber) -> InventoryResult<()> {
        let tables = self.tables()?;
        self.serials.update(&tables.serials, serial.clone())
    }

    fn append_movement(&mut self, movement: StockMovement) -> InventoryResult<()> {
        self.movements.push(movement);
        Ok(())
    }

    fn list_movements(&self, item_id: ItemId, filter: &MovementFilter) -> InventoryResult<Vec<StockMovement>> {
        let tables = self.tables()?;
        let committed = tables.movements.get(&item_id).into_iter().flatten();
        let pending = self.movements.iter().filter(|m| m.inventory_item_id == item_id);
        Ok(filter.apply(committed.chain(pending)))
    }

    fn list_unresolved_alerts(&self, item_id: ItemId) -> InventoryResult<Vec<StockAlert>> {
        let tables = self.tables()?;
        Ok(self
            .alerts
            .visible(&tables.alerts, |a| a.inventory_item_id == item_id && a.is_open()))
    }

    fn insert_alert(&mut self, alert: StockAlert) -> InventoryResult<()> {
        let duplicate = self
            .list_unresolved_alerts(alert.inventory_item_id)?
            .iter()
            .any(|a| a.alert_type == alert.alert_type);
        if duplicate {
            return Err(InventoryError::conflict(format!(
                "unresolved {} alert already exists for item {}",
                alert.alert_type.as_str(),
                alert.inventory_item_id
            )));
        }
        let tables = self.tables()?;
        self.alerts.insert(&tables.alerts, alert)
    }

    fn update_alert(&mut self, alert: &StockAlert) -> InventoryResult<()> {
        let tables = self.tables()?;
        self.alerts.update(&tables.alerts, alert.clone())
    }
}
