use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument};

use stockledger_core::{ItemId, UserId};
use stockledger_inventory::{InventoryError, InventoryItem, InventoryResult, NewItem};

use super::{InventoryService, load_item};
use crate::audit::{AuditEntry, AuditLogger};
use crate::store::InventoryStore;

impl<S, A> InventoryService<S, A>
where
    S: InventoryStore,
    A: AuditLogger,
{
    /// Register a new item with zero stock. SKUs are unique per warehouse.
    #[instrument(skip(self, new), fields(sku = %new.sku, warehouse_id = %new.warehouse_id), err)]
    pub fn create_item(&self, new: NewItem, actor: Option<UserId>) -> InventoryResult<InventoryItem> {
        let item = InventoryItem::create(new, Utc::now())?;
        self.write("create_item", &[item.id], |tx| tx.insert_item(item.clone()))?;

        info!(item_id = %item.id, sku = %item.sku, cost_method = %item.cost_method, "inventory item created");
        self.record_audit(AuditEntry::new(
            actor,
            "inventory.item_created",
            "inventory_item",
            item.id,
            json!({
                "sku": item.sku,
                "warehouse_id": item.warehouse_id,
                "cost_method": item.cost_method,
                "track_batches": item.track_batches,
                "track_serial": item.track_serial,
            }),
        ));
        Ok(item)
    }

    /// Retire an item. Only an empty item can be deactivated; its alerts are
    /// resolved. Deactivating an inactive item is a no-op.
    #[instrument(skip(self), err)]
    pub fn deactivate_item(&self, item_id: ItemId, actor: Option<UserId>) -> InventoryResult<InventoryItem> {
        let (item, changed) = self.write("deactivate_item", &[item_id], |tx| {
            let mut item = load_item(tx, item_id)?;
            if !item.is_active {
                return Ok((item, false));
            }
            if item.quantity != Decimal::ZERO {
                return Err(InventoryError::validation(format!(
                    "item {} still holds {} {}",
                    item.id, item.quantity, item.unit
                )));
            }
            item.is_active = false;
            item.updated_at = Utc::now();
            tx.update_item(&item)?;
            Ok((item, true))
        })?;

        if changed {
            info!(item_id = %item.id, "inventory item deactivated");
            self.record_audit(AuditEntry::new(
                actor,
                "inventory.item_deactivated",
                "inventory_item",
                item.id,
                json!({ "is_active": false }),
            ));
            self.refresh_alerts(&[item.id]);
        }
        Ok(item)
    }
}
