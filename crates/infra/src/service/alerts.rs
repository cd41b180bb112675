use chrono::Utc;
use tracing::{debug, info, instrument};

use stockledger_core::ItemId;
use stockledger_inventory::alert::evaluate;
use stockledger_inventory::{AlertTransition, InventoryResult, ReceiptOrder, StockAlert};

use super::{InventoryService, load_item};
use crate::audit::AuditLogger;
use crate::store::InventoryStore;

impl<S, A> InventoryService<S, A>
where
    S: InventoryStore,
    A: AuditLogger,
{
    /// Bring an item's unresolved alerts in line with its current stock and
    /// lots. Idempotent: re-running on unchanged state writes nothing.
    #[instrument(skip(self), err)]
    pub fn check_stock_alerts(&self, item_id: ItemId) -> InventoryResult<Vec<AlertTransition>> {
        let policy = self.config.alert_policy();

        let transitions = self.write("check_stock_alerts", &[item_id], |tx| {
            let item = load_item(tx, item_id)?;
            let batches = tx.list_active_batches(item.id, ReceiptOrder::OldestFirst)?;
            let unresolved = tx.list_unresolved_alerts(item.id)?;

            let transitions = evaluate(&item, &batches, &unresolved, Utc::now(), &policy);
            for transition in &transitions {
                match transition {
                    AlertTransition::Raise(alert) => tx.insert_alert(alert.clone())?,
                    AlertTransition::Refresh(alert) | AlertTransition::Resolve(alert) => {
                        tx.update_alert(alert)?
                    }
                }
            }
            Ok(transitions)
        })?;

        for transition in &transitions {
            match transition {
                AlertTransition::Raise(a) => info!(
                    alert_id = %a.id,
                    item_id = %a.inventory_item_id,
                    alert_type = a.alert_type.as_str(),
                    current_quantity = %a.current_quantity,
                    "stock alert raised"
                ),
                AlertTransition::Refresh(a) => debug!(
                    alert_id = %a.id,
                    alert_type = a.alert_type.as_str(),
                    current_quantity = %a.current_quantity,
                    "stock alert refreshed"
                ),
                AlertTransition::Resolve(a) => info!(
                    alert_id = %a.id,
                    item_id = %a.inventory_item_id,
                    alert_type = a.alert_type.as_str(),
                    "stock alert resolved"
                ),
            }
        }

        Ok(transitions)
    }

    /// Unresolved alerts of an item, oldest first.
    pub fn list_active_alerts(&self, item_id: ItemId) -> InventoryResult<Vec<StockAlert>> {
        let mut alerts = self.store.read(|tx| {
            load_item(tx, item_id)?;
            tx.list_unresolved_alerts(item_id)
        })?;
        alerts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(alerts)
    }
}
