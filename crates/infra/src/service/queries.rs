use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};

use stockledger_core::ItemId;
use stockledger_inventory::report::{build_report, value_item};
use stockledger_inventory::serial::normalize_serials;
use stockledger_inventory::{
    CostCalculation, InventoryItem, InventoryResult, MovementFilter, ReceiptOrder, StockMovement,
    ValuationReport, ValuationScope, calculate_cost,
};

use super::{InventoryService, load_item};
use crate::audit::AuditLogger;
use crate::store::InventoryStore;

impl<S, A> InventoryService<S, A>
where
    S: InventoryStore,
    A: AuditLogger,
{
    pub fn get_item(&self, item_id: ItemId) -> InventoryResult<InventoryItem> {
        self.store.read(|tx| load_item(tx, item_id))
    }

    /// Price `quantity` units of an item without moving stock.
    ///
    /// Average costing does not check on-hand quantity here; issuing does.
    #[instrument(skip(self, serial_numbers), err)]
    pub fn calculate_cost(
        &self,
        item_id: ItemId,
        quantity: Decimal,
        serial_numbers: Option<&[String]>,
    ) -> InventoryResult<CostCalculation> {
        let serials = serial_numbers.map(normalize_serials).transpose()?;

        self.store.read(|tx| {
            let item = load_item(tx, item_id)?;
            let batches = tx.list_active_batches(item.id, ReceiptOrder::for_method(item.cost_method))?;
            let records = match serials.as_deref() {
                Some(numbers) if !numbers.is_empty() => tx.find_serials(numbers)?,
                _ => Vec::new(),
            };
            calculate_cost(&item, quantity, serials.as_deref(), &batches, &records)
        })
    }

    /// An item's movement history, newest first.
    pub fn get_stock_movements(
        &self,
        item_id: ItemId,
        filter: &MovementFilter,
    ) -> InventoryResult<Vec<StockMovement>> {
        self.store.read(|tx| {
            load_item(tx, item_id)?;
            tx.list_movements(item_id, filter)
        })
    }

    /// Value on-hand stock under every costing method at once. Read-only.
    #[instrument(skip(self), err)]
    pub fn generate_valuation_report(&self, scope: &ValuationScope) -> InventoryResult<ValuationReport> {
        let report = self.store.read(|tx| {
            let mut valuations = Vec::new();
            for item in tx.list_items()?.into_iter().filter(|i| scope.includes(i)) {
                let batches = tx.list_active_batches(item.id, ReceiptOrder::OldestFirst)?;
                let serials = if item.track_serial {
                    tx.list_in_stock_serials(item.id)?
                } else {
                    Vec::new()
                };
                valuations.push(value_item(&item, &batches, &serials));
            }
            build_report(valuations, Utc::now())
        })?;

        info!(
            item_count = report.totals.item_count,
            book_value = %report.totals.book_value,
            unvalued_items = report.totals.unvalued_items,
            "valuation report generated"
        );
        Ok(report)
    }
}
