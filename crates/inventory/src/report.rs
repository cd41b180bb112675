//! Side-by-side valuation of on-hand stock (read-only).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{ItemId, WarehouseId};

use crate::batch::Batch;
use crate::error::{InventoryError, InventoryResult};
use crate::item::{CostMethod, InventoryItem};
use crate::serial::SerialNumber;
use crate::valuation::calculate_cost;

/// Which items a report covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationScope {
    pub warehouse_id: Option<WarehouseId>,
    pub item_ids: Option<Vec<ItemId>>,
    pub include_inactive: bool,
}

impl ValuationScope {
    pub fn warehouse(warehouse_id: WarehouseId) -> Self {
        Self {
            warehouse_id: Some(warehouse_id),
            ..Self::default()
        }
    }

    pub fn items(item_ids: Vec<ItemId>) -> Self {
        Self {
            item_ids: Some(item_ids),
            ..Self::default()
        }
    }

    pub fn includes(&self, item: &InventoryItem) -> bool {
        (self.include_inactive || item.is_active)
            && self.warehouse_id.is_none_or(|w| w == item.warehouse_id)
            && self.item_ids.as_ref().is_none_or(|ids| ids.contains(&item.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemValuation {
    pub item_id: ItemId,
    pub sku: String,
    pub name: String,
    pub warehouse_id: WarehouseId,
    pub cost_method: CostMethod,
    pub quantity: Decimal,
    /// `None` when the batch sub-ledger cannot cover on-hand quantity.
    pub fifo_value: Option<Decimal>,
    pub lifo_value: Option<Decimal>,
    pub average_value: Decimal,
    /// On-hand quantity at last purchase cost.
    pub current_value: Decimal,
    /// Value under the item's configured method.
    pub book_value: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationTotals {
    pub item_count: usize,
    pub quantity: Decimal,
    pub fifo_value: Decimal,
    pub lifo_value: Decimal,
    pub average_value: Decimal,
    pub current_value: Decimal,
    pub book_value: Decimal,
    /// Items whose FIFO or LIFO value could not be computed.
    pub unvalued_items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationReport {
    pub generated_at: DateTime<Utc>,
    pub items: Vec<ItemValuation>,
    pub totals: ValuationTotals,
}

fn value_under(
    item: &InventoryItem,
    method: CostMethod,
    batches: &[Batch],
) -> Option<Decimal> {
    if item.quantity.is_zero() {
        return Some(Decimal::ZERO);
    }
    let mut as_method = item.clone();
    as_method.cost_method = method;
    calculate_cost(&as_method, item.quantity, None, batches, &[])
        .ok()
        .map(|c| c.total_cost)
}

/// Value one item's on-hand stock every way at once.
pub fn value_item(item: &InventoryItem, batches: &[Batch], serials: &[SerialNumber]) -> ItemValuation {
    let fifo_value = value_under(item, CostMethod::Fifo, batches);
    let lifo_value = value_under(item, CostMethod::Lifo, batches);
    let average_value = item.quantity * item.average_cost();
    let current_value = item.quantity * item.unit_cost;

    let book_value = match item.cost_method {
        CostMethod::Fifo => fifo_value.unwrap_or(average_value),
        CostMethod::Lifo => lifo_value.unwrap_or(average_value),
        CostMethod::Average => average_value,
        CostMethod::Specific if item.track_serial => serials
            .iter()
            .filter(|s| s.inventory_item_id == item.id && s.is_in_stock())
            .map(|s| s.unit_cost)
            .sum(),
        CostMethod::Specific => average_value,
    };

    ItemValuation {
        item_id: item.id,
        sku: item.sku.clone(),
        name: item.name.clone(),
        warehouse_id: item.warehouse_id,
        cost_method: item.cost_method,
        quantity: item.quantity,
        fifo_value,
        lifo_value,
        average_value,
        current_value,
        book_value,
    }
}

/// Assemble a report from per-item valuations, sorted by warehouse then SKU.
/// Fails rather than wrapping when a column total leaves the `Decimal` range.
pub fn build_report(
    mut items: Vec<ItemValuation>,
    generated_at: DateTime<Utc>,
) -> InventoryResult<ValuationReport> {
    items.sort_by(|a, b| a.warehouse_id.cmp(&b.warehouse_id).then_with(|| a.sku.cmp(&b.sku)));

    let mut totals = ValuationTotals {
        item_count: items.len(),
        ..ValuationTotals::default()
    };
    for v in &items {
        totals.quantity = add(totals.quantity, v.quantity, "quantity")?;
        totals.average_value = add(totals.average_value, v.average_value, "average_value")?;
        totals.current_value = add(totals.current_value, v.current_value, "current_value")?;
        totals.book_value = add(totals.book_value, v.book_value, "book_value")?;
        match (v.fifo_value, v.lifo_value) {
            (Some(fifo), Some(lifo)) => {
                totals.fifo_value = add(totals.fifo_value, fifo, "fifo_value")?;
                totals.lifo_value = add(totals.lifo_value, lifo, "lifo_value")?;
            }
            _ => totals.unvalued_items += 1,
        }
    }

    Ok(ValuationReport {
        generated_at,
        items,
        totals,
    })
}

fn add(total: Decimal, value: Decimal, column: &str) -> InventoryResult<Decimal> {
    total
        .checked_add(value)
        .ok_or_else(|| InventoryError::validation(format!("report total {column} overflows")))
}
