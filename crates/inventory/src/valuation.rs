//! Valuation engine: prices an outbound quantity under an item's costing
//! method.
//!
//! Pure calculation. The returned plan (`batch_draws` / `serials`) is what
//! the caller must deplete, which keeps costing order and depletion order
//! identical by construction.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::batch::{plan_draws, Batch, BatchDraw, ReceiptOrder};
use crate::error::{InventoryError, InventoryResult};
use crate::item::{ensure_positive, CostMethod, InventoryItem};
use crate::serial::{ensure_serial_count, normalize_serials, select_in_stock, SerialNumber};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCalculation {
    /// Method actually applied (may differ from the item's configured one).
    pub method: CostMethod,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    /// Lots consumed, in consumption order. Empty unless FIFO/LIFO priced.
    pub batch_draws: Vec<BatchDraw>,
    /// Units priced by specific identification.
    pub serials: Vec<SerialNumber>,
}

impl CostCalculation {
    fn new(method: CostMethod, quantity: Decimal, total_cost: Decimal) -> Self {
        Self {
            method,
            quantity,
            unit_cost: total_cost / quantity,
            total_cost,
            batch_draws: Vec::new(),
            serials: Vec::new(),
        }
    }
}

/// Method the engine will use for this request.
///
/// Serial numbers on a serial-tracked item always mean specific
/// identification; otherwise the configured method applies, except that
/// FIFO/LIFO without a batch sub-ledger can only price at average cost.
pub fn effective_method(item: &InventoryItem, serials_supplied: bool) -> CostMethod {
    if item.track_serial && serials_supplied {
        return CostMethod::Specific;
    }
    match item.cost_method {
        CostMethod::Fifo | CostMethod::Lifo if !item.track_batches => CostMethod::Average,
        method => method,
    }
}

/// Price `quantity` units of `item`.
///
/// `batches` is the item's batch sub-ledger (any order; the engine applies
/// the receipt order itself). `serial_records` are the stored records found
/// for `serial_numbers`; requested numbers without a matching in-stock
/// record of this item are reported as unavailable.
///
/// Average costing does not check on-hand quantity; callers do.
pub fn calculate_cost(
    item: &InventoryItem,
    quantity: Decimal,
    serial_numbers: Option<&[String]>,
    batches: &[Batch],
    serial_records: &[SerialNumber],
) -> InventoryResult<CostCalculation> {
    ensure_positive(quantity, "quantity")?;

    let requested = serial_numbers.filter(|s| !s.is_empty());
    match effective_method(item, requested.is_some()) {
        CostMethod::Fifo => by_receipt_order(CostMethod::Fifo, quantity, batches),
        CostMethod::Lifo => by_receipt_order(CostMethod::Lifo, quantity, batches),
        CostMethod::Average => Ok(CostCalculation::new(
            CostMethod::Average,
            quantity,
            item.average_cost() * quantity,
        )),
        CostMethod::Specific => {
            let requested = requested.ok_or_else(|| {
                InventoryError::validation("specific identification requires serial numbers")
            })?;
            by_serial(item, quantity, requested, serial_records)
        }
    }
}

fn by_receipt_order(
    method: CostMethod,
    quantity: Decimal,
    batches: &[Batch],
) -> InventoryResult<CostCalculation> {
    let draws = plan_draws(batches, quantity, ReceiptOrder::for_method(method))?;
    let total: Decimal = draws.iter().map(BatchDraw::cost).sum();
    let mut calc = CostCalculation::new(method, quantity, total);
    calc.batch_draws = draws;
    Ok(calc)
}

fn by_serial(
    item: &InventoryItem,
    quantity: Decimal,
    requested: &[String],
    serial_records: &[SerialNumber],
) -> InventoryResult<CostCalculation> {
    let requested = normalize_serials(requested)?;
    ensure_serial_count(&requested, quantity)?;

    let found = select_in_stock(item.id, &requested, serial_records)?;

    let total: Decimal = found.iter().map(|s| s.unit_cost).sum();
    let mut calc = CostCalculation::new(CostMethod::Specific, quantity, total);
    calc.serials = found;
    Ok(calc)
}
