//! Serial-number sub-ledger: one record per physical unit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, ItemId, SerialNumberId};

use crate::error::{InventoryError, InventoryResult};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SerialStatus {
    InStock,
    Sold,
    /// Removed by a stock adjustment (lost, damaged). Terminal like `Sold`.
    WrittenOff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialNumber {
    pub id: SerialNumberId,
    pub inventory_item_id: ItemId,
    pub serial_number: String,
    pub unit_cost: Decimal,
    pub status: SerialStatus,
    pub received_date: DateTime<Utc>,
    /// When the unit left stock, by sale or write-off.
    pub sold_date: Option<DateTime<Utc>>,
}

impl Entity for SerialNumber {
    type Id = SerialNumberId;

    fn id(&self) -> SerialNumberId {
        self.id
    }
}

impl SerialNumber {
    pub fn receive(
        item_id: ItemId,
        serial_number: &str,
        unit_cost: Decimal,
        now: DateTime<Utc>,
    ) -> InventoryResult<Self> {
        let serial_number = serial_number.trim();
        if serial_number.is_empty() {
            return Err(InventoryError::validation("serial number cannot be empty"));
        }
        Ok(Self {
            id: SerialNumberId::new(),
            inventory_item_id: item_id,
            serial_number: serial_number.to_string(),
            unit_cost,
            status: SerialStatus::InStock,
            received_date: now,
            sold_date: None,
        })
    }

    pub fn is_in_stock(&self) -> bool {
        self.status == SerialStatus::InStock
    }

    /// IN_STOCK -> SOLD. Sold units are never returned to stock.
    pub fn mark_sold(&mut self, now: DateTime<Utc>) -> InventoryResult<()> {
        self.leave_stock(SerialStatus::Sold, now)
    }

    /// IN_STOCK -> WRITTEN_OFF, for units removed by a negative adjustment.
    pub fn write_off(&mut self, now: DateTime<Utc>) -> InventoryResult<()> {
        self.leave_stock(SerialStatus::WrittenOff, now)
    }

    fn leave_stock(&mut self, status: SerialStatus, now: DateTime<Utc>) -> InventoryResult<()> {
        if !self.is_in_stock() {
            return Err(InventoryError::SerialNumberNotAvailable {
                serials: vec![self.serial_number.clone()],
            });
        }
        self.status = status;
        self.sold_date = Some(now);
        Ok(())
    }
}

/// Normalise a caller-supplied serial list: trimmed, non-empty, no repeats.
pub fn normalize_serials(serials: &[String]) -> InventoryResult<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(serials.len());
    for raw in serials {
        let s = raw.trim();
        if s.is_empty() {
            return Err(InventoryError::validation("serial number cannot be empty"));
        }
        if out.iter().any(|existing| existing == s) {
            return Err(InventoryError::validation(format!("serial number {s} listed twice")));
        }
        out.push(s.to_string());
    }
    Ok(out)
}

/// Serial-tracked movements must name exactly one serial per unit.
pub fn ensure_serial_count(serials: &[String], quantity: Decimal) -> InventoryResult<()> {
    if Decimal::from(serials.len()) != quantity {
        return Err(InventoryError::validation(format!(
            "{} serial numbers supplied for a quantity of {}",
            serials.len(),
            quantity
        )));
    }
    Ok(())
}

/// Resolve requested numbers to in-stock records of `item_id`.
///
/// Every number without such a record is reported together in one
/// `SerialNumberNotAvailable`.
pub fn select_in_stock(
    item_id: ItemId,
    requested: &[String],
    records: &[SerialNumber],
) -> InventoryResult<Vec<SerialNumber>> {
    let mut found = Vec::with_capacity(requested.len());
    let mut unavailable = Vec::new();
    for number in requested {
        match records
            .iter()
            .find(|s| &s.serial_number == number && s.inventory_item_id == item_id)
        {
            Some(record) if record.is_in_stock() => found.push(record.clone()),
            _ => unavailable.push(number.clone()),
        }
    }
    if !unavailable.is_empty() {
        return Err(InventoryError::SerialNumberNotAvailable { serials: unavailable });
    }
    Ok(found)
}
