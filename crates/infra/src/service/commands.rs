//! Requests accepted by, and results returned from, [`super::InventoryService`].
//!
//! Returned items reflect what the transaction wrote; their `version` is the
//! one read inside the transaction (the store bumps it on commit).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{ItemId, UserId, WarehouseId};
use stockledger_inventory::{
    Batch, BatchReceipt, CostCalculation, InventoryItem, MovementReference, SerialNumber, StockMovement,
};

fn collect_serials<I, S>(serials: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    serials.into_iter().map(Into::into).collect()
}

/// Purchase receipt into one warehouse-scoped item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveInventory {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    /// Required for batch-tracked items.
    pub batch: Option<BatchReceipt>,
    /// One per unit for serial-tracked items.
    pub serial_numbers: Vec<String>,
    pub reference: Option<MovementReference>,
    pub notes: Option<String>,
    pub actor: Option<UserId>,
}

impl ReceiveInventory {
    pub fn new(item_id: ItemId, warehouse_id: WarehouseId, quantity: Decimal, unit_cost: Decimal) -> Self {
        Self {
            item_id,
            warehouse_id,
            quantity,
            unit_cost,
            batch: None,
            serial_numbers: Vec::new(),
            reference: None,
            notes: None,
            actor: None,
        }
    }

    pub fn with_batch(mut self, batch: BatchReceipt) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn with_serials<I, S>(mut self, serials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.serial_numbers = collect_serials(serials);
        self
    }

    pub fn with_reference(mut self, reference: MovementReference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn by(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }
}

/// Sale / consumption out of one warehouse-scoped item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInventory {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub quantity: Decimal,
    /// Required for serial-tracked items; selects specific identification.
    pub serial_numbers: Vec<String>,
    pub reference: Option<MovementReference>,
    pub notes: Option<String>,
    pub actor: Option<UserId>,
}

impl IssueInventory {
    pub fn new(item_id: ItemId, warehouse_id: WarehouseId, quantity: Decimal) -> Self {
        Self {
            item_id,
            warehouse_id,
            quantity,
            serial_numbers: Vec::new(),
            reference: None,
            notes: None,
            actor: None,
        }
    }

    pub fn with_serials<I, S>(mut self, serials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.serial_numbers = collect_serials(serials);
        self
    }

    pub fn with_reference(mut self, reference: MovementReference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn by(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }
}

/// Signed stock correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustInventory {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    /// Positive adds stock, negative removes it. Never zero.
    pub delta: Decimal,
    /// Cost of added units; blended into the average when given.
    pub unit_cost: Option<Decimal>,
    pub reason: String,
    /// Lot to credit or debit on batch-tracked items.
    pub batch_number: Option<String>,
    /// Units added or written off on serial-tracked items; one per unit.
    pub serial_numbers: Vec<String>,
    pub actor: Option<UserId>,
}

impl AdjustInventory {
    pub fn new(item_id: ItemId, warehouse_id: WarehouseId, delta: Decimal, reason: impl Into<String>) -> Self {
        Self {
            item_id,
            warehouse_id,
            delta,
            unit_cost: None,
            reason: reason.into(),
            batch_number: None,
            serial_numbers: Vec::new(),
            actor: None,
        }
    }

    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    pub fn with_batch_number(mut self, batch_number: impl Into<String>) -> Self {
        self.batch_number = Some(batch_number.into());
        self
    }

    pub fn with_serials<I, S>(mut self, serials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.serial_numbers = collect_serials(serials);
        self
    }

    pub fn by(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }
}

/// Move stock of one SKU between warehouses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInventory {
    /// Source item (scoped to `from_warehouse_id`).
    pub item_id: ItemId,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub quantity: Decimal,
    pub serial_numbers: Vec<String>,
    pub notes: Option<String>,
    pub actor: Option<UserId>,
}

impl TransferInventory {
    pub fn new(
        item_id: ItemId,
        from_warehouse_id: WarehouseId,
        to_warehouse_id: WarehouseId,
        quantity: Decimal,
    ) -> Self {
        Self {
            item_id,
            from_warehouse_id,
            to_warehouse_id,
            quantity,
            serial_numbers: Vec::new(),
            notes: None,
            actor: None,
        }
    }

    pub fn with_serials<I, S>(mut self, serials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.serial_numbers = collect_serials(serials);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn by(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptOutcome {
    pub movement: StockMovement,
    pub item: InventoryItem,
    pub batch: Option<Batch>,
    pub serials: Vec<SerialNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueOutcome {
    pub movement: StockMovement,
    /// How the issued units were priced (and which lots or serials they were).
    pub cost: CostCalculation,
    pub item: InventoryItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentOutcome {
    pub movement: StockMovement,
    pub item: InventoryItem,
    /// Lots credited or debited, as written.
    pub batches: Vec<Batch>,
    /// Serials created or written off, as written.
    pub serials: Vec<SerialNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub outbound: StockMovement,
    pub inbound: StockMovement,
    pub source: InventoryItem,
    pub destination: InventoryItem,
    /// The destination item did not exist and was created by this transfer.
    pub destination_created: bool,
}
