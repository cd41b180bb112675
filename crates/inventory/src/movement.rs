//! Stock-movement ledger rows.
//!
//! Movements are append-only: once written they are never updated or
//! deleted, so the ledger doubles as the audit trail for quantity changes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{BatchId, Entity, ItemId, MovementId, SerialNumberId, UserId, WarehouseId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Purchase,
    Sale,
    Adjustment,
    Transfer,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Purchase => "PURCHASE",
            MovementType::Sale => "SALE",
            MovementType::Adjustment => "ADJUSTMENT",
            MovementType::Transfer => "TRANSFER",
        }
    }
}

/// Whether a movement added stock to or removed stock from its item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementDirection {
    In,
    Out,
}

/// Optional link back to the business document that caused a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementReference {
    pub reference_type: String,
    pub reference_id: String,
}

impl MovementReference {
    pub fn new(reference_type: impl Into<String>, reference_id: impl Into<String>) -> Self {
        Self {
            reference_type: reference_type.into(),
            reference_id: reference_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub inventory_item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub batch_id: Option<BatchId>,
    pub serial_number_id: Option<SerialNumberId>,
    pub movement_type: MovementType,
    pub direction: MovementDirection,
    /// Always a positive magnitude; `direction` carries the sign.
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub movement_date: DateTime<Utc>,
    pub created_by: Option<UserId>,
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> MovementId {
        self.id
    }
}

impl StockMovement {
    /// Start a movement row; `total_cost` defaults to `quantity * unit_cost`.
    pub fn record(
        movement_type: MovementType,
        direction: MovementDirection,
        item_id: ItemId,
        warehouse_id: WarehouseId,
        quantity: Decimal,
        unit_cost: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            inventory_item_id: item_id,
            warehouse_id,
            batch_id: None,
            serial_number_id: None,
            movement_type,
            direction,
            quantity: quantity.abs(),
            unit_cost,
            total_cost: quantity.abs() * unit_cost,
            reference_type: None,
            reference_id: None,
            notes: None,
            movement_date: now,
            created_by: None,
        }
    }

    pub fn with_total_cost(mut self, total_cost: Decimal) -> Self {
        self.total_cost = total_cost;
        self
    }

    pub fn with_batch(mut self, batch_id: Option<BatchId>) -> Self {
        self.batch_id = batch_id;
        self
    }

    pub fn with_serial(mut self, serial_number_id: Option<SerialNumberId>) -> Self {
        self.serial_number_id = serial_number_id;
        self
    }

    pub fn with_reference(mut self, reference: Option<&MovementReference>) -> Self {
        if let Some(r) = reference {
            self.reference_type = Some(r.reference_type.clone());
            self.reference_id = Some(r.reference_id.clone());
        }
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn created_by(mut self, actor: Option<UserId>) -> Self {
        self.created_by = actor;
        self
    }

    /// Quantity with its sign restored (+ for IN, - for OUT).
    pub fn signed_quantity(&self) -> Decimal {
        match self.direction {
            MovementDirection::In => self.quantity,
            MovementDirection::Out => -self.quantity,
        }
    }
}

/// Query filters for an item's movement history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFilter {
    pub movement_type: Option<MovementType>,
    pub direction: Option<MovementDirection>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl MovementFilter {
    pub fn of_type(mut self, movement_type: MovementType) -> Self {
        self.movement_type = Some(movement_type);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Date bounds are inclusive.
    pub fn matches(&self, movement: &StockMovement) -> bool {
        self.movement_type.is_none_or(|t| t == movement.movement_type)
            && self.direction.is_none_or(|d| d == movement.direction)
            && self.from.is_none_or(|from| movement.movement_date >= from)
            && self.to.is_none_or(|to| movement.movement_date <= to)
    }

    /// Filter, order newest first, then truncate to `limit`.
    pub fn apply<'a>(&self, movements: impl IntoIterator<Item = &'a StockMovement>) -> Vec<StockMovement> {
        let mut out: Vec<StockMovement> = movements
            .into_iter()
            .filter(|m| self.matches(m))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.movement_date.cmp(&a.movement_date).then_with(|| b.id.cmp(&a.id)));
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// Signed sum of ledger quantities; equals on-hand stock for a consistent item.
pub fn net_quantity<'a>(movements: impl IntoIterator<Item = &'a StockMovement>) -> Decimal {
    movements.into_iter().map(StockMovement::signed_quantity).sum()
}
