use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, ItemId, WarehouseId};

use crate::error::{InventoryError, InventoryResult};

/// Upper bound (10^12) for a movement quantity and for on-hand stock.
///
/// With unit costs bounded the same way, every quantity x cost product,
/// weighted-average blend and per-item valuation stays far inside the
/// `Decimal` range.
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Upper bound (10^12) for a unit cost.
pub const MAX_UNIT_COST: Decimal = MAX_QUANTITY;

/// Costing method configured on an item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostMethod {
    Fifo,
    Lifo,
    Average,
    Specific,
}

impl CostMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostMethod::Fifo => "FIFO",
            CostMethod::Lifo => "LIFO",
            CostMethod::Average => "AVERAGE",
            CostMethod::Specific => "SPECIFIC",
        }
    }
}

impl core::fmt::Display for CostMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for CostMethod {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FIFO" => Ok(CostMethod::Fifo),
            "LIFO" => Ok(CostMethod::Lifo),
            "AVERAGE" => Ok(CostMethod::Average),
            "SPECIFIC" => Ok(CostMethod::Specific),
            other => Err(InventoryError::validation(format!("unknown cost method: {other}"))),
        }
    }
}

/// Attributes for explicitly creating an item in a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub warehouse_id: WarehouseId,
    pub cost_method: CostMethod,
    pub track_batches: bool,
    pub track_serial: bool,
    pub min_stock: Decimal,
    pub max_stock: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    /// Standard cost until the first receipt sets a real one.
    pub unit_cost: Decimal,
}

impl NewItem {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, warehouse_id: WarehouseId) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            unit: "each".to_string(),
            warehouse_id,
            cost_method: CostMethod::Fifo,
            track_batches: false,
            track_serial: false,
            min_stock: Decimal::ZERO,
            max_stock: None,
            sale_price: None,
            unit_cost: Decimal::ZERO,
        }
    }

    pub fn with_cost_method(mut self, cost_method: CostMethod) -> Self {
        self.cost_method = cost_method;
        self
    }

    pub fn with_batches(mut self) -> Self {
        self.track_batches = true;
        self
    }

    pub fn with_serials(mut self) -> Self {
        self.track_serial = true;
        self
    }

    pub fn with_stock_levels(mut self, min_stock: Decimal, max_stock: Option<Decimal>) -> Self {
        self.min_stock = min_stock;
        self.max_stock = max_stock;
        self
    }

    pub fn with_sale_price(mut self, sale_price: Decimal) -> Self {
        self.sale_price = Some(sale_price);
        self
    }
}

/// Warehouse-scoped inventory item: the quantity and cost header that every
/// movement updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub warehouse_id: WarehouseId,
    pub quantity: Decimal,
    /// Last purchase cost.
    pub unit_cost: Decimal,
    /// Running weighted-average cost; `None` until the first receipt.
    pub avg_cost: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub min_stock: Decimal,
    pub max_stock: Option<Decimal>,
    pub cost_method: CostMethod,
    pub track_batches: bool,
    pub track_serial: bool,
    pub is_active: bool,
    /// Bumped by the store on every committed write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for InventoryItem {
    type Id = ItemId;

    fn id(&self) -> ItemId {
        self.id
    }
}

impl InventoryItem {
    pub fn create(new: NewItem, now: DateTime<Utc>) -> InventoryResult<Self> {
        if new.sku.trim().is_empty() {
            return Err(InventoryError::validation("sku cannot be empty"));
        }
        if new.name.trim().is_empty() {
            return Err(InventoryError::validation("name cannot be empty"));
        }
        if new.min_stock.is_sign_negative() {
            return Err(InventoryError::validation("min_stock cannot be negative"));
        }
        if let Some(max) = new.max_stock {
            if max < new.min_stock {
                return Err(InventoryError::validation("max_stock cannot be below min_stock"));
            }
        }
        ensure_unit_cost(new.unit_cost, "unit_cost")?;

        Ok(Self {
            id: ItemId::new(),
            sku: new.sku.trim().to_string(),
            name: new.name,
            unit: new.unit,
            warehouse_id: new.warehouse_id,
            quantity: Decimal::ZERO,
            unit_cost: new.unit_cost,
            avg_cost: None,
            sale_price: new.sale_price,
            min_stock: new.min_stock,
            max_stock: new.max_stock,
            cost_method: new.cost_method,
            track_batches: new.track_batches,
            track_serial: new.track_serial,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Empty counterpart of this item in another warehouse (same SKU and
    /// static attributes, zero stock).
    pub fn counterpart_in(&self, warehouse_id: WarehouseId, now: DateTime<Utc>) -> Self {
        Self {
            id: ItemId::new(),
            sku: self.sku.clone(),
            name: self.name.clone(),
            unit: self.unit.clone(),
            warehouse_id,
            quantity: Decimal::ZERO,
            unit_cost: self.unit_cost,
            avg_cost: None,
            sale_price: self.sale_price,
            min_stock: self.min_stock,
            max_stock: self.max_stock,
            cost_method: self.cost_method,
            track_batches: self.track_batches,
            track_serial: self.track_serial,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Average cost, falling back to the last purchase cost when no receipt
    /// has established one yet.
    pub fn average_cost(&self) -> Decimal {
        self.avg_cost.unwrap_or(self.unit_cost)
    }

    pub fn ensure_in_warehouse(&self, warehouse_id: WarehouseId) -> InventoryResult<()> {
        if self.warehouse_id != warehouse_id {
            return Err(InventoryError::validation(format!(
                "item {} belongs to warehouse {}, not {}",
                self.id, self.warehouse_id, warehouse_id
            )));
        }
        Ok(())
    }

    pub fn ensure_active(&self) -> InventoryResult<()> {
        if !self.is_active {
            return Err(InventoryError::validation(format!("item {} is inactive", self.id)));
        }
        Ok(())
    }

    pub fn ensure_available(&self, quantity: Decimal) -> InventoryResult<()> {
        if self.quantity < quantity {
            return Err(InventoryError::insufficient(quantity, self.quantity));
        }
        Ok(())
    }

    /// Stock may not grow past [`MAX_QUANTITY`].
    pub fn ensure_room_for(&self, quantity: Decimal) -> InventoryResult<()> {
        if self.quantity + quantity > MAX_QUANTITY {
            return Err(InventoryError::validation(format!(
                "item {} would hold more than {} {}",
                self.id, MAX_QUANTITY, self.unit
            )));
        }
        Ok(())
    }

    /// Purchase receipt: blend the average, record last cost, add stock.
    pub fn apply_receipt(&mut self, quantity: Decimal, unit_cost: Decimal, now: DateTime<Utc>) {
        self.blend_average_cost(quantity, unit_cost);
        self.unit_cost = unit_cost;
        self.quantity += quantity;
        self.updated_at = now;
    }

    /// Fold `quantity` units at `unit_cost` into the weighted average without
    /// touching on-hand quantity.
    pub fn blend_average_cost(&mut self, quantity: Decimal, unit_cost: Decimal) {
        self.avg_cost = Some(weighted_average(
            self.quantity,
            self.average_cost(),
            quantity,
            unit_cost,
        ));
    }

    pub fn apply_outbound(&mut self, quantity: Decimal, now: DateTime<Utc>) {
        self.quantity -= quantity;
        self.updated_at = now;
    }

    pub fn apply_inbound(&mut self, quantity: Decimal, now: DateTime<Utc>) {
        self.quantity += quantity;
        self.updated_at = now;
    }
}

/// `(old_qty * old_avg + new_qty * new_cost) / (old_qty + new_qty)`.
///
/// A zero combined quantity yields `new_cost`.
pub fn weighted_average(
    old_qty: Decimal,
    old_avg: Decimal,
    new_qty: Decimal,
    new_cost: Decimal,
) -> Decimal {
    let total = old_qty + new_qty;
    if total.is_zero() {
        return new_cost;
    }
    (old_qty * old_avg + new_qty * new_cost) / total
}

/// Rejects zero, negative and out-of-range quantities.
pub fn ensure_positive(quantity: Decimal, what: &str) -> InventoryResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(InventoryError::validation(format!("{what} must be positive")));
    }
    if quantity > MAX_QUANTITY {
        return Err(InventoryError::validation(format!(
            "{what} cannot exceed {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

/// Unit costs are non-negative and at most [`MAX_UNIT_COST`].
pub fn ensure_unit_cost(unit_cost: Decimal, what: &str) -> InventoryResult<()> {
    if unit_cost < Decimal::ZERO {
        return Err(InventoryError::validation(format!("{what} cannot be negative")));
    }
    if unit_cost > MAX_UNIT_COST {
        return Err(InventoryError::validation(format!(
            "{what} cannot exceed {MAX_UNIT_COST}"
        )));
    }
    Ok(())
}
