//! Inventory costing domain.
//!
//! This crate contains the business rules for stock costing and alerting,
//! implemented purely as deterministic domain logic (no IO, no storage).
//! Stores and orchestration live in `stockledger-infra`.

pub mod alert;
pub mod batch;
pub mod error;
pub mod item;
pub mod movement;
pub mod report;
pub mod serial;
pub mod valuation;

pub use alert::{AlertPolicy, AlertSignal, AlertTransition, AlertType, StockAlert};
pub use batch::{Batch, BatchDraw, BatchReceipt, ReceiptOrder};
pub use error::{InventoryError, InventoryResult};
pub use item::{CostMethod, InventoryItem, NewItem};
pub use movement::{MovementDirection, MovementFilter, MovementReference, MovementType, StockMovement};
pub use report::{ItemValuation, ValuationReport, ValuationScope, ValuationTotals};
pub use serial::{SerialNumber, SerialStatus};
pub use valuation::{CostCalculation, calculate_cost};
