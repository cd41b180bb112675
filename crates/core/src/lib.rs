//! `stockledger-core`: shared building blocks for the stock ledger.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod version;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AlertId, BatchId, ItemId, MovementId, SerialNumberId, UserId, WarehouseId};
pub use version::ExpectedVersion;
