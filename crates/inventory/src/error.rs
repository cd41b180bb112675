//! Error taxonomy for costing and stock movements.

use rust_decimal::Decimal;
use thiserror::Error;

use stockledger_core::{DomainError, ItemId};

/// Result type used by inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Every failure a costing or movement operation can report.
///
/// Expected business conditions (missing item, short stock) are ordinary
/// variants here and are surfaced to the caller; only `TransactionConflict`
/// is retried automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("inventory item {0} not found")]
    ItemNotFound(ItemId),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: Decimal, available: Decimal },

    #[error("adjustment of {delta} would take stock of {current} below zero")]
    NegativeStockRejected { current: Decimal, delta: Decimal },

    #[error("serial numbers not available: {}", serials.join(", "))]
    SerialNumberNotAvailable { serials: Vec<String> },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl InventoryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::TransactionConflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn insufficient(requested: Decimal, available: Decimal) -> Self {
        Self::InsufficientStock { requested, available }
    }

    /// Units missing to satisfy the request, for `InsufficientStock`.
    pub fn shortfall(&self) -> Option<Decimal> {
        match self {
            Self::InsufficientStock { requested, available } => Some(*requested - *available),
            _ => None,
        }
    }

    /// Whether the operation may succeed if simply re-run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionConflict(_))
    }
}

impl From<DomainError> for InventoryError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::Conflict(msg) => Self::TransactionConflict(msg),
        }
    }
}
