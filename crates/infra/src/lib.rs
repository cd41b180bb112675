//! Infrastructure layer: transactional stores, retry, audit, configuration,
//! and the inventory application service.

pub mod audit;
pub mod config;
pub mod retry;
pub mod service;
pub mod store;


pub use audit::{AuditEntry, AuditError, AuditLogger, InMemoryAuditLog, TracingAuditLogger};
pub use config::{ConfigError, StockLedgerConfig};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use service::InventoryService;
pub use store::{InMemoryInventoryStore, InventoryStore, StoreTx};
