//! Transactional persistence boundary for the inventory tables.
//!
//! Services talk to [`InventoryStore`] only; the in-memory implementation
//! backs tests and development.

pub mod in_memory;
pub mod locks;
pub mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use locks::{ItemLockGuard, ItemLocks};
pub use r#trait::{InventoryStore, StoreTx};
