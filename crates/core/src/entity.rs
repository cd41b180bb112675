//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Every persisted stock-ledger record (items, batches, serials, movements,
/// alerts) implements this so stores can key their tables generically.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
