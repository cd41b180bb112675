//! Exclusive per-item locks for write transactions.

use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex, PoisonError};

use stockledger_core::ItemId;
use stockledger_inventory::{InventoryError, InventoryResult};

/// Lock table keyed by item id.
///
/// A transaction's whole scope is acquired at once: the caller blocks until
/// none of its ids are held, then takes all of them. Partial holds never
/// exist, so two scopes cannot wait on each other.
#[derive(Debug, Default)]
pub struct ItemLocks {
    held: Mutex<BTreeSet<ItemId>>,
    released: Condvar,
}

impl ItemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, ids: &[ItemId]) -> InventoryResult<ItemLockGuard<'_>> {
        let mut wanted = ids.to_vec();
        wanted.sort();
        wanted.dedup();

        let mut held = self
            .held
            .lock()
            .map_err(|_| InventoryError::storage("item lock table poisoned"))?;
        while wanted.iter().any(|id| held.contains(id)) {
            held = self
                .released
                .wait(held)
                .map_err(|_| InventoryError::storage("item lock table poisoned"))?;
        }
        held.extend(wanted.iter().copied());

        Ok(ItemLockGuard { locks: self, ids: wanted })
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self, id: ItemId) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(&id))
            .unwrap_or(false)
    }
}

/// Releases its ids on drop.
#[derive(Debug)]
pub struct ItemLockGuard<'a> {
    locks: &'a ItemLocks,
    ids: Vec<ItemId>,
}

impl ItemLockGuard<'_> {
    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }
}

impl Drop for ItemLockGuard<'_> {
    fn drop(&mut self) {
        // Release even after a panic elsewhere poisoned the table.
        let mut held = self.locks.held.lock().unwrap_or_else(PoisonError::into_inner);
        for id in &self.ids {
            held.remove(id);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn scope_is_sorted_and_deduplicated() {
        let locks = ItemLocks::new();
        let (a, b) = (ItemId::new(), ItemId::new());
        let guard = locks.acquire(&[b, a, b]).unwrap();

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(guard.ids(), expected.as_slice());
        assert!(locks.is_held(a) && locks.is_held(b));

        drop(guard);
        assert!(!locks.is_held(a));
    }

    #[test]
    fn overlapping_scope_waits_for_release() {
        let locks = Arc::new(ItemLocks::new());
        let (a, b) = (ItemId::new(), ItemId::new());
        let guard = locks.acquire(&[a]).unwrap();
        let acquired = Arc::new(AtomicBool::new(false));

        let handle = {
            let locks = Arc::clone(&locks);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let _g = locks.acquire(&[b, a]).unwrap();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));
        assert!(!locks.is_held(b), "partial scope must not be held while waiting");

        drop(guard);
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }
}
