//! In-process per-cluster lease.
//!
//! Mutating operations on the same `(namespace, tag)` run one at a time.
//! Nothing here coordinates with other processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct LeaseTable {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one mutating operation.
pub type Lease = OwnedMutexGuard<()>;

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, namespace: &str, tag: &str) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Drop slots nobody holds or waits on.
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        slots
            .entry(format!("{namespace}/{tag}"))
            .or_default()
            .clone()
    }

    /// Wait for and take the lease of one cluster.
    pub async fn acquire(&self, namespace: &str, tag: &str) -> Lease {
        self.slot(namespace, tag).lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl LeaseTable {
        fn try_acquire(&self, namespace: &str, tag: &str) -> Option<Lease> {
            self.slot(namespace, tag).try_lock_owned().ok()
        }

        fn active(&self) -> usize {
            self.slots
                .lock()
                .unwrap()
                .values()
                .filter(|slot| Arc::strong_count(slot) > 1)
                .count()
        }
    }

    #[tokio::test]
    async fn same_cluster_is_exclusive() {
        let table = LeaseTable::new();
        let held = table.acquire("default", "abcd").await;
        assert!(table.try_acquire("default", "abcd").is_none());
        drop(held);
        assert!(table.try_acquire("default", "abcd").is_some());
    }

    #[tokio::test]
    async fn different_clusters_are_independent() {
        let table = LeaseTable::new();
        let _a = table.acquire("default", "abcd").await;
        assert!(table.try_acquire("default", "efgh").is_some());
        assert!(table.try_acquire("other", "abcd").is_some());
    }

    #[tokio::test]
    async fn released_slots_are_pruned() {
        let table = LeaseTable::new();
        {
            let _a = table.acquire("default", "abcd").await;
            assert_eq!(table.active(), 1);
        }
        assert_eq!(table.active(), 0);
        let _b = table.acquire("default", "efgh").await;
        assert_eq!(table.slots.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn waiter_gets_lease_after_release() {
        let table = Arc::new(LeaseTable::new());
        let held = table.acquire("default", "abcd").await;

        let waiter = {
            let table = table.clone();
            tokio::spawn(async move {
                let _lease = table.acquire("default", "abcd").await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
    }
}
