//! Per-target mutual exclusion.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async locks keyed by target name.
///
/// Share one table (behind an `Arc`) between every reconciler that may touch
/// the same targets.
#[derive(Debug, Default)]
pub struct TargetLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TargetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `target`.
    pub async fn acquire(&self, target: &str) -> OwnedMutexGuard<()> {
        // clone the Arc so the shard lock is released before awaiting
        let lock = Arc::clone(&self.locks.entry(target.to_string()).or_default());
        lock.lock_owned().await
    }

    /// Whether `target` is currently held.
    pub fn is_held(&self, target: &str) -> bool {
        self.locks
            .get(target)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Number of targets seen so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_target_is_exclusive() {
        let locks = Arc::new(TargetLocks::new());
        let guard = locks.acquire("bitcoind").await;
        assert!(locks.is_held("bitcoind"));

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("bitcoind").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        let joined = tokio::time::timeout(Duration::from_secs(1), contender).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_different_targets_do_not_block() {
        let locks = TargetLocks::new();
        let _a = locks.acquire("bitcoind").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("litecoind")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
