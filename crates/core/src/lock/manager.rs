//! Lease acquisition and lifetime management.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use scrip_shared::types::LedgerId;

use super::config::LockConfig;
use super::error::{LockError, LockStoreError};
use super::store::LockStore;

/// Namespace prefixes for lease keys.
pub mod keys {
    /// Prefix for per-ledger lease keys.
    pub const LEDGER_LEASE: &str = "scrip:ledger:lease";
}

/// Lease key for a ledger.
#[must_use]
pub fn lease_key(ledger_id: LedgerId) -> String {
    format!("{}:{ledger_id}", keys::LEDGER_LEASE)
}

/// Hands out per-ledger leases backed by a [`LockStore`].
pub struct LockManager<L> {
    store: Arc<L>,
    config: LockConfig,
}

impl<L> Clone for LockManager<L> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<L> LockManager<L>
where
    L: LockStore + 'static,
{
    /// Creates a manager over the given store.
    #[must_use]
    pub fn new(store: Arc<L>, config: LockConfig) -> Self {
        Self { store, config }
    }

    /// Tries to take the ledger's lease without blocking other ledgers.
    ///
    /// Makes up to `acquire_attempts` tries, pausing `retry_delay` between
    /// them, and returns [`LockError::Busy`] once the budget is spent. An
    /// unreachable lock store fails the acquisition immediately: without
    /// the store there is no way to know the lease is free, and guessing
    /// would let two writers into the same ledger.
    pub async fn acquire(&self, ledger_id: LedgerId) -> Result<LedgerLease<L>, LockError> {
        let key = lease_key(ledger_id);
        let token = Uuid::new_v4().to_string();
        let attempts = self.config.acquire_attempts.max(1);

        for attempt in 1..=attempts {
            match self
                .store
                .add_if_absent(&key, &token, self.config.lease_ttl)
                .await
            {
                Ok(true) => {
                    debug!(key = %key, attempt, "Acquired ledger lease");
                    return Ok(LedgerLease::held(
                        Arc::clone(&self.store),
                        key,
                        token,
                        &self.config,
                    ));
                }
                Ok(false) => {
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
                Err(LockStoreError::Unreachable(message)) => {
                    warn!(key = %key, error = %message, "Lock store unreachable, failing closed");
                    return Err(LockError::Unavailable(message));
                }
            }
        }

        Err(LockError::Busy { attempts })
    }
}

/// A held per-ledger lease.
///
/// While `auto_renew` is on, a background task re-arms the TTL at half-life
/// so an operation outliving one TTL keeps its lease. Dropping the lease
/// without releasing schedules a best-effort delete; if that never lands,
/// the TTL reclaims the key.
pub struct LedgerLease<L: LockStore + 'static> {
    store: Arc<L>,
    key: String,
    token: String,
    released: bool,
    renewal: Option<JoinHandle<()>>,
}

impl<L: LockStore + 'static> LedgerLease<L> {
    fn held(store: Arc<L>, key: String, token: String, config: &LockConfig) -> Self {
        let renewal = config.auto_renew.then(|| {
            let store = Arc::clone(&store);
            let key = key.clone();
            let ttl = config.lease_ttl;
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(ttl / 2).await;
                    match store.renew(&key, ttl).await {
                        Ok(true) => {}
                        // Key expired or store gone; nothing left to renew.
                        Ok(false) | Err(_) => break,
                    }
                }
            })
        });

        Self {
            store,
            key,
            token,
            released: false,
            renewal,
        }
    }

    /// Releases the lease.
    ///
    /// A failed delete is logged and left to the TTL.
    pub async fn release(mut self) {
        if let Some(task) = self.renewal.take() {
            task.abort();
        }
        match self.store.delete(&self.key).await {
            Ok(()) => debug!(key = %self.key, token = %self.token, "Released ledger lease"),
            Err(err) => {
                warn!(key = %self.key, error = %err, "Lease release failed, TTL will reclaim it");
            }
        }
        self.released = true;
    }
}

// Manual impl: the store type parameter has no Debug bound.
impl<L: LockStore + 'static> std::fmt::Debug for LedgerLease<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerLease")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl<L: LockStore + 'static> Drop for LedgerLease<L> {
    fn drop(&mut self) {
        if let Some(task) = self.renewal.take() {
            task.abort();
        }
        if !self.released
            && let Ok(handle) = tokio::runtime::Handle::try_current()
        {
            let store = Arc::clone(&self.store);
            let key = std::mem::take(&mut self.key);
            handle.spawn(async move {
                let _ = store.delete(&key).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    #[derive(Default)]
    struct FakeLockStore {
        entries: Mutex<HashMap<String, String>>,
        add_calls: AtomicU32,
    }

    #[async_trait]
    impl LockStore for FakeLockStore {
        async fn add_if_absent(
            &self,
            key: &str,
            value: &str,
            _ttl: Duration,
        ) -> Result<bool, LockStoreError> {
            self.add_calls.fetch_add(1, Ordering::SeqCst);
            let mut entries = self.entries.lock().unwrap();
            if entries.contains_key(key) {
                Ok(false)
            } else {
                entries.insert(key.to_string(), value.to_string());
                Ok(true)
            }
        }

        async fn delete(&self, key: &str) -> Result<(), LockStoreError> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn renew(&self, key: &str, _ttl: Duration) -> Result<bool, LockStoreError> {
            Ok(self.entries.lock().unwrap().contains_key(key))
        }
    }

    struct FailingLockStore;

    #[async_trait]
    impl LockStore for FailingLockStore {
        async fn add_if_absent(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Duration,
        ) -> Result<bool, LockStoreError> {
            Err(LockStoreError::Unreachable("injected outage".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), LockStoreError> {
            Err(LockStoreError::Unreachable("injected outage".to_string()))
        }

        async fn renew(&self, _key: &str, _ttl: Duration) -> Result<bool, LockStoreError> {
            Err(LockStoreError::Unreachable("injected outage".to_string()))
        }
    }

    fn test_config() -> LockConfig {
        LockConfig::default()
            .with_retry_delay(Duration::from_millis(1))
            .with_auto_renew(false)
    }

    #[tokio::test]
    async fn test_acquire_free_lease() {
        let store = Arc::new(FakeLockStore::default());
        let manager = LockManager::new(Arc::clone(&store), test_config());

        let lease = manager.acquire(LedgerId::new()).await.unwrap();
        assert_eq!(store.entries.lock().unwrap().len(), 1);
        lease.release().await;
        assert!(store.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_held_lease_is_busy() {
        let store = Arc::new(FakeLockStore::default());
        let manager = LockManager::new(Arc::clone(&store), test_config());
        let ledger_id = LedgerId::new();

        let _held = manager.acquire(ledger_id).await.unwrap();
        let err = manager.acquire(ledger_id).await.unwrap_err();
        assert!(matches!(err, LockError::Busy { attempts: 3 }));
    }

    #[tokio::test]
    async fn test_busy_consumes_full_attempt_budget() {
        let store = Arc::new(FakeLockStore::default());
        let manager =
            LockManager::new(Arc::clone(&store), test_config().with_acquire_attempts(5));
        let ledger_id = LedgerId::new();

        let _held = manager.acquire(ledger_id).await.unwrap();
        store.add_calls.store(0, Ordering::SeqCst);

        let err = manager.acquire(ledger_id).await.unwrap_err();
        assert!(matches!(err, LockError::Busy { attempts: 5 }));
        assert_eq!(store.add_calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_release_frees_the_lease_for_others() {
        let store = Arc::new(FakeLockStore::default());
        let manager = LockManager::new(Arc::clone(&store), test_config());
        let ledger_id = LedgerId::new();

        let first = manager.acquire(ledger_id).await.unwrap();
        first.release().await;
        let second = manager.acquire(ledger_id).await.unwrap();
        second.release().await;
    }

    #[tokio::test]
    async fn test_leases_on_different_ledgers_do_not_contend() {
        let store = Arc::new(FakeLockStore::default());
        let manager = LockManager::new(Arc::clone(&store), test_config());

        let a = manager.acquire(LedgerId::new()).await.unwrap();
        let b = manager.acquire(LedgerId::new()).await.unwrap();
        a.release().await;
        b.release().await;
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_closed() {
        let manager = LockManager::new(Arc::new(FailingLockStore), test_config());

        let err = manager.acquire(LedgerId::new()).await.unwrap_err();
        assert!(matches!(err, LockError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_drop_releases_best_effort() {
        let store = Arc::new(FakeLockStore::default());
        let manager = LockManager::new(Arc::clone(&store), test_config());
        let ledger_id = LedgerId::new();

        let lease = manager.acquire(ledger_id).await.unwrap();
        drop(lease);

        // The cleanup task needs a moment to run.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let reacquired = manager.acquire(ledger_id).await.unwrap();
        reacquired.release().await;
    }

    #[tokio::test]
    async fn test_zero_attempt_budget_still_tries_once() {
        let store = Arc::new(FakeLockStore::default());
        let manager =
            LockManager::new(Arc::clone(&store), test_config().with_acquire_attempts(0));

        let lease = manager.acquire(LedgerId::new()).await.unwrap();
        lease.release().await;
    }

    #[tokio::test]
    async fn test_lease_debug_omits_the_store() {
        let store = Arc::new(FakeLockStore::default());
        let manager = LockManager::new(Arc::clone(&store), test_config());

        // FakeLockStore has no Debug impl; the lease must render without it.
        let lease = manager.acquire(LedgerId::new()).await.unwrap();
        let rendered = format!("{lease:?}");
        assert!(rendered.contains("LedgerLease"));
        assert!(rendered.contains("released: false"));
        lease.release().await;
    }

    #[test]
    fn test_lease_key_format() {
        let ledger_id = LedgerId::new();
        assert_eq!(
            lease_key(ledger_id),
            format!("scrip:ledger:lease:{ledger_id}")
        );
    }
}
