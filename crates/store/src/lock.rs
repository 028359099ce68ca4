//! Lease backends.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use tracing::{debug, error, info};

use scrip_core::lock::{LockStore, LockStoreError};

struct LeaseEntry {
    holder: String,
    deadline: Instant,
}

/// In-process [`LockStore`] with real TTL expiry.
///
/// Entry-level locking in the map makes `add_if_absent` atomic; an expired
/// entry counts as absent.
#[derive(Default)]
pub struct MemoryLockStore {
    entries: DashMap<String, LeaseEntry>,
}

impl MemoryLockStore {
    /// Creates an empty lock store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn add_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LockStoreError> {
        let entry = LeaseEntry {
            holder: value.to_string(),
            deadline: Instant::now() + ttl,
        };
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                if slot.get().deadline <= Instant::now() {
                    slot.insert(entry);
                    Ok(true)
                } else {
                    debug!(key, holder = %slot.get().holder, "Lease already held");
                    Ok(false)
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), LockStoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn renew(&self, key: &str, ttl: Duration) -> Result<bool, LockStoreError> {
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.deadline > Instant::now() => {
                entry.deadline = Instant::now() + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Redis-backed [`LockStore`] for multi-node deployments.
///
/// `SET NX EX` gives the atomic add-if-absent; Redis expires the key if the
/// holder dies. Any Redis failure maps to
/// [`LockStoreError::Unreachable`], which acquisition treats as fail-closed.
#[derive(Clone)]
pub struct RedisLockStore {
    conn: ConnectionManager,
}

impl RedisLockStore {
    /// Connects to Redis at `url`.
    pub async fn connect(url: &str) -> Result<Self, LockStoreError> {
        let client =
            redis::Client::open(url).map_err(|e| LockStoreError::Unreachable(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| LockStoreError::Unreachable(e.to_string()))?;
        info!("Connected to Redis lock store");
        Ok(Self { conn })
    }

    /// Wraps an existing connection manager.
    #[must_use]
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn add_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LockStoreError> {
        let mut conn = self.conn.clone();
        // EX rejects 0, so a sub-second TTL still locks for one second.
        let outcome: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis error acquiring lease {}: {}", key, e);
                LockStoreError::Unreachable(e.to_string())
            })?;
        Ok(outcome.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), LockStoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis error releasing lease {}: {}", key, e);
                LockStoreError::Unreachable(e.to_string())
            })?;
        Ok(())
    }

    async fn renew(&self, key: &str, ttl: Duration) -> Result<bool, LockStoreError> {
        let mut conn = self.conn.clone();
        let renewed: bool = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis error renewing lease {}: {}", key, e);
                LockStoreError::Unreachable(e.to_string())
            })?;
        Ok(renewed)
    }
}
