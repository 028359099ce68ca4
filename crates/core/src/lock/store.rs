//! Storage contract for leases.

use std::time::Duration;

use async_trait::async_trait;

use super::error::LockStoreError;

/// Key-value backend with atomic add-if-absent and TTL expiry.
///
/// Correctness of the lease rests on `add_if_absent` being atomic: when two
/// holders race for the same key, the backend must admit exactly one. Every
/// written key carries a TTL so a dead holder's lease expires on its own.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Writes `value` under `key` with `ttl` if, and only if, the key is
    /// absent. Returns true when this call created the key.
    async fn add_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LockStoreError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), LockStoreError>;

    /// Resets `key`'s TTL. Returns false if the key no longer exists.
    async fn renew(&self, key: &str, ttl: Duration) -> Result<bool, LockStoreError>;
}
