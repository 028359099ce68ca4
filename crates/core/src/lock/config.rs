//! Lease tuning knobs.

use std::time::Duration;

/// Configuration for lease acquisition and lifetime.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// How long a lease lives without renewal.
    pub lease_ttl: Duration,
    /// How many times to try acquiring before giving up.
    pub acquire_attempts: u32,
    /// Pause between acquisition attempts.
    pub retry_delay: Duration,
    /// Whether held leases are renewed in the background.
    pub auto_renew: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::from_secs(60),
            acquire_attempts: 3,
            retry_delay: Duration::from_millis(50),
            auto_renew: true,
        }
    }
}

impl LockConfig {
    /// Sets the lease TTL.
    #[must_use]
    pub const fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Sets the acquisition attempt budget.
    #[must_use]
    pub const fn with_acquire_attempts(mut self, attempts: u32) -> Self {
        self.acquire_attempts = attempts;
        self
    }

    /// Sets the pause between acquisition attempts.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Enables or disables background renewal.
    #[must_use]
    pub const fn with_auto_renew(mut self, auto_renew: bool) -> Self {
        self.auto_renew = auto_renew;
        self
    }
}

impl From<&scrip_shared::config::LeaseConfig> for LockConfig {
    fn from(config: &scrip_shared::config::LeaseConfig) -> Self {
        Self {
            lease_ttl: Duration::from_secs(config.ttl_secs),
            acquire_attempts: config.acquire_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            auto_renew: true,
        }
    }
}
