//! Idempotency key derivation.
//!
//! Creation endpoints accept an explicit key, but most callers let the
//! service derive one from what they are doing. Derived keys are stable for
//! genuinely identical requests and distinct otherwise, so a retry replays
//! the stored row instead of double-spending.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use scrip_shared::types::LedgerId;

/// Fixed fragments used when composing idempotency keys.
pub mod keys {
    /// Prefix for a ledger keyed by its owning entity.
    pub const LEDGER_FOR_OWNER: &str = "ledger-for-owner";
    /// Prefix for a ledger with no owning entity.
    pub const LEDGER_DEFAULT: &str = "ledger-default";
    /// Suffix for the deposit created during ledger bootstrap.
    pub const INITIAL_DEPOSIT: &str = "initial-deposit";
    /// Fragment marking adjustment transactions.
    pub const ADJUSTMENT: &str = "adjustment";
}

/// Caller-supplied facts that distinguish one request from another.
///
/// Entries are kept sorted by key, so two contexts holding the same pairs
/// digest identically regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdempotencyContext {
    entries: BTreeMap<String, String>,
}

impl IdempotencyContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key/value pair to the context.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Returns true if no entries have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hex digest of the sorted entries.
    #[must_use]
    pub fn digest(&self) -> String {
        let serialized = self
            .entries
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(serialized.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Key for a ledger owned by a specific external entity.
///
/// Repeated bootstrap calls for the same owner land on the same ledger.
#[must_use]
pub fn ledger_key_for_owner(owner: Uuid) -> String {
    format!("{}-{owner}", keys::LEDGER_FOR_OWNER)
}

/// Key for a ledger with no owning entity.
///
/// Carries a fresh UUID, so every call creates a new ledger.
#[must_use]
pub fn default_ledger_key() -> String {
    format!("{}-{}", keys::LEDGER_DEFAULT, Uuid::new_v4())
}

/// Key for a transaction, derived from its ledger, quantity, and context.
///
/// An empty context is salted with a fresh UUID: a caller who supplied no
/// distinguishing facts gets no replay either, because two such requests
/// are indistinguishable and must not collapse into one row.
#[must_use]
pub fn transaction_key(ledger_key: &str, quantity: i64, context: &IdempotencyContext) -> String {
    let digest = if context.is_empty() {
        IdempotencyContext::new()
            .with("default_identifier", Uuid::new_v4().to_string())
            .digest()
    } else {
        context.digest()
    };
    format!("{ledger_key}-{quantity}-{digest}")
}

/// Key for the deposit transaction created during ledger bootstrap.
///
/// Deterministic given the ledger key, so a replayed bootstrap cannot seed
/// the ledger twice.
#[must_use]
pub fn initial_deposit_key(ledger_key: &str, quantity: i64) -> String {
    format!("{ledger_key}-{quantity}-{}", keys::INITIAL_DEPOSIT)
}

/// Key for an adjustment transaction.
///
/// Carries a fresh UUID because operators do legitimately issue the same
/// adjustment twice; explicit keys opt in to replay.
#[must_use]
pub fn adjustment_key(ledger_id: LedgerId, quantity: i64) -> String {
    format!(
        "{ledger_id}-{}-{quantity}-reason-{}",
        keys::ADJUSTMENT,
        Uuid::new_v4()
    )
}

/// Key for the reversal of the transaction stored under `original_key`.
///
/// Deterministic, so two racing reversal attempts collide at the store and
/// exactly one row wins.
#[must_use]
pub fn reversal_key(original_key: &str) -> String {
    format!("{original_key}-reversal")
}
