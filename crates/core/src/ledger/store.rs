//! Persistence contract for ledgers and their rows.
//!
//! The service is generic over this trait; backends live in `scrip-store`.
//! Implementations enforce the per-ledger idempotency-key uniqueness and the
//! state machine at the row level, so those invariants hold even for callers
//! that bypass the service.

use async_trait::async_trait;
use thiserror::Error;

use scrip_shared::types::{LedgerId, TransactionId};

use super::transaction::{Transaction, TransactionState};
use super::types::{Adjustment, Deposit, Ledger};

/// Errors surfaced by a [`TransactionStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No ledger with the given id.
    #[error("ledger {0} not found")]
    LedgerNotFound(LedgerId),

    /// No transaction with the given id.
    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    /// The requested state change violates the transaction state machine.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// The row's current state.
        from: TransactionState,
        /// The state that was requested.
        to: TransactionState,
    },

    /// A transaction with this idempotency key already exists in the ledger.
    #[error("idempotency key '{idempotency_key}' already used in ledger {ledger_id}")]
    DuplicateKey {
        /// The ledger whose key space collided.
        ledger_id: LedgerId,
        /// The key that collided.
        idempotency_key: String,
    },

    /// A ledger with this idempotency key already exists.
    #[error("a ledger with idempotency key '{idempotency_key}' already exists")]
    DuplicateLedger {
        /// The key that collided.
        idempotency_key: String,
    },

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage backend for ledgers, transactions, adjustments, and deposits.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persists a new ledger.
    ///
    /// Fails with [`StoreError::DuplicateLedger`] if the idempotency key is
    /// already taken.
    async fn insert_ledger(&self, ledger: &Ledger) -> Result<(), StoreError>;

    /// Fetches a ledger by id.
    async fn find_ledger(&self, id: LedgerId) -> Result<Option<Ledger>, StoreError>;

    /// Fetches a ledger by its idempotency key.
    async fn find_ledger_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<Ledger>, StoreError>;

    /// Persists a new transaction.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if the ledger already holds a
    /// row with the same idempotency key. Two racing inserts of the same key
    /// must never both succeed.
    async fn insert(&self, transaction: &Transaction) -> Result<(), StoreError>;

    /// Returns the ledger's transactions whose state is in `states`.
    async fn query(
        &self,
        ledger_id: LedgerId,
        states: &[TransactionState],
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Fetches a transaction by ledger and idempotency key.
    async fn find_by_idempotency_key(
        &self,
        ledger_id: LedgerId,
        idempotency_key: &str,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Fetches a transaction by id.
    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Moves a transaction to `state` and returns the updated row.
    ///
    /// Fails with [`StoreError::InvalidTransition`] when the state machine
    /// forbids the move. The check and the write are atomic with respect to
    /// other state updates on the same row.
    async fn update_state(
        &self,
        id: TransactionId,
        state: TransactionState,
    ) -> Result<Transaction, StoreError>;

    /// Finds the reversal row targeting `original`, if one exists.
    async fn find_reversal_of(
        &self,
        original: TransactionId,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Persists an adjustment's audit record.
    async fn insert_adjustment(&self, adjustment: &Adjustment) -> Result<(), StoreError>;

    /// Fetches the audit record attached to an adjustment transaction.
    async fn find_adjustment_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<Adjustment>, StoreError>;

    /// Persists a deposit record.
    async fn insert_deposit(&self, deposit: &Deposit) -> Result<(), StoreError>;

    /// Returns all deposit records for a ledger.
    async fn deposits_for_ledger(
        &self,
        ledger_id: LedgerId,
    ) -> Result<Vec<Deposit>, StoreError>;
}
