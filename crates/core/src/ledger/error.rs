//! Ledger error types.
//!
//! Every fallible ledger operation returns `LedgerError`. Each variant
//! carries a stable machine-readable code via [`LedgerError::error_code`],
//! and [`LedgerError::is_retryable`] tells callers which failures are worth
//! retrying as-is.

use thiserror::Error;

use scrip_shared::types::{LedgerId, TransactionId};

use super::store::StoreError;
use super::transaction::TransactionState;
use crate::lock::LockError;

/// Errors returned by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Concurrency Errors ==========
    /// The ledger's lease could not be acquired within the attempt budget.
    #[error("ledger is busy: lease not acquired after {attempts} attempts")]
    LockUnavailable {
        /// How many acquisition attempts were made.
        attempts: u32,
    },

    // ========== Balance Errors ==========
    /// A debit would have taken the balance negative.
    #[error("insufficient balance: requested {requested}, available {balance}")]
    InsufficientBalance {
        /// The (negative) quantity that was requested.
        requested: i64,
        /// The balance at the time of the check.
        balance: i64,
    },

    // ========== Idempotency Errors ==========
    /// The idempotency key is already taken and the caller asked for strict
    /// rejection instead of replay.
    #[error("duplicate operation: idempotency key '{idempotency_key}' already used")]
    DuplicateOperation {
        /// The key that collided.
        idempotency_key: String,
    },

    // ========== State Errors ==========
    /// The requested state transition is not permitted.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// The transaction's current state.
        from: TransactionState,
        /// The state that was requested.
        to: TransactionState,
    },

    // ========== Reversal Errors ==========
    /// The transaction has already been reversed.
    #[error("transaction {0} has already been reversed")]
    AlreadyReversed(TransactionId),

    /// Only committed transactions can be reversed.
    #[error("cannot reverse transaction {id}: state is {state}, not committed")]
    CannotReverseUncommitted {
        /// The transaction that was targeted.
        id: TransactionId,
        /// Its actual state.
        state: TransactionState,
    },

    /// Adjustment transactions are corrections; undoing one takes another
    /// adjustment, not a reversal.
    #[error("cannot reverse transaction {0}: it carries an adjustment")]
    CannotReverseAdjustment(TransactionId),

    // ========== Deposit Errors ==========
    /// Deposits must be strictly positive.
    #[error("invalid deposit quantity {quantity}: deposits must be positive")]
    InvalidDeposit {
        /// The rejected quantity.
        quantity: i64,
    },

    // ========== Adjustment Errors ==========
    /// The adjustment's transaction exists but its audit record could not be
    /// written.
    #[error("adjustment transaction {transaction_id} created but audit record failed")]
    AdjustmentIncomplete {
        /// The already-created transaction carrying the quantity.
        transaction_id: TransactionId,
        /// Why the audit record write failed.
        #[source]
        source: StoreError,
    },

    // ========== Lookup Errors ==========
    /// No ledger with the given id.
    #[error("ledger {0} not found")]
    LedgerNotFound(LedgerId),

    /// No transaction with the given id.
    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    // ========== Infrastructure Errors ==========
    /// The backing store or lock store could not be reached.
    #[error("backing store unavailable: {0}")]
    BackingStoreUnavailable(String),
}

impl LedgerError {
    /// Returns a stable machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::LockUnavailable { .. } => "LOCK_UNAVAILABLE",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::DuplicateOperation { .. } => "DUPLICATE_OPERATION",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::AlreadyReversed(_) => "ALREADY_REVERSED",
            Self::CannotReverseUncommitted { .. } => "CANNOT_REVERSE_UNCOMMITTED",
            Self::CannotReverseAdjustment(_) => "CANNOT_REVERSE_ADJUSTMENT",
            Self::InvalidDeposit { .. } => "INVALID_DEPOSIT",
            Self::AdjustmentIncomplete { .. } => "ADJUSTMENT_INCOMPLETE",
            Self::LedgerNotFound(_) => "LEDGER_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::BackingStoreUnavailable(_) => "BACKING_STORE_UNAVAILABLE",
        }
    }

    /// Returns true if retrying the same request may succeed.
    ///
    /// Contention and infrastructure outages are transient. Everything else
    /// reflects the request or the ledger's state and will fail again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LockUnavailable { .. } | Self::BackingStoreUnavailable(_)
        )
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LedgerNotFound(id) => Self::LedgerNotFound(id),
            StoreError::TransactionNotFound(id) => Self::TransactionNotFound(id),
            StoreError::InvalidTransition { from, to } => {
                Self::InvalidStateTransition { from, to }
            }
            StoreError::DuplicateKey {
                idempotency_key, ..
            }
            | StoreError::DuplicateLedger { idempotency_key } => {
                Self::DuplicateOperation { idempotency_key }
            }
            StoreError::Unavailable(message) => Self::BackingStoreUnavailable(message),
        }
    }
}

impl From<LockError> for LedgerError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Busy { attempts } => Self::LockUnavailable { attempts },
            LockError::Unavailable(message) => Self::BackingStoreUnavailable(message),
        }
    }
}
