//! Ledger bookkeeping logic.
//!
//! This module implements the core ledger functionality:
//! - Ledgers and their derived balances
//! - The transaction lifecycle state machine
//! - Idempotency key derivation for transaction creation
//! - Reversals, adjustments, and deposits
//! - Error types for ledger operations
//! - The persistence contract and the orchestrating service

pub mod balance;
pub mod error;
pub mod events;
pub mod idempotency;
pub mod service;
pub mod store;
pub mod transaction;
pub mod types;

pub use error::LedgerError;
pub use events::ReversalCommitted;
pub use idempotency::IdempotencyContext;
pub use service::LedgerService;
pub use store::{StoreError, TransactionStore};
pub use transaction::{Transaction, TransactionOrigin, TransactionState};
pub use types::{
    Adjustment, AdjustmentReason, CreateAdjustmentInput, CreateDepositInput, CreateLedgerInput,
    CreateTransactionInput, Deposit, DuplicatePolicy, Ledger, UnitOfValue, CENTS_PER_US_DOLLAR,
};
