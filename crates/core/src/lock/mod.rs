//! Per-ledger mutual-exclusion lease.
//!
//! One lease per ledger serializes the read-compute-write window of
//! transaction creation. Acquisition is non-blocking with a bounded retry
//! budget, leases expire on their own if a holder dies, and a background
//! task renews long-held leases so they do not expire mid-operation.

pub mod config;
pub mod error;
pub mod manager;
pub mod store;

pub use config::LockConfig;
pub use error::{LockError, LockStoreError};
pub use manager::{LedgerLease, LockManager};
pub use store::LockStore;
