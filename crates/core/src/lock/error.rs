//! Lease error types.

use thiserror::Error;

/// Errors surfaced by lease acquisition.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another holder kept the lease through every attempt.
    #[error("lease busy after {attempts} attempts")]
    Busy {
        /// How many attempts were made.
        attempts: u32,
    },

    /// The lock store could not be reached. Acquisition fails closed.
    #[error("lock store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by a [`LockStore`](super::store::LockStore) backend.
#[derive(Debug, Error)]
pub enum LockStoreError {
    /// The backend could not be reached or answered with an error.
    #[error("lock store unreachable: {0}")]
    Unreachable(String),
}
