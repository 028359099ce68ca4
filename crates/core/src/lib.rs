//! Core business logic for Scrip.
//!
//! This crate contains pure domain logic with ZERO storage or web dependencies.
//! Backends plug in through the `TransactionStore` and `LockStore` contracts.
//!
//! # Modules
//!
//! - `ledger` - Ledgers, transactions, balance enforcement, reversals, adjustments
//! - `lock` - Per-ledger mutual-exclusion lease

pub mod ledger;
pub mod lock;
