//! Storage and lock backends for Scrip.
//!
//! Implements the `scrip-core` contracts:
//!
//! - `MemoryStore` - in-process transaction store for tests and
//!   single-node deployments
//! - `MemoryLockStore` - in-process lease backend with real TTL expiry
//! - `RedisLockStore` - Redis-backed lease backend for multi-node
//!   deployments

pub mod ledger;
pub mod lock;

pub use ledger::MemoryStore;
pub use lock::{MemoryLockStore, RedisLockStore};
