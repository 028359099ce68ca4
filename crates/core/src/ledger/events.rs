//! Ledger domain events.

use serde::{Deserialize, Serialize};

use scrip_shared::types::{LedgerId, TransactionId};

/// Broadcast once when a reversal transaction is persisted.
///
/// Fires exactly once per reversed transaction: replays and already-reversed
/// rejections do not re-emit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalCommitted {
    /// The ledger both transactions belong to.
    pub ledger_id: LedgerId,
    /// The transaction that was reversed.
    pub original_id: TransactionId,
    /// The reversing transaction.
    pub reversal_id: TransactionId,
    /// The reversal's quantity (the exact negation of the original's).
    pub quantity: i64,
}
