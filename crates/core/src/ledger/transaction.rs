//! Transaction aggregate and lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scrip_shared::types::{LedgerId, TransactionId};

use super::types::AdjustmentReason;

/// Transaction lifecycle state.
///
/// `created` and `pending` are the non-terminal states; both still count
/// toward the ledger balance because they may yet commit. `committed` and
/// `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    /// Row persisted, nothing fulfilled yet.
    Created,
    /// An external fulfillment step is in flight.
    Pending,
    /// Terminal success.
    Committed,
    /// Terminal failure. Excluded from balance.
    Failed,
}

impl TransactionState {
    /// Returns the wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Committed => "committed",
            Self::Failed => "failed",
        }
    }

    /// Returns true if no transition may leave this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }

    /// Returns true if transactions in this state count toward the balance.
    #[must_use]
    pub const fn counts_toward_balance(self) -> bool {
        !matches!(self, Self::Failed)
    }

    /// Returns true if the state machine permits moving to `next`.
    ///
    /// Permitted transitions: `created -> pending`, `created -> committed`,
    /// `created -> failed`, `pending -> committed`, `pending -> failed`.
    /// Everything else, including any move out of a terminal state, is
    /// rejected.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Pending | Self::Committed | Self::Failed)
                | (Self::Pending, Self::Committed | Self::Failed)
        )
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a transaction's quantity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionOrigin {
    /// Created directly by a caller.
    Direct,
    /// Exact negation of a previously committed transaction.
    Reversal {
        /// The transaction being reversed.
        reverses: TransactionId,
    },
    /// Carries the quantity of a manually initiated adjustment.
    Adjustment {
        /// Why the adjustment was made.
        reason: AdjustmentReason,
    },
}

impl TransactionOrigin {
    /// Returns true for a directly created transaction.
    #[must_use]
    pub const fn is_direct(&self) -> bool {
        matches!(self, Self::Direct)
    }

    /// Returns true for a reversal transaction.
    #[must_use]
    pub const fn is_reversal(&self) -> bool {
        matches!(self, Self::Reversal { .. })
    }

    /// Returns true for a transaction carrying an adjustment.
    #[must_use]
    pub const fn is_adjustment(&self) -> bool {
        matches!(self, Self::Adjustment { .. })
    }

    /// Returns the reversed transaction's id for a reversal.
    #[must_use]
    pub const fn reverses(&self) -> Option<TransactionId> {
        match self {
            Self::Reversal { reverses } => Some(*reverses),
            _ => None,
        }
    }
}

/// An atomic signed quantity change attributed to a ledger.
///
/// `quantity` is fixed at creation in every state; a terminal transaction
/// is immutable outright. Undoing a committed transaction takes a new
/// reversing transaction, never a mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier.
    pub id: TransactionId,
    /// Ledger this transaction belongs to.
    pub ledger_id: LedgerId,
    /// Unique key (per ledger) making creation idempotent.
    pub idempotency_key: String,
    /// Signed quantity (positive = credit, negative = debit).
    pub quantity: i64,
    /// Current lifecycle state.
    pub state: TransactionState,
    /// Where the quantity came from.
    pub origin: TransactionOrigin,
    /// Opaque reference into an external fulfillment system.
    pub fulfillment_identifier: Option<String>,
    /// Free-form metadata.
    pub metadata: Option<serde_json::Value>,
    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
    /// When the transaction was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Returns true if the transaction has committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.state == TransactionState::Committed
    }

    /// Returns true if the transaction is in a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Returns true if this transaction is eligible for reversal.
    ///
    /// Only committed transactions that do not carry an adjustment can be
    /// reversed. Whether a reversal already exists is a store-level check.
    #[must_use]
    pub fn is_reversible(&self) -> bool {
        self.is_committed() && !self.origin.is_adjustment()
    }
}
