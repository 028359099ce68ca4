//! Balance computation.
//!
//! A balance is never stored. Every read folds the ledger's rows at that
//! moment; stale snapshots and drifting counters cannot happen because there
//! is nothing to drift.

use super::transaction::{Transaction, TransactionState};

/// States whose transactions count toward the balance.
///
/// `failed` is the only excluded state. `created` and `pending` rows are
/// included because they may still commit; treating them as spent is what
/// keeps concurrent debits from jointly overdrawing.
pub const BALANCE_STATES: [TransactionState; 3] = [
    TransactionState::Created,
    TransactionState::Pending,
    TransactionState::Committed,
];

/// Sums the quantities of the balance-eligible transactions in `transactions`.
///
/// Failed rows contribute nothing. The input does not need to be pre-filtered.
#[must_use]
pub fn balance(transactions: &[Transaction]) -> i64 {
    transactions
        .iter()
        .filter(|t| t.state.counts_toward_balance())
        .map(|t| t.quantity)
        .sum()
}

/// Returns true if applying `quantity` to `balance` would take it negative.
///
/// Credits can never overdraw. Only a debit larger than the current balance
/// does.
#[must_use]
pub const fn would_overdraw(balance: i64, quantity: i64) -> bool {
    quantity < 0 && balance + quantity < 0
}
