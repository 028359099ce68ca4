//! In-memory transaction store.
//!
//! Backs tests and single-node deployments. Uniqueness and state-machine
//! checks are enforced under the owning map's shard lock, so the guarantees
//! hold even for callers racing past the service's lease.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use scrip_core::ledger::store::{StoreError, TransactionStore};
use scrip_core::ledger::{Adjustment, Deposit, Ledger, Transaction, TransactionState};
use scrip_shared::types::{LedgerId, TransactionId};

/// In-process [`TransactionStore`] over concurrent hash maps.
#[derive(Default)]
pub struct MemoryStore {
    ledgers: DashMap<LedgerId, Ledger>,
    ledger_keys: DashMap<String, LedgerId>,
    transactions: DashMap<TransactionId, Transaction>,
    transaction_keys: DashMap<(LedgerId, String), TransactionId>,
    adjustments: DashMap<TransactionId, Adjustment>,
    deposits: DashMap<TransactionId, Deposit>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_ledger(&self, ledger: &Ledger) -> Result<(), StoreError> {
        // Claiming the key is the atomic step; the row write follows it.
        match self.ledger_keys.entry(ledger.idempotency_key.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateLedger {
                idempotency_key: ledger.idempotency_key.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(ledger.id);
                self.ledgers.insert(ledger.id, ledger.clone());
                Ok(())
            }
        }
    }

    async fn find_ledger(&self, id: LedgerId) -> Result<Option<Ledger>, StoreError> {
        Ok(self.ledgers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_ledger_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<Ledger>, StoreError> {
        let Some(id) = self.ledger_keys.get(idempotency_key).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        self.find_ledger(id).await
    }

    async fn insert(&self, transaction: &Transaction) -> Result<(), StoreError> {
        if !self.ledgers.contains_key(&transaction.ledger_id) {
            return Err(StoreError::LedgerNotFound(transaction.ledger_id));
        }

        let key = (
            transaction.ledger_id,
            transaction.idempotency_key.clone(),
        );
        match self.transaction_keys.entry(key) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey {
                ledger_id: transaction.ledger_id,
                idempotency_key: transaction.idempotency_key.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(transaction.id);
                self.transactions.insert(transaction.id, transaction.clone());
                Ok(())
            }
        }
    }

    async fn query(
        &self,
        ledger_id: LedgerId,
        states: &[TransactionState],
    ) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .transactions
            .iter()
            .filter(|entry| {
                let transaction = entry.value();
                transaction.ledger_id == ledger_id && states.contains(&transaction.state)
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn find_by_idempotency_key(
        &self,
        ledger_id: LedgerId,
        idempotency_key: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        let key = (ledger_id, idempotency_key.to_string());
        let Some(id) = self.transaction_keys.get(&key).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        self.find_transaction(id).await
    }

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self.transactions.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update_state(
        &self,
        id: TransactionId,
        state: TransactionState,
    ) -> Result<Transaction, StoreError> {
        // get_mut holds the shard lock, serializing updates to this row.
        let Some(mut entry) = self.transactions.get_mut(&id) else {
            return Err(StoreError::TransactionNotFound(id));
        };

        let transaction = entry.value_mut();
        if !transaction.state.can_transition_to(state) {
            return Err(StoreError::InvalidTransition {
                from: transaction.state,
                to: state,
            });
        }

        transaction.state = state;
        transaction.updated_at = Utc::now();
        Ok(transaction.clone())
    }

    async fn find_reversal_of(
        &self,
        original: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self
            .transactions
            .iter()
            .find(|entry| entry.value().origin.reverses() == Some(original))
            .map(|entry| entry.value().clone()))
    }

    async fn insert_adjustment(&self, adjustment: &Adjustment) -> Result<(), StoreError> {
        match self.adjustments.entry(adjustment.transaction_id) {
            // One audit record per transaction; the first writer wins.
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(adjustment.clone());
                Ok(())
            }
        }
    }

    async fn find_adjustment_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<Adjustment>, StoreError> {
        Ok(self
            .adjustments
            .get(&transaction_id)
            .map(|entry| entry.value().clone()))
    }

    async fn insert_deposit(&self, deposit: &Deposit) -> Result<(), StoreError> {
        match self.deposits.entry(deposit.transaction_id) {
            // One record per carrying transaction; the first writer wins.
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(deposit.clone());
                Ok(())
            }
        }
    }

    async fn deposits_for_ledger(
        &self,
        ledger_id: LedgerId,
    ) -> Result<Vec<Deposit>, StoreError> {
        Ok(self
            .deposits
            .iter()
            .filter(|entry| entry.value().ledger_id == ledger_id)
            .map(|entry| entry.value().clone())
            .collect())
    }
}
