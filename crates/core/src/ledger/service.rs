//! Ledger service: the single write path for ledgers and their rows.
//!
//! Every creation runs the same protocol: check for a replay, take the
//! ledger's lease, re-check, compute the balance from the rows, then insert.
//! Holding the lease across the read-compute-write window is what makes the
//! balance check race-free.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::info;

use scrip_shared::types::{AdjustmentId, DepositId, LedgerId, TransactionId};

use super::balance::{balance, would_overdraw, BALANCE_STATES};
use super::error::LedgerError;
use super::events::ReversalCommitted;
use super::idempotency;
use super::store::{StoreError, TransactionStore};
use super::transaction::{Transaction, TransactionOrigin, TransactionState};
use super::types::{
    Adjustment, CreateAdjustmentInput, CreateDepositInput, CreateLedgerInput,
    CreateTransactionInput, Deposit, DuplicatePolicy, Ledger,
};
use crate::lock::{LockManager, LockStore};

/// Buffered reversal events per subscriber.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Everything needed to create one transaction under the ledger lease.
struct CreationRequest {
    quantity: i64,
    idempotency_key: String,
    origin: TransactionOrigin,
    initial_state: TransactionState,
    fulfillment_identifier: Option<String>,
    metadata: Option<serde_json::Value>,
    on_duplicate: DuplicatePolicy,
}

/// Orchestrates ledger writes over a [`TransactionStore`] and a
/// [`LockStore`].
pub struct LedgerService<S, L> {
    store: Arc<S>,
    locks: LockManager<L>,
    reversals: broadcast::Sender<ReversalCommitted>,
}

impl<S, L> LedgerService<S, L>
where
    S: TransactionStore,
    L: LockStore + 'static,
{
    /// Creates a service over the given store and lock manager.
    #[must_use]
    pub fn new(store: Arc<S>, locks: LockManager<L>) -> Self {
        let (reversals, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            locks,
            reversals,
        }
    }

    /// Subscribes to reversal events.
    ///
    /// Each event fires once, when the reversal row is persisted.
    #[must_use]
    pub fn subscribe_reversals(&self) -> broadcast::Receiver<ReversalCommitted> {
        self.reversals.subscribe()
    }

    /// Creates a ledger, optionally seeded with an initial deposit.
    ///
    /// The idempotency key defaults to a per-owner key when
    /// `owner_reference` is set (so repeated bootstraps for one owner
    /// converge on one ledger) and to a unique key otherwise. Replays
    /// return the existing ledger and re-run the seed, which the
    /// deterministic initial-deposit key makes idempotent; a retry after a
    /// crash between the ledger row and its seed heals the ledger.
    pub async fn create_ledger(&self, input: CreateLedgerInput) -> Result<Ledger, LedgerError> {
        let idempotency_key = match (&input.idempotency_key, input.owner_reference) {
            (Some(key), _) => key.clone(),
            (None, Some(owner)) => idempotency::ledger_key_for_owner(owner),
            (None, None) => idempotency::default_ledger_key(),
        };

        let existing = self
            .store
            .find_ledger_by_idempotency_key(&idempotency_key)
            .await?;
        let ledger = match existing {
            Some(existing) => {
                info!(ledger_id = %existing.id, "Replayed ledger creation");
                existing
            }
            None => {
                let now = Utc::now();
                let ledger = Ledger {
                    id: LedgerId::new(),
                    idempotency_key: idempotency_key.clone(),
                    unit: input.unit,
                    metadata: input.metadata,
                    created_at: now,
                    updated_at: now,
                };

                match self.store.insert_ledger(&ledger).await {
                    Ok(()) => {
                        info!(ledger_id = %ledger.id, unit = ledger.unit.as_str(), "Created ledger");
                        ledger
                    }
                    Err(StoreError::DuplicateLedger { .. }) => {
                        // Lost a race with an identical request. Its row is ours.
                        self.store
                            .find_ledger_by_idempotency_key(&idempotency_key)
                            .await?
                            .ok_or_else(|| {
                                LedgerError::BackingStoreUnavailable(
                                    "ledger vanished after duplicate-key rejection".to_string(),
                                )
                            })?
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        };

        if let Some(quantity) = input.initial_deposit {
            let deposit_input = CreateDepositInput::new(ledger.id, quantity)
                .with_idempotency_key(idempotency::initial_deposit_key(
                    &ledger.idempotency_key,
                    quantity,
                ));
            self.create_deposit(deposit_input).await?;
        }

        Ok(ledger)
    }

    /// Fetches a ledger by id.
    pub async fn get_ledger(&self, id: LedgerId) -> Result<Ledger, LedgerError> {
        self.store
            .find_ledger(id)
            .await?
            .ok_or(LedgerError::LedgerNotFound(id))
    }

    /// Computes the ledger's balance from its rows.
    ///
    /// Folds every non-failed row at call time. There is no cached value to
    /// invalidate.
    pub async fn get_balance(&self, ledger_id: LedgerId) -> Result<i64, LedgerError> {
        self.store
            .find_ledger(ledger_id)
            .await?
            .ok_or(LedgerError::LedgerNotFound(ledger_id))?;

        let rows = self.store.query(ledger_id, &BALANCE_STATES).await?;
        Ok(balance(&rows))
    }

    /// Fetches a transaction by id.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.store
            .find_transaction(id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    /// Creates a transaction under the ledger's lease.
    ///
    /// Debits are refused with [`LedgerError::InsufficientBalance`] when the
    /// ledger cannot cover them. The idempotency key is taken from the input
    /// or derived from its context; replays follow the input's
    /// [`DuplicatePolicy`].
    pub async fn create_transaction(
        &self,
        input: CreateTransactionInput,
    ) -> Result<Transaction, LedgerError> {
        let ledger = self.get_ledger(input.ledger_id).await?;

        let idempotency_key = match &input.idempotency_key {
            Some(key) => key.clone(),
            None => idempotency::transaction_key(
                &ledger.idempotency_key,
                input.quantity,
                &input.context,
            ),
        };

        self.create_with_origin(
            input.ledger_id,
            CreationRequest {
                quantity: input.quantity,
                idempotency_key,
                origin: TransactionOrigin::Direct,
                initial_state: input.initial_state,
                fulfillment_identifier: input.fulfillment_identifier,
                metadata: input.metadata,
                on_duplicate: input.on_duplicate,
            },
        )
        .await
    }

    /// Reverses a committed transaction by writing its exact negation.
    ///
    /// Only committed, non-adjustment transactions are eligible, and each
    /// can be reversed once. On success a [`ReversalCommitted`] event is
    /// broadcast; a second attempt, sequential or racing, gets
    /// [`LedgerError::AlreadyReversed`] and no second event.
    pub async fn reverse_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        let original = self.get_transaction(id).await?;

        if original.origin.is_adjustment() {
            return Err(LedgerError::CannotReverseAdjustment(id));
        }
        if !original.is_committed() {
            return Err(LedgerError::CannotReverseUncommitted {
                id,
                state: original.state,
            });
        }
        if self.store.find_reversal_of(id).await?.is_some() {
            return Err(LedgerError::AlreadyReversed(id));
        }

        let outcome = self
            .create_with_origin(
                original.ledger_id,
                CreationRequest {
                    quantity: -original.quantity,
                    idempotency_key: idempotency::reversal_key(&original.idempotency_key),
                    origin: TransactionOrigin::Reversal { reverses: id },
                    initial_state: TransactionState::Committed,
                    fulfillment_identifier: None,
                    metadata: None,
                    on_duplicate: DuplicatePolicy::Reject,
                },
            )
            .await;

        let reversal = match outcome {
            Ok(reversal) => reversal,
            // A racing reversal won the lease first and inserted its row.
            Err(LedgerError::DuplicateOperation { .. }) => {
                return Err(LedgerError::AlreadyReversed(id));
            }
            Err(err) => return Err(err),
        };

        info!(
            ledger_id = %reversal.ledger_id,
            original_id = %id,
            reversal_id = %reversal.id,
            quantity = reversal.quantity,
            "Reversed transaction"
        );

        // Delivery is best-effort; send only fails when nobody is subscribed.
        let _ = self.reversals.send(ReversalCommitted {
            ledger_id: reversal.ledger_id,
            original_id: id,
            reversal_id: reversal.id,
            quantity: reversal.quantity,
        });

        Ok(reversal)
    }

    /// Applies a manual correction to a ledger.
    ///
    /// Writes a committed transaction carrying the quantity plus an audit
    /// record holding the reason, the optional transaction of interest, and
    /// the operator's notes. The transaction of interest is audit context
    /// only; the referenced transaction is left untouched.
    pub async fn create_adjustment(
        &self,
        input: CreateAdjustmentInput,
    ) -> Result<Transaction, LedgerError> {
        if let Some(of_interest) = input.transaction_of_interest {
            self.get_transaction(of_interest).await?;
        }

        let idempotency_key = input.idempotency_key.clone().unwrap_or_else(|| {
            idempotency::adjustment_key(input.ledger_id, input.quantity)
        });

        let transaction = self
            .create_with_origin(
                input.ledger_id,
                CreationRequest {
                    quantity: input.quantity,
                    idempotency_key,
                    origin: TransactionOrigin::Adjustment {
                        reason: input.reason,
                    },
                    initial_state: TransactionState::Committed,
                    fulfillment_identifier: None,
                    metadata: None,
                    on_duplicate: DuplicatePolicy::ReturnExisting,
                },
            )
            .await?;

        // A replayed adjustment already has its audit record.
        if self
            .store
            .find_adjustment_for_transaction(transaction.id)
            .await?
            .is_some()
        {
            return Ok(transaction);
        }

        let now = Utc::now();
        let adjustment = Adjustment {
            id: AdjustmentId::new(),
            ledger_id: input.ledger_id,
            transaction_id: transaction.id,
            quantity: input.quantity,
            reason: input.reason,
            transaction_of_interest: input.transaction_of_interest,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };

        if let Err(source) = self.store.insert_adjustment(&adjustment).await {
            return Err(LedgerError::AdjustmentIncomplete {
                transaction_id: transaction.id,
                source,
            });
        }

        info!(
            ledger_id = %input.ledger_id,
            transaction_id = %transaction.id,
            reason = input.reason.as_str(),
            "Created adjustment"
        );

        Ok(transaction)
    }

    /// Records value entering the ledger from outside.
    ///
    /// The quantity must be strictly positive. The deposit's transaction is
    /// committed immediately and a deposit record ties it to the optional
    /// sales contract reference.
    pub async fn create_deposit(
        &self,
        input: CreateDepositInput,
    ) -> Result<Deposit, LedgerError> {
        if input.quantity <= 0 {
            return Err(LedgerError::InvalidDeposit {
                quantity: input.quantity,
            });
        }

        let ledger = self.get_ledger(input.ledger_id).await?;

        let idempotency_key = match &input.idempotency_key {
            Some(key) => key.clone(),
            None => idempotency::transaction_key(
                &ledger.idempotency_key,
                input.quantity,
                &idempotency::IdempotencyContext::new(),
            ),
        };

        let transaction = self
            .create_with_origin(
                input.ledger_id,
                CreationRequest {
                    quantity: input.quantity,
                    idempotency_key,
                    origin: TransactionOrigin::Direct,
                    initial_state: TransactionState::Committed,
                    fulfillment_identifier: None,
                    metadata: None,
                    on_duplicate: DuplicatePolicy::ReturnExisting,
                },
            )
            .await?;

        // A replayed deposit, or one whose record write crashed mid-way,
        // already has a transaction. Reuse its record if it exists.
        let existing = self
            .store
            .deposits_for_ledger(input.ledger_id)
            .await?
            .into_iter()
            .find(|d| d.transaction_id == transaction.id);
        if let Some(deposit) = existing {
            return Ok(deposit);
        }

        let now = Utc::now();
        let deposit = Deposit {
            id: DepositId::new(),
            ledger_id: input.ledger_id,
            transaction_id: transaction.id,
            quantity: input.quantity,
            sales_contract_reference_id: input.sales_contract_reference_id,
            sales_contract_reference_provider: input.sales_contract_reference_provider,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_deposit(&deposit).await?;

        info!(
            ledger_id = %input.ledger_id,
            transaction_id = %transaction.id,
            quantity = input.quantity,
            "Recorded deposit"
        );

        Ok(deposit)
    }

    /// Moves a transaction through its lifecycle.
    ///
    /// Runs without the lease. A transition either keeps the row counted
    /// toward the balance or drops it at `failed`; the store enforces the
    /// state machine atomically per row.
    pub async fn update_transaction_state(
        &self,
        id: TransactionId,
        state: TransactionState,
    ) -> Result<Transaction, LedgerError> {
        let updated = self.store.update_state(id, state).await?;
        info!(
            ledger_id = %updated.ledger_id,
            transaction_id = %id,
            state = %state,
            "Updated transaction state"
        );
        Ok(updated)
    }

    /// Runs the locked creation protocol for one transaction.
    async fn create_with_origin(
        &self,
        ledger_id: LedgerId,
        request: CreationRequest,
    ) -> Result<Transaction, LedgerError> {
        // Replays answered before contending for the lease.
        if let Some(existing) = self
            .store
            .find_by_idempotency_key(ledger_id, &request.idempotency_key)
            .await?
        {
            return Self::resolve_duplicate(existing, &request);
        }

        let lease = self.locks.acquire(ledger_id).await?;
        let outcome = self.create_locked(ledger_id, request).await;
        lease.release().await;
        outcome
    }

    /// The critical section: re-check replay, check balance, insert.
    async fn create_locked(
        &self,
        ledger_id: LedgerId,
        request: CreationRequest,
    ) -> Result<Transaction, LedgerError> {
        // Authoritative replay check. The pre-lease check can miss a row
        // inserted while this caller waited for the lease.
        if let Some(existing) = self
            .store
            .find_by_idempotency_key(ledger_id, &request.idempotency_key)
            .await?
        {
            return Self::resolve_duplicate(existing, &request);
        }

        if request.quantity < 0 {
            let rows = self.store.query(ledger_id, &BALANCE_STATES).await?;
            let current = balance(&rows);
            if would_overdraw(current, request.quantity) {
                return Err(LedgerError::InsufficientBalance {
                    requested: request.quantity,
                    balance: current,
                });
            }
        }

        let now = Utc::now();
        let transaction = Transaction {
            id: TransactionId::new(),
            ledger_id,
            idempotency_key: request.idempotency_key,
            quantity: request.quantity,
            state: request.initial_state,
            origin: request.origin,
            fulfillment_identifier: request.fulfillment_identifier,
            metadata: request.metadata,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&transaction).await?;

        info!(
            ledger_id = %ledger_id,
            transaction_id = %transaction.id,
            quantity = transaction.quantity,
            state = %transaction.state,
            "Created transaction"
        );

        Ok(transaction)
    }

    /// Applies the duplicate policy to an existing row.
    fn resolve_duplicate(
        existing: Transaction,
        request: &CreationRequest,
    ) -> Result<Transaction, LedgerError> {
        match request.on_duplicate {
            DuplicatePolicy::ReturnExisting => Ok(existing),
            DuplicatePolicy::Reject => Err(LedgerError::DuplicateOperation {
                idempotency_key: request.idempotency_key.clone(),
            }),
        }
    }
}
