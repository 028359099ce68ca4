//! Ledger domain types for creation and bookkeeping.
//!
//! This module defines the ledger aggregate, the adjustment and deposit
//! records, and the input types accepted by the ledger service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scrip_shared::types::{AdjustmentId, DepositId, LedgerId, TransactionId};

use super::idempotency::IdempotencyContext;
use super::transaction::TransactionState;

/// Number of cents in one US dollar, for callers converting whole-dollar
/// figures into a `usd_cents` ledger.
pub const CENTS_PER_US_DOLLAR: i64 = 100;

/// Unit of value a ledger is denominated in.
///
/// A ledger tracks quantities of exactly one unit; there is no conversion
/// between units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfValue {
    /// US dollar cents.
    #[default]
    UsdCents,
    /// Course or license seats.
    Seats,
    /// Japanese yen.
    Jpy,
}

impl UnitOfValue {
    /// Returns the wire name of the unit.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UsdCents => "usd_cents",
            Self::Seats => "seats",
            Self::Jpy => "jpy",
        }
    }
}

/// Reason an adjustment was made. Closed set; free text goes in `notes`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    /// Credit extended as a goodwill gesture.
    GoodwillCredit,
    /// Correction for technical problems on our side.
    #[default]
    TechnicalChallenges,
    /// Correction mandated by a policy change.
    PolicyAdjustment,
}

impl AdjustmentReason {
    /// Returns the wire name of the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GoodwillCredit => "goodwill_credit",
            Self::TechnicalChallenges => "technical_challenges",
            Self::PolicyAdjustment => "policy_adjustment",
        }
    }
}

/// How a duplicate idempotency key is handled during creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Return the previously created transaction (idempotent replay).
    #[default]
    ReturnExisting,
    /// Fail with `DuplicateOperation`.
    Reject,
}

/// A named account whose balance is derived from its transactions.
///
/// The balance is never stored on the ledger itself; it is the sum of
/// transaction quantities over the states that count toward balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    /// Unique identifier.
    pub id: LedgerId,
    /// Unique key making ledger creation idempotent.
    pub idempotency_key: String,
    /// Unit of value this ledger is denominated in.
    pub unit: UnitOfValue,
    /// Free-form metadata.
    pub metadata: Option<serde_json::Value>,
    /// When the ledger was created.
    pub created_at: DateTime<Utc>,
    /// When the ledger was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A manually initiated balance correction.
///
/// The adjustment owns the transaction that carries its quantity; the
/// optional transaction of interest is an audit pointer with no
/// consistency coupling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adjustment {
    /// Unique identifier.
    pub id: AdjustmentId,
    /// Ledger the adjustment applies to.
    pub ledger_id: LedgerId,
    /// The transaction created to carry the adjustment quantity.
    pub transaction_id: TransactionId,
    /// Signed quantity of the adjustment.
    pub quantity: i64,
    /// Why the adjustment was made.
    pub reason: AdjustmentReason,
    /// Unrelated transaction that prompted the adjustment, if any.
    pub transaction_of_interest: Option<TransactionId>,
    /// Free-text notes.
    pub notes: Option<String>,
    /// When the adjustment was created.
    pub created_at: DateTime<Utc>,
    /// When the adjustment was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A record of value added to a ledger's funding capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    /// Unique identifier.
    pub id: DepositId,
    /// Ledger the deposit funds.
    pub ledger_id: LedgerId,
    /// The committed transaction that realized the deposit.
    pub transaction_id: TransactionId,
    /// Deposited quantity (strictly positive).
    pub quantity: i64,
    /// External sales record reference, if any.
    pub sales_contract_reference_id: Option<String>,
    /// Slug of the system the sales reference lives in.
    pub sales_contract_reference_provider: Option<String>,
    /// When the deposit was created.
    pub created_at: DateTime<Utc>,
    /// When the deposit was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a ledger.
///
/// Ledger creation is get-or-create on the idempotency key: an explicit
/// key wins, then a key derived from the owner reference, then a random
/// one-shot key.
#[derive(Debug, Clone, Default)]
pub struct CreateLedgerInput {
    /// Unit of value for the new ledger.
    pub unit: UnitOfValue,
    /// Explicit idempotency key. Overrides derivation.
    pub idempotency_key: Option<String>,
    /// Owning entity in an external system, used to derive a stable key.
    pub owner_reference: Option<Uuid>,
    /// Quantity to seed the ledger with as an initial committed deposit.
    pub initial_deposit: Option<i64>,
    /// Free-form metadata.
    pub metadata: Option<serde_json::Value>,
}

impl CreateLedgerInput {
    /// Creates an input for a ledger in the given unit.
    #[must_use]
    pub fn new(unit: UnitOfValue) -> Self {
        Self {
            unit,
            ..Self::default()
        }
    }

    /// Sets an explicit idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Sets the owning entity reference.
    #[must_use]
    pub fn with_owner_reference(mut self, owner: Uuid) -> Self {
        self.owner_reference = Some(owner);
        self
    }

    /// Seeds the ledger with an initial committed deposit.
    #[must_use]
    pub fn with_initial_deposit(mut self, quantity: i64) -> Self {
        self.initial_deposit = Some(quantity);
        self
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Input for creating a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionInput {
    /// Ledger the transaction belongs to.
    pub ledger_id: LedgerId,
    /// Signed quantity (positive = credit, negative = debit).
    pub quantity: i64,
    /// Explicit idempotency key. Overrides derivation from the context.
    pub idempotency_key: Option<String>,
    /// Caller context the idempotency key is derived from.
    pub context: IdempotencyContext,
    /// Opaque reference into an external fulfillment system.
    pub fulfillment_identifier: Option<String>,
    /// State the transaction is born in.
    pub initial_state: TransactionState,
    /// How a replayed idempotency key is handled.
    pub on_duplicate: DuplicatePolicy,
    /// Free-form metadata.
    pub metadata: Option<serde_json::Value>,
}

impl CreateTransactionInput {
    /// Creates an input for a transaction born in the `created` state.
    #[must_use]
    pub fn new(ledger_id: LedgerId, quantity: i64) -> Self {
        Self {
            ledger_id,
            quantity,
            idempotency_key: None,
            context: IdempotencyContext::new(),
            fulfillment_identifier: None,
            initial_state: TransactionState::Created,
            on_duplicate: DuplicatePolicy::ReturnExisting,
            metadata: None,
        }
    }

    /// Sets an explicit idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Sets the idempotency context.
    #[must_use]
    pub fn with_context(mut self, context: IdempotencyContext) -> Self {
        self.context = context;
        self
    }

    /// Sets the external fulfillment reference.
    #[must_use]
    pub fn with_fulfillment_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.fulfillment_identifier = Some(identifier.into());
        self
    }

    /// Sets the state the transaction is born in.
    #[must_use]
    pub fn with_initial_state(mut self, state: TransactionState) -> Self {
        self.initial_state = state;
        self
    }

    /// Sets the duplicate handling policy.
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.on_duplicate = policy;
        self
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Input for creating an adjustment.
#[derive(Debug, Clone)]
pub struct CreateAdjustmentInput {
    /// Ledger the adjustment applies to.
    pub ledger_id: LedgerId,
    /// Signed quantity of the adjustment.
    pub quantity: i64,
    /// Why the adjustment is being made.
    pub reason: AdjustmentReason,
    /// Unrelated transaction that prompted the adjustment, if any.
    pub transaction_of_interest: Option<TransactionId>,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Explicit idempotency key for the carrying transaction.
    pub idempotency_key: Option<String>,
}

impl CreateAdjustmentInput {
    /// Creates an adjustment input with the given reason.
    #[must_use]
    pub fn new(ledger_id: LedgerId, quantity: i64, reason: AdjustmentReason) -> Self {
        Self {
            ledger_id,
            quantity,
            reason,
            transaction_of_interest: None,
            notes: None,
            idempotency_key: None,
        }
    }

    /// Points at the transaction that prompted the adjustment.
    #[must_use]
    pub fn with_transaction_of_interest(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_of_interest = Some(transaction_id);
        self
    }

    /// Attaches free-text notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets an explicit idempotency key for the carrying transaction.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Input for creating a deposit.
#[derive(Debug, Clone)]
pub struct CreateDepositInput {
    /// Ledger the deposit funds.
    pub ledger_id: LedgerId,
    /// Deposited quantity (must be strictly positive).
    pub quantity: i64,
    /// External sales record reference, if any.
    pub sales_contract_reference_id: Option<String>,
    /// Slug of the system the sales reference lives in.
    pub sales_contract_reference_provider: Option<String>,
    /// Explicit idempotency key for the carrying transaction.
    pub idempotency_key: Option<String>,
}

impl CreateDepositInput {
    /// Creates a deposit input.
    #[must_use]
    pub fn new(ledger_id: LedgerId, quantity: i64) -> Self {
        Self {
            ledger_id,
            quantity,
            sales_contract_reference_id: None,
            sales_contract_reference_provider: None,
            idempotency_key: None,
        }
    }

    /// Attaches the external sales record reference.
    #[must_use]
    pub fn with_sales_contract_reference(
        mut self,
        reference_id: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        self.sales_contract_reference_id = Some(reference_id.into());
        self.sales_contract_reference_provider = Some(provider.into());
        self
    }

    /// Sets an explicit idempotency key for the carrying transaction.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}
