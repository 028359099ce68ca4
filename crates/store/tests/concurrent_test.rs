//! Concurrent access tests for the ledger write path.
//!
//! These tests race real tasks through the lease-guarded creation protocol
//! and verify that:
//! - Concurrent debits never jointly overdraw a ledger
//! - Racing replays of one idempotency key collapse to one row
//! - Racing reversals admit exactly one winner and one event
//! - The derived balance never drifts from the surviving rows

// Allow common test patterns that trigger clippy warnings
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::cast_possible_wrap)]

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Barrier;

use scrip_core::ledger::{
    CreateLedgerInput, CreateTransactionInput, Ledger, LedgerError, LedgerService,
    TransactionState, TransactionStore, UnitOfValue,
};
use scrip_core::lock::{LockConfig, LockManager};
use scrip_store::{MemoryLockStore, MemoryStore};

type TestService = LedgerService<MemoryStore, MemoryLockStore>;

/// A lock budget generous enough that contention alone never fails a task.
fn patient_locks() -> LockConfig {
    LockConfig::default()
        .with_acquire_attempts(1000)
        .with_retry_delay(Duration::from_millis(1))
}

fn harness() -> (Arc<MemoryStore>, Arc<TestService>) {
    let store = Arc::new(MemoryStore::new());
    let locks = LockManager::new(Arc::new(MemoryLockStore::new()), patient_locks());
    let service = Arc::new(LedgerService::new(Arc::clone(&store), locks));
    (store, service)
}

async fn funded_ledger(service: &TestService, quantity: i64) -> Ledger {
    service
        .create_ledger(CreateLedgerInput::new(UnitOfValue::UsdCents).with_initial_deposit(quantity))
        .await
        .expect("Failed to bootstrap ledger")
}

// ============================================================================
// Test: Two racing debits that individually fit but jointly overdraw
// ============================================================================
#[tokio::test]
async fn test_racing_debits_admit_exactly_one() {
    let (_, service) = harness();
    let ledger = funded_ledger(&service, 10).await;

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for quantity in [-7i64, -5] {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        let ledger_id = ledger.id;
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            service
                .create_transaction(
                    CreateTransactionInput::new(ledger_id, quantity)
                        .with_initial_state(TransactionState::Committed),
                )
                .await
        }));
    }

    let mut winners = Vec::new();
    let mut insufficient = 0;
    for result in join_all(handles).await {
        match result.expect("Task panicked") {
            Ok(tx) => winners.push(tx),
            Err(LedgerError::InsufficientBalance { .. }) => insufficient += 1,
            Err(e) => panic!("Unexpected failure: {}", e),
        }
    }

    assert_eq!(winners.len(), 1, "Exactly one debit must win");
    assert_eq!(insufficient, 1, "The loser must see InsufficientBalance");

    let final_balance = service.get_balance(ledger.id).await.expect("Failed to get balance");
    assert_eq!(final_balance, 10 + winners[0].quantity);
    assert!(final_balance >= 0, "Balance went negative: {}", final_balance);

    println!(
        "✓ Debit of {} won; final balance {}",
        winners[0].quantity, final_balance
    );
}

// ============================================================================
// Test: Many racing debits drain the ledger to the exact remainder
// ============================================================================
#[tokio::test]
async fn test_many_racing_debits_never_overdraw() {
    let (store, service) = harness();
    let ledger = funded_ledger(&service, 100).await;

    const NUM_TASKS: usize = 50;
    let barrier = Arc::new(Barrier::new(NUM_TASKS));
    let mut handles = Vec::with_capacity(NUM_TASKS);
    for _ in 0..NUM_TASKS {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        let ledger_id = ledger.id;
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            service
                .create_transaction(
                    CreateTransactionInput::new(ledger_id, -7)
                        .with_initial_state(TransactionState::Committed),
                )
                .await
        }));
    }

    let mut success_count = 0;
    let mut insufficient_count = 0;
    for result in join_all(handles).await {
        match result.expect("Task panicked") {
            Ok(_) => success_count += 1,
            Err(LedgerError::InsufficientBalance { .. }) => insufficient_count += 1,
            Err(e) => panic!("Unexpected failure: {}", e),
        }
    }

    // 14 debits of 7 fit in 100; the 15th would overdraw.
    assert_eq!(success_count, 14);
    assert_eq!(insufficient_count, NUM_TASKS - 14);

    let final_balance = service.get_balance(ledger.id).await.expect("Failed to get balance");
    assert_eq!(
        final_balance, 2,
        "Balance should be 2 but was {} (drift detected!)",
        final_balance
    );

    let rows = store
        .query(ledger.id, &[TransactionState::Committed])
        .await
        .expect("Failed to query rows");
    assert_eq!(rows.len(), 15, "Bootstrap deposit plus 14 winning debits");

    println!(
        "✓ {} of {} debits succeeded; final balance {}",
        success_count, NUM_TASKS, final_balance
    );
}

// ============================================================================
// Test: Racing replays of one idempotency key collapse to one row
// ============================================================================
#[tokio::test]
async fn test_racing_replays_collapse_to_one_row() {
    let (store, service) = harness();
    let ledger = funded_ledger(&service, 100).await;

    const NUM_TASKS: usize = 20;
    let barrier = Arc::new(Barrier::new(NUM_TASKS));
    let mut handles = Vec::with_capacity(NUM_TASKS);
    for _ in 0..NUM_TASKS {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        let ledger_id = ledger.id;
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            service
                .create_transaction(
                    CreateTransactionInput::new(ledger_id, -5).with_idempotency_key("replay-race"),
                )
                .await
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for result in join_all(handles).await {
        let tx = result.expect("Task panicked").expect("Replay should succeed");
        ids.insert(tx.id);
    }
    assert_eq!(ids.len(), 1, "All replays must resolve to one row");

    let stored = store
        .find_by_idempotency_key(ledger.id, "replay-race")
        .await
        .expect("Failed to look up row")
        .expect("Row missing");
    assert_eq!(stored.quantity, -5);
    assert_eq!(service.get_balance(ledger.id).await.unwrap(), 95);

    println!("✓ {} racing replays resolved to row {}", NUM_TASKS, stored.id);
}

// ============================================================================
// Test: Racing reversals admit one winner and fire one event
// ============================================================================
#[tokio::test]
async fn test_racing_reversals_admit_one() {
    let (_, service) = harness();
    let ledger = funded_ledger(&service, 100).await;

    let original = service
        .create_transaction(
            CreateTransactionInput::new(ledger.id, -40)
                .with_initial_state(TransactionState::Committed),
        )
        .await
        .expect("Create failed");

    let mut events = service.subscribe_reversals();

    const NUM_TASKS: usize = 10;
    let barrier = Arc::new(Barrier::new(NUM_TASKS));
    let mut handles = Vec::with_capacity(NUM_TASKS);
    for _ in 0..NUM_TASKS {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        let id = original.id;
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            service.reverse_transaction(id).await
        }));
    }

    let mut success_count = 0;
    let mut already_reversed = 0;
    for result in join_all(handles).await {
        match result.expect("Task panicked") {
            Ok(_) => success_count += 1,
            Err(LedgerError::AlreadyReversed(id)) => {
                assert_eq!(id, original.id);
                already_reversed += 1;
            }
            Err(e) => panic!("Unexpected failure: {}", e),
        }
    }

    assert_eq!(success_count, 1, "Exactly one reversal must win");
    assert_eq!(already_reversed, NUM_TASKS - 1);
    assert_eq!(service.get_balance(ledger.id).await.unwrap(), 100);

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("Timed out waiting for reversal event")
        .expect("Event channel closed");
    assert_eq!(event.original_id, original.id);
    assert!(
        matches!(
            events.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ),
        "The reversal event must fire exactly once"
    );

    println!("✓ 1 of {} racing reversals won; one event fired", NUM_TASKS);
}

// ============================================================================
// Test: Mixed credits and debits keep the non-negative invariant
// ============================================================================
#[tokio::test]
async fn test_mixed_traffic_keeps_invariant() {
    let (_, service) = harness();
    let ledger = funded_ledger(&service, 100).await;

    let mut quantities = Vec::new();
    quantities.extend(std::iter::repeat(10i64).take(10));
    quantities.extend(std::iter::repeat(-30i64).take(10));

    let barrier = Arc::new(Barrier::new(quantities.len()));
    let mut handles = Vec::with_capacity(quantities.len());
    for quantity in quantities {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        let ledger_id = ledger.id;
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let outcome = service
                .create_transaction(
                    CreateTransactionInput::new(ledger_id, quantity)
                        .with_initial_state(TransactionState::Committed),
                )
                .await;
            (quantity, outcome)
        }));
    }

    let mut credit_successes = 0;
    let mut debit_successes = 0;
    for result in join_all(handles).await {
        match result.expect("Task panicked") {
            (q, Ok(_)) if q > 0 => credit_successes += 1,
            (_, Ok(_)) => debit_successes += 1,
            (q, Err(LedgerError::InsufficientBalance { .. })) if q < 0 => {}
            (q, Err(e)) => panic!("Unexpected failure for {}: {}", q, e),
        }
    }

    // Credits never fail; debit successes depend on interleaving.
    assert_eq!(credit_successes, 10);

    let final_balance = service.get_balance(ledger.id).await.expect("Failed to get balance");
    assert_eq!(final_balance, 100 + 10 * 10 - 30 * debit_successes);
    assert!(final_balance >= 0, "Balance went negative: {}", final_balance);

    println!(
        "✓ Mixed traffic settled at {} with {} debits applied",
        final_balance, debit_successes
    );
}
