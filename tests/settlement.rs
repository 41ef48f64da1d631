use funding_engine::catalog::InMemoryCatalog;
use funding_engine::{
    EngineConfig, FundingEngine, FundingPolicy, HackathonMeta, LedgerError, ProjectMeta,
    SettlementError, SplitStatus, VoteKind, VoterRole,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tempfile::TempDir;

async fn setup() -> (FundingEngine, Arc<InMemoryCatalog>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(InMemoryCatalog::new());
    let engine = FundingEngine::new(
        EngineConfig::default(),
        catalog.clone(),
        temp_dir.path().join("ops.journal"),
    )
    .await
    .unwrap();
    (engine, catalog, temp_dir)
}

/// Register the hackathon and one project; fund the pool. Recipient accounts
/// are left to each test so the failure paths can omit them.
async fn seed(engine: &FundingEngine, catalog: &InMemoryCatalog, pool_balance: Decimal) {
    engine.create_account("pool", pool_balance).await.unwrap();
    catalog
        .register_hackathon(HackathonMeta {
            id: "h1".to_string(),
            pool_account: "pool".to_string(),
            funding: FundingPolicy::FixedPerProject(dec!(1000)),
        })
        .await;
    catalog
        .register_project(ProjectMeta {
            id: "p1".to_string(),
            hackathon: "h1".to_string(),
            contributor_account: "alice".to_string(),
            maintainer_account: "bob".to_string(),
            created_at: UNIX_EPOCH,
        })
        .await;
}

async fn approve(engine: &FundingEngine) {
    engine
        .cast_vote("p1", "v1", VoterRole::Contributor, VoteKind::Support)
        .await
        .unwrap();
    engine.compute_results("h1").await.unwrap();
}

// ============================================================================
// HAPPY PATH TESTS
// ============================================================================

#[tokio::test]
async fn test_settle_moves_funds_and_records_split() {
    let (engine, catalog, _guard) = setup().await;
    seed(&engine, &catalog, dec!(1000)).await;
    engine.create_account("alice", Decimal::ZERO).await.unwrap();
    engine.create_account("bob", Decimal::ZERO).await.unwrap();
    approve(&engine).await;

    let outcome = engine.settle("h1", "p1").await.unwrap();
    assert_eq!(outcome.status, SplitStatus::Completed);

    assert_eq!(engine.balance("pool").await.unwrap(), dec!(0));
    assert_eq!(engine.balance("alice").await.unwrap(), dec!(700));
    assert_eq!(engine.balance("bob").await.unwrap(), dec!(300));

    let splits = engine.split_payments("p1").await;
    assert_eq!(splits.len(), 1);
    assert_eq!(splits[0].status, SplitStatus::Completed);
    assert_eq!(splits[0].total_amount, dec!(1000));
    assert_eq!(splits[0].contributor_share, dec!(700));
    assert_eq!(splits[0].maintainer_share, dec!(300));
    assert_eq!(splits[0].contributor_tx, Some(outcome.contributor_tx));
    assert_eq!(splits[0].maintainer_tx, Some(outcome.maintainer_tx));

    // Ledger entries carry the settlement reference
    let alice_txs = engine.transactions("alice").await.unwrap();
    assert_eq!(alice_txs.len(), 1);
    assert_eq!(alice_txs[0].reference.as_deref(), Some("settle:p1"));
}

#[tokio::test]
async fn test_attach_proof_after_settlement() {
    let (engine, catalog, _guard) = setup().await;
    seed(&engine, &catalog, dec!(1000)).await;
    engine.create_account("alice", Decimal::ZERO).await.unwrap();
    engine.create_account("bob", Decimal::ZERO).await.unwrap();
    approve(&engine).await;

    engine.settle("h1", "p1").await.unwrap();

    assert!(engine.attach_proof("p1", "0xabc123").await);
    let splits = engine.split_payments("p1").await;
    assert_eq!(splits[0].transaction_hash.as_deref(), Some("0xabc123"));
}

// ============================================================================
// GUARD TESTS
// ============================================================================

#[tokio::test]
async fn test_settle_without_result_fails() {
    let (engine, catalog, _guard) = setup().await;
    seed(&engine, &catalog, dec!(1000)).await;

    let result = engine.settle("h1", "p1").await;
    assert!(matches!(result, Err(SettlementError::NoResult)));
}

#[tokio::test]
async fn test_settle_pending_result_causes_no_ledger_mutation() {
    let (engine, catalog, _guard) = setup().await;
    seed(&engine, &catalog, dec!(1000)).await;
    engine.create_account("alice", Decimal::ZERO).await.unwrap();
    engine.create_account("bob", Decimal::ZERO).await.unwrap();

    // No votes: the computed result stays pending
    engine.compute_results("h1").await.unwrap();

    let result = engine.settle("h1", "p1").await;
    assert!(matches!(result, Err(SettlementError::NotApproved)));

    assert_eq!(engine.balance("pool").await.unwrap(), dec!(1000));
    assert!(engine.transactions("pool").await.unwrap().is_empty());
    assert!(engine.split_payments("p1").await.is_empty());
}

#[tokio::test]
async fn test_second_settle_is_already_settled() {
    let (engine, catalog, _guard) = setup().await;
    seed(&engine, &catalog, dec!(2000)).await;
    engine.create_account("alice", Decimal::ZERO).await.unwrap();
    engine.create_account("bob", Decimal::ZERO).await.unwrap();
    approve(&engine).await;

    engine.settle("h1", "p1").await.unwrap();
    let result = engine.settle("h1", "p1").await;

    assert!(matches!(result, Err(SettlementError::AlreadySettled)));
    // Paid exactly once
    assert_eq!(engine.balance("pool").await.unwrap(), dec!(1000));
    assert_eq!(engine.balance("alice").await.unwrap(), dec!(700));
}

#[tokio::test]
async fn test_concurrent_settles_pay_once() {
    let (engine, catalog, _guard) = setup().await;
    seed(&engine, &catalog, dec!(2000)).await;
    engine.create_account("alice", Decimal::ZERO).await.unwrap();
    engine.create_account("bob", Decimal::ZERO).await.unwrap();
    approve(&engine).await;

    let mut handles = vec![];
    for _ in 0..4 {
        let engine = engine.clone();
        handles.push(tokio::spawn(
            async move { engine.settle("h1", "p1").await },
        ));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(engine.balance("pool").await.unwrap(), dec!(1000));
    assert_eq!(engine.balance("alice").await.unwrap(), dec!(700));
    assert_eq!(engine.balance("bob").await.unwrap(), dec!(300));
}

// ============================================================================
// FAILURE & COMPENSATION TESTS
// ============================================================================

#[tokio::test]
async fn test_insufficient_pool_propagates_unchanged() {
    let (engine, catalog, _guard) = setup().await;
    seed(&engine, &catalog, dec!(100)).await;
    engine.create_account("alice", Decimal::ZERO).await.unwrap();
    engine.create_account("bob", Decimal::ZERO).await.unwrap();
    approve(&engine).await;

    let result = engine.settle("h1", "p1").await;
    assert!(matches!(
        result,
        Err(SettlementError::Ledger(LedgerError::InsufficientFunds))
    ));

    assert_eq!(engine.balance("pool").await.unwrap(), dec!(100));
    let splits = engine.split_payments("p1").await;
    assert_eq!(splits.len(), 1);
    assert_eq!(splits[0].status, SplitStatus::Failed);
}

#[tokio::test]
async fn test_failed_credit_restores_pool() {
    let (engine, catalog, _guard) = setup().await;
    seed(&engine, &catalog, dec!(1500)).await;
    // Neither recipient account exists: the first credit fails after the
    // pool debit succeeded
    approve(&engine).await;

    let result = engine.settle("h1", "p1").await;
    assert!(matches!(
        result,
        Err(SettlementError::Ledger(LedgerError::AccountNotFound))
    ));

    // Compensating credit restored the pool to its pre-settlement value
    assert_eq!(engine.balance("pool").await.unwrap(), dec!(1500));

    let splits = engine.split_payments("p1").await;
    assert_eq!(splits.len(), 1);
    assert_eq!(splits[0].status, SplitStatus::Failed);
    assert!(splits[0].failure_reason.is_some());
    assert_eq!(splits[0].contributor_tx, None);

    // Pool history shows the debit and its reversal, not a silent rollback
    let pool_txs = engine.transactions("pool").await.unwrap();
    assert_eq!(pool_txs.len(), 2);
    assert_eq!(pool_txs[1].reference.as_deref(), Some("compensate:p1"));
}

#[tokio::test]
async fn test_retry_after_failure_settles_cleanly() {
    let (engine, catalog, _guard) = setup().await;
    seed(&engine, &catalog, dec!(1000)).await;
    approve(&engine).await;

    assert!(engine.settle("h1", "p1").await.is_err());
    assert_eq!(engine.balance("pool").await.unwrap(), dec!(1000));

    // Once the accounts exist, a re-attempt runs from a clean state
    engine.create_account("alice", Decimal::ZERO).await.unwrap();
    engine.create_account("bob", Decimal::ZERO).await.unwrap();

    let outcome = engine.settle("h1", "p1").await.unwrap();
    assert_eq!(outcome.status, SplitStatus::Completed);
    assert_eq!(engine.balance("pool").await.unwrap(), dec!(0));
    assert_eq!(engine.balance("alice").await.unwrap(), dec!(700));
    assert_eq!(engine.balance("bob").await.unwrap(), dec!(300));

    let splits = engine.split_payments("p1").await;
    assert_eq!(splits.len(), 2);
    assert_eq!(splits[0].status, SplitStatus::Failed);
    assert_eq!(splits[1].status, SplitStatus::Completed);
}

#[tokio::test]
async fn test_partial_delivery_retries_remainder_only() {
    let (engine, catalog, _guard) = setup().await;
    seed(&engine, &catalog, dec!(1000)).await;
    // Contributor exists, maintainer doesn't: the second credit fails
    engine.create_account("alice", Decimal::ZERO).await.unwrap();
    approve(&engine).await;

    let result = engine.settle("h1", "p1").await;
    assert!(matches!(
        result,
        Err(SettlementError::Ledger(LedgerError::AccountNotFound))
    ));

    // The contributor leg stands; only the undelivered share returned
    assert_eq!(engine.balance("alice").await.unwrap(), dec!(700));
    assert_eq!(engine.balance("pool").await.unwrap(), dec!(300));

    let splits = engine.split_payments("p1").await;
    assert_eq!(splits[0].status, SplitStatus::Failed);
    assert!(splits[0].contributor_tx.is_some());
    assert_eq!(splits[0].maintainer_tx, None);

    // Re-attempt pays the maintainer without double-paying the contributor
    engine.create_account("bob", Decimal::ZERO).await.unwrap();
    let outcome = engine.settle("h1", "p1").await.unwrap();
    assert_eq!(outcome.status, SplitStatus::Completed);

    assert_eq!(engine.balance("alice").await.unwrap(), dec!(700));
    assert_eq!(engine.balance("bob").await.unwrap(), dec!(300));
    assert_eq!(engine.balance("pool").await.unwrap(), dec!(0));
    assert_eq!(outcome.contributor_tx, splits[0].contributor_tx.unwrap());
}
