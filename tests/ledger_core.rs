use funding_engine::catalog::InMemoryCatalog;
use funding_engine::{EngineConfig, FundingEngine, LedgerError, TxKind};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::TempDir;

async fn setup() -> (FundingEngine, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(InMemoryCatalog::new());
    let engine = FundingEngine::new(
        EngineConfig::default(),
        catalog,
        temp_dir.path().join("ops.journal"),
    )
    .await
    .unwrap();
    (engine, temp_dir)
}

// ============================================================================
// ACCOUNT LIFECYCLE TESTS
// ============================================================================

#[tokio::test]
async fn test_create_and_query_account() {
    let (engine, _guard) = setup().await;

    engine.create_account("alice", Decimal::ZERO).await.unwrap();
    assert_eq!(engine.balance("alice").await.unwrap(), dec!(0));

    engine.create_account("bob", dec!(25.50)).await.unwrap();
    assert_eq!(engine.balance("bob").await.unwrap(), dec!(25.50));
}

#[tokio::test]
async fn test_duplicate_account_rejected() {
    let (engine, _guard) = setup().await;

    engine.create_account("alice", Decimal::ZERO).await.unwrap();
    let result = engine.create_account("alice", Decimal::ZERO).await;

    assert_eq!(result, Err(LedgerError::AlreadyExists));
}

#[tokio::test]
async fn test_negative_initial_balance_rejected() {
    let (engine, _guard) = setup().await;

    let result = engine.create_account("alice", dec!(-1)).await;
    assert_eq!(result, Err(LedgerError::InvalidAmount));
}

#[tokio::test]
async fn test_unknown_account_errors() {
    let (engine, _guard) = setup().await;

    assert_eq!(
        engine.balance("ghost").await,
        Err(LedgerError::AccountNotFound)
    );
    assert_eq!(
        engine.credit("ghost", dec!(10)).await,
        Err(LedgerError::AccountNotFound)
    );
    assert_eq!(
        engine.debit("ghost", dec!(10)).await,
        Err(LedgerError::AccountNotFound)
    );
    assert!(engine.transactions("ghost").await.is_err());
}

// ============================================================================
// CREDIT & DEBIT TESTS
// ============================================================================

#[tokio::test]
async fn test_credit_and_debit_move_balance() {
    let (engine, _guard) = setup().await;

    engine.create_account("alice", Decimal::ZERO).await.unwrap();

    let receipt = engine.credit("alice", dec!(100.25)).await.unwrap();
    assert_eq!(receipt.balance, dec!(100.25));

    let receipt = engine.debit("alice", dec!(30)).await.unwrap();
    assert_eq!(receipt.balance, dec!(70.25));

    assert_eq!(engine.balance("alice").await.unwrap(), dec!(70.25));
}

#[tokio::test]
async fn test_non_positive_amounts_rejected() {
    let (engine, _guard) = setup().await;

    engine.create_account("alice", dec!(50)).await.unwrap();

    assert_eq!(
        engine.credit("alice", dec!(0)).await,
        Err(LedgerError::InvalidAmount)
    );
    assert_eq!(
        engine.credit("alice", dec!(-5)).await,
        Err(LedgerError::InvalidAmount)
    );
    assert_eq!(
        engine.debit("alice", dec!(0)).await,
        Err(LedgerError::InvalidAmount)
    );

    // Nothing moved
    assert_eq!(engine.balance("alice").await.unwrap(), dec!(50));
    assert!(engine.transactions("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_insufficient_funds_leaves_state_unchanged() {
    let (engine, _guard) = setup().await;

    engine.create_account("alice", Decimal::ZERO).await.unwrap();
    engine.credit("alice", dec!(40)).await.unwrap();

    let result = engine.debit("alice", dec!(40.01)).await;
    assert_eq!(result, Err(LedgerError::InsufficientFunds));

    assert_eq!(engine.balance("alice").await.unwrap(), dec!(40));
    assert_eq!(engine.transactions("alice").await.unwrap().len(), 1);
}

// ============================================================================
// CONSERVATION INVARIANT TESTS
// ============================================================================

#[tokio::test]
async fn test_balance_equals_signed_sum_of_log() {
    let (engine, _guard) = setup().await;

    engine.create_account("alice", Decimal::ZERO).await.unwrap();

    engine.credit("alice", dec!(10.5)).await.unwrap();
    engine.credit("alice", dec!(4.25)).await.unwrap();
    engine.debit("alice", dec!(3)).await.unwrap();
    // Failures must not appear in the log
    let _ = engine.debit("alice", dec!(1000)).await;
    let _ = engine.credit("alice", dec!(-1)).await;
    engine.debit("alice", dec!(0.75)).await.unwrap();

    let transactions = engine.transactions("alice").await.unwrap();
    assert_eq!(transactions.len(), 4);

    let signed_sum: Decimal = transactions.iter().map(|tx| tx.signed_amount()).sum();
    assert_eq!(signed_sum, dec!(11));
    assert_eq!(engine.balance("alice").await.unwrap(), dec!(11));
}

#[tokio::test]
async fn test_zero_transactions_zero_balance() {
    let (engine, _guard) = setup().await;

    engine.create_account("alice", Decimal::ZERO).await.unwrap();
    let _ = engine.debit("alice", dec!(5)).await;

    assert_eq!(engine.balance("alice").await.unwrap(), dec!(0));
    assert!(engine.transactions("alice").await.unwrap().is_empty());
}

// ============================================================================
// CONCURRENCY TESTS
// ============================================================================

#[tokio::test]
async fn test_concurrent_debits_never_overdraw() {
    let (engine, _guard) = setup().await;

    engine.create_account("alice", dec!(100)).await.unwrap();

    // 10 debits of 30 against a balance of 100: only 3 can fit
    let mut handles = vec![];
    for _ in 0..10 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.debit("alice", dec!(30)).await.is_ok()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 3);
    assert_eq!(engine.balance("alice").await.unwrap(), dec!(10));
}

#[tokio::test]
async fn test_parallel_accounts_do_not_interfere() {
    let (engine, _guard) = setup().await;

    for i in 0..10 {
        engine
            .create_account(&format!("acct-{}", i), Decimal::ZERO)
            .await
            .unwrap();
    }

    let mut handles = vec![];
    for i in 0..10 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let account = format!("acct-{}", i);
            for _ in 0..100 {
                engine.credit(&account, dec!(1)).await.unwrap();
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    for i in 0..10 {
        let balance = engine.balance(&format!("acct-{}", i)).await.unwrap();
        assert_eq!(balance, dec!(100));
    }
}

// ============================================================================
// JOURNAL RECOVERY TESTS
// ============================================================================

#[tokio::test]
async fn test_journal_recovery_reproduces_balances() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("recovery.journal");

    {
        let catalog = Arc::new(InMemoryCatalog::new());
        let engine = FundingEngine::new(EngineConfig::default(), catalog, journal_path.clone())
            .await
            .unwrap();

        engine.create_account("alice", Decimal::ZERO).await.unwrap();
        engine.create_account("bob", dec!(5)).await.unwrap();
        engine.credit("alice", dec!(100)).await.unwrap();
        engine.debit("alice", dec!(30)).await.unwrap();
        engine.credit("bob", dec!(1.25)).await.unwrap();

        assert_eq!(engine.balance("alice").await.unwrap(), dec!(70));
    }

    // Fresh engine over the same journal (crash recovery simulation)
    {
        let catalog = Arc::new(InMemoryCatalog::new());
        let engine = FundingEngine::new(EngineConfig::default(), catalog, journal_path)
            .await
            .unwrap();
        engine.rebuild_from_journal().await.unwrap();

        assert_eq!(engine.balance("alice").await.unwrap(), dec!(70));
        assert_eq!(engine.balance("bob").await.unwrap(), dec!(6.25));

        let transactions = engine.transactions("alice").await.unwrap();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].kind, TxKind::Credit);
        assert_eq!(transactions[1].kind, TxKind::Debit);
    }
}
