use std::sync::Arc;

use point_ledger::{
    adapters::database::memory::{MemoryBalanceStore, MemoryHistoryLog},
    domain::{TransactionKind, TransactionRecord},
    Error, LedgerService,
};
use rstest::*;
use speculoos::prelude::*;

type MemoryLedger = LedgerService<MemoryBalanceStore, MemoryHistoryLog>;

#[fixture]
fn ledger() -> MemoryLedger {
    LedgerService::new(
        Arc::new(MemoryBalanceStore::default()),
        Arc::new(MemoryHistoryLog::default()),
    )
}

fn signed_total(history: &[TransactionRecord]) -> i64 {
    history
        .iter()
        .map(|r| match r.kind {
            TransactionKind::Charge => r.amount as i64,
            TransactionKind::Use => -(r.amount as i64),
        })
        .sum()
}

#[rstest]
#[tokio::test]
async fn test_charge_and_use_scenario(ledger: MemoryLedger) -> Result<(), Error> {
    // A new user starts empty
    assert_that!(ledger.balance(1).await?.balance).is_equal_to(0);
    assert_that!(ledger.history(1).await?).is_empty();

    assert_that!(ledger.charge(1, 100).await?.balance).is_equal_to(100);
    assert_that!(ledger.use_points(1, 30).await?.balance).is_equal_to(70);

    // Spending more than the balance changes nothing
    let res = ledger.use_points(1, 100).await;
    assert_that!(res)
        .is_err()
        .matches(|err| matches!(err, Error::InsufficientFunds { .. }));

    // Neither does a negative charge
    let res = ledger.charge(1, -5).await;
    assert_that!(res)
        .is_err()
        .matches(|err| matches!(err, Error::InvalidAmount(-5)));

    assert_that!(ledger.balance(1).await?.balance).is_equal_to(70);
    let history = ledger.history(1).await?;
    assert_that!(history
        .iter()
        .map(|r| (r.kind, r.amount))
        .collect::<Vec<_>>())
    .is_equal_to(vec![(TransactionKind::Charge, 100), (TransactionKind::Use, 30)]);

    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_history_ids_are_global(ledger: MemoryLedger) -> Result<(), Error> {
    ledger.charge(1, 10).await?;
    ledger.charge(2, 10).await?;
    ledger.use_points(1, 5).await?;
    // A rejected operation does not consume an id
    assert_that!(ledger.use_points(2, 50).await).is_err();
    ledger.use_points(2, 5).await?;

    let ids = |history: Vec<TransactionRecord>| {
        history.into_iter().map(|r| r.id).collect::<Vec<_>>()
    };
    assert_that!(ids(ledger.history(1).await?)).is_equal_to(vec![1, 3]);
    assert_that!(ids(ledger.history(2).await?)).is_equal_to(vec![2, 4]);

    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_operations_on_one_user(ledger: MemoryLedger) -> Result<(), Error> {
    ledger.charge(1, 50).await?;

    // Twice as many points are requested as charged, so some uses must be refused
    let tasks: Vec<_> = (0..200)
        .map(|i| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                if i % 2 == 0 {
                    ledger.charge(1, 3).await
                } else {
                    ledger.use_points(1, 7).await
                }
            })
        })
        .collect();

    let mut rejected = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(_) => {}
            Err(Error::InsufficientFunds { .. }) => rejected += 1,
            Err(err) => return Err(err),
        }
    }

    let balance = ledger.balance(1).await?.balance;
    let history = ledger.history(1).await?;
    assert_that!(rejected).is_greater_than(0);
    // One record per accepted operation, plus the initial charge
    assert_that!(history).has_length(201 - rejected);
    assert_that!(signed_total(&history)).is_equal_to(balance as i64);
    // Ids of a user grow in append order
    assert_that!(history.windows(2).all(|w| w[0].id < w[1].id)).is_true();

    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_users_are_independent(ledger: MemoryLedger) -> Result<(), Error> {
    let tasks: Vec<_> = (1..=20u64)
        .map(|user_id| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    ledger.charge(user_id, user_id as i64).await?;
                }
                ledger.use_points(user_id, user_id as i64).await
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("task panicked")?;
    }

    for user_id in 1..=20u64 {
        assert_that!(ledger.balance(user_id).await?.balance).is_equal_to(9 * user_id);
        assert_that!(ledger.history(user_id).await?).has_length(11);
    }

    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_during_writes(ledger: MemoryLedger) -> Result<(), Error> {
    let writer = {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                ledger.charge(1, 2).await?;
                ledger.use_points(1, 1).await?;
            }
            Ok::<_, Error>(())
        })
    };

    // The balance peaks right after the last charge
    for _ in 0..200 {
        let balance = ledger.balance(1).await?.balance;
        assert_that!(balance).is_less_than_or_equal_to(201);
        tokio::task::yield_now().await;
    }
    writer.await.expect("task panicked")?;

    let history = ledger.history(1).await?;
    assert_that!(signed_total(&history)).is_equal_to(200);
    assert_that!(ledger.balance(1).await?.balance).is_equal_to(200);

    Ok(())
}
