//! Store contract tests.
//!
//! These tests verify the contract shared by every implementation of the
//! three store traits. Each test registers its own logins and order
//! numbers, so the suite can run against one store instance.

use rust_decimal::Decimal;

use loyalty::interfaces::DebitOutcome;
use loyalty::model::{OrderNumber, OrderStatus};
use loyalty::storage::{LedgerStore, OrderRegister, StorageError, UserStore};

fn number(raw: &str) -> OrderNumber {
    OrderNumber::parse(raw).expect("test order numbers are Luhn-valid")
}

// =============================================================================
// UserStore tests
// =============================================================================

pub async fn test_create_user_bootstraps_ledger<S>(store: &S)
where
    S: UserStore + LedgerStore,
{
    let id = store
        .create_user("contract_bootstrap", "hash")
        .await
        .expect("create should succeed");

    let entries = store.entries(id).await.unwrap();
    assert_eq!(entries.len(), 1, "exactly one genesis entry");
    assert_eq!(entries[0].sequence, 0);
    assert_eq!(entries[0].order, None);

    let balance = store.balance(id).await.unwrap();
    assert_eq!(balance.current, Decimal::ZERO);
    assert_eq!(balance.withdrawn, Decimal::ZERO);
}

pub async fn test_duplicate_login<S: UserStore>(store: &S) {
    store.create_user("contract_dup", "hash").await.unwrap();
    let err = store.create_user("contract_dup", "hash").await.unwrap_err();
    assert!(
        matches!(err, StorageError::LoginTaken(_)),
        "expected LoginTaken, got {:?}",
        err
    );
}

pub async fn test_find_by_login<S: UserStore>(store: &S) {
    let id = store.create_user("contract_find", "the-hash").await.unwrap();

    let user = store
        .find_by_login("contract_find")
        .await
        .unwrap()
        .expect("user should exist");
    assert_eq!(user.id, id);
    assert_eq!(user.password_hash, "the-hash");

    assert!(store.find_by_login("contract_missing").await.unwrap().is_none());
}

// =============================================================================
// OrderRegister tests
// =============================================================================

pub async fn test_register_and_list<S>(store: &S)
where
    S: UserStore + OrderRegister,
{
    let id = store.create_user("contract_list", "h").await.unwrap();
    let first = number("4532015112830366");
    let second = number("4561261212345467");

    store.register(id, &first).await.unwrap();
    store.register(id, &second).await.unwrap();

    let orders = store.list_for_user(id).await.unwrap();
    let numbers: Vec<_> = orders.iter().map(|o| o.number.as_str()).collect();
    assert_eq!(numbers, vec![first.as_str(), second.as_str()], "upload order");
    assert!(orders.iter().all(|o| o.status == OrderStatus::New && o.accrual.is_none()));
    assert_eq!(store.owner_of(&first).await.unwrap(), Some(id));
}

pub async fn test_register_collision<S>(store: &S)
where
    S: UserStore + OrderRegister,
{
    let owner = store.create_user("contract_owner", "h").await.unwrap();
    let other = store.create_user("contract_other", "h").await.unwrap();
    let order = number("6011111111111117");

    store.register(owner, &order).await.unwrap();
    for user in [owner, other] {
        assert!(matches!(
            store.register(user, &order).await,
            Err(StorageError::OrderExists(_))
        ));
    }
    assert_eq!(store.owner_of(&order).await.unwrap(), Some(owner));
    assert_eq!(store.list_for_user(owner).await.unwrap().len(), 1);
    assert!(store.list_for_user(other).await.unwrap().is_empty());
}

pub async fn test_pending_excludes_terminal<S>(store: &S)
where
    S: UserStore + OrderRegister,
{
    let id = store.create_user("contract_pending", "h").await.unwrap();
    let fresh = number("5555555555554444");
    let working = number("5105105105105100");
    let rejected = number("4111111111111111");
    let done = number("4012888888881881");
    for order in [&fresh, &working, &rejected, &done] {
        store.register(id, order).await.unwrap();
    }

    assert!(store.apply_status(&working, OrderStatus::Processing).await.unwrap());
    assert!(store.apply_status(&rejected, OrderStatus::Invalid).await.unwrap());
    assert!(store.apply_accrual(&done, Decimal::ONE).await.unwrap().is_some());

    let mut pending: Vec<_> = store
        .list_pending()
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.user_id == id)
        .map(|p| (p.number, p.status))
        .collect();
    pending.sort_by(|a, b| a.0.cmp(&b.0));
    let mut expected = vec![(fresh, OrderStatus::New), (working, OrderStatus::Processing)];
    expected.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(pending, expected);
}

pub async fn test_terminal_states_are_final<S>(store: &S)
where
    S: UserStore + OrderRegister + LedgerStore,
{
    let id = store.create_user("contract_final", "h").await.unwrap();
    let invalid = number("378282246310005");
    let processed = number("371449635398431");
    store.register(id, &invalid).await.unwrap();
    store.register(id, &processed).await.unwrap();

    assert!(store.apply_status(&invalid, OrderStatus::Invalid).await.unwrap());
    assert!(store.apply_accrual(&processed, Decimal::from(3)).await.unwrap().is_some());

    for order in [&invalid, &processed] {
        assert!(!store.apply_status(order, OrderStatus::Processing).await.unwrap());
        assert!(!store.apply_status(order, OrderStatus::Invalid).await.unwrap());
        assert!(store.apply_accrual(order, Decimal::from(3)).await.unwrap().is_none());
    }
    assert!(matches!(
        store.apply_status(&invalid, OrderStatus::Processed).await,
        Err(StorageError::InvalidTransition { .. })
    ));

    let balance = store.balance(id).await.unwrap();
    assert_eq!(balance.current, Decimal::from(3), "credited exactly once");
}

pub async fn test_unknown_order_is_a_no_op<S: OrderRegister>(store: &S) {
    let ghost = number("30569309025904");
    assert!(!store.apply_status(&ghost, OrderStatus::Processing).await.unwrap());
    assert!(store.apply_accrual(&ghost, Decimal::ONE).await.unwrap().is_none());
    assert_eq!(store.owner_of(&ghost).await.unwrap(), None);
}

// =============================================================================
// LedgerStore tests
// =============================================================================

pub async fn test_credit_pairs_with_processed<S>(store: &S)
where
    S: UserStore + OrderRegister + LedgerStore,
{
    let id = store.create_user("contract_credit", "h").await.unwrap();
    let order = number("38520000023237");
    store.register(id, &order).await.unwrap();

    let credit = store
        .apply_accrual(&order, Decimal::new(12345, 2))
        .await
        .unwrap()
        .expect("first accrual credits");
    assert_eq!(credit.order.as_ref(), Some(&order));
    assert_eq!(credit.amount, Decimal::new(12345, 2));

    let orders = store.list_for_user(id).await.unwrap();
    assert_eq!(orders[0].status, OrderStatus::Processed);
    assert_eq!(orders[0].accrual, Some(Decimal::new(12345, 2)));

    let with_order = store
        .entries(id)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.order.as_ref() == Some(&order))
        .count();
    assert_eq!(with_order, 1);
}

pub async fn test_chain_arithmetic<S>(store: &S)
where
    S: UserStore + OrderRegister + LedgerStore,
{
    let id = store.create_user("contract_chain", "h").await.unwrap();
    let earn_a = number("6011000990139424");
    let earn_b = number("3530111333300000");
    let spend = number("3566002020360505");
    store.register(id, &earn_a).await.unwrap();
    store.register(id, &earn_b).await.unwrap();

    store.apply_accrual(&earn_a, Decimal::new(10050, 2)).await.unwrap();
    store.debit(id, &spend, Decimal::new(2525, 2)).await.unwrap();
    store.apply_accrual(&earn_b, Decimal::new(1, 1)).await.unwrap();
    store.debit(id, &spend, Decimal::from(5)).await.unwrap();

    let entries = store.entries(id).await.unwrap();
    assert_eq!(entries.len(), 5);
    for (i, pair) in entries.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        assert_eq!(next.sequence, prev.sequence + 1, "gapless at {}", i);
        assert_eq!(next.balance, prev.balance + next.amount);
        let spent = if next.amount < Decimal::ZERO { -next.amount } else { Decimal::ZERO };
        assert_eq!(next.withdrawn, prev.withdrawn + spent);
    }

    let balance = store.balance(id).await.unwrap();
    assert_eq!(balance.current, Decimal::new(7035, 2));
    assert_eq!(balance.withdrawn, Decimal::new(3025, 2));

    let withdrawals = store.withdrawals(id).await.unwrap();
    let sums: Vec<_> = withdrawals.iter().map(|w| w.sum).collect();
    assert_eq!(sums, vec![Decimal::new(2525, 2), Decimal::from(5)], "oldest first");
}

pub async fn test_debit_insufficient_writes_nothing<S>(store: &S)
where
    S: UserStore + LedgerStore,
{
    let id = store.create_user("contract_broke", "h").await.unwrap();
    let spend = number("5019717010103742");

    let outcome = store.debit(id, &spend, Decimal::new(1, 2)).await.unwrap();
    assert_eq!(
        outcome,
        DebitOutcome::InsufficientFunds {
            available: Decimal::ZERO
        }
    );
    assert_eq!(store.entries(id).await.unwrap().len(), 1);
    assert!(store.withdrawals(id).await.unwrap().is_empty());
}

pub async fn test_debit_exact_balance<S>(store: &S)
where
    S: UserStore + OrderRegister + LedgerStore,
{
    let id = store.create_user("contract_exact", "h").await.unwrap();
    let earn = number("6331101999990016");
    let spend = number("4222222222222");
    store.register(id, &earn).await.unwrap();
    store.apply_accrual(&earn, Decimal::from(42)).await.unwrap();

    assert!(matches!(
        store.debit(id, &spend, Decimal::from(42)).await.unwrap(),
        DebitOutcome::Accepted(_)
    ));
    let balance = store.balance(id).await.unwrap();
    assert_eq!(balance.current, Decimal::ZERO);
    assert_eq!(balance.withdrawn, Decimal::from(42));
}

/// Run all store contract tests against a store.
#[macro_export]
macro_rules! run_ledger_tests {
    ($store:expr) => {
        use $crate::storage::ledger_tests::*;

        test_create_user_bootstraps_ledger($store).await;
        println!("  test_create_user_bootstraps_ledger: PASSED");

        test_duplicate_login($store).await;
        println!("  test_duplicate_login: PASSED");

        test_find_by_login($store).await;
        println!("  test_find_by_login: PASSED");

        test_register_and_list($store).await;
        println!("  test_register_and_list: PASSED");

        test_register_collision($store).await;
        println!("  test_register_collision: PASSED");

        test_pending_excludes_terminal($store).await;
        println!("  test_pending_excludes_terminal: PASSED");

        test_terminal_states_are_final($store).await;
        println!("  test_terminal_states_are_final: PASSED");

        test_unknown_order_is_a_no_op($store).await;
        println!("  test_unknown_order_is_a_no_op: PASSED");

        test_credit_pairs_with_processed($store).await;
        println!("  test_credit_pairs_with_processed: PASSED");

        test_chain_arithmetic($store).await;
        println!("  test_chain_arithmetic: PASSED");

        test_debit_insufficient_writes_nothing($store).await;
        println!("  test_debit_insufficient_writes_nothing: PASSED");

        test_debit_exact_balance($store).await;
        println!("  test_debit_exact_balance: PASSED");
    };
}
