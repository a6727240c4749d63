//! Mock storage implementation for testing.
//!
//! [`MockStore`] keeps users, orders and ledger chains behind one lock, so
//! every operation is trivially atomic. Failure switches let tests drive the
//! error paths of the services and the reconciliation worker.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::helpers;
use super::{LedgerStore, OrderRegister, Result, StorageError, UserStore};
use crate::interfaces::DebitOutcome;
use crate::model::{
    Balance, LedgerEntry, Order, OrderNumber, OrderStatus, PendingOrder, User, UserId, Withdrawal,
};

struct StoredOrder {
    user_id: UserId,
    order: Order,
}

#[derive(Default)]
struct MockState {
    users: HashMap<String, User>,
    /// Upload order.
    orders: Vec<StoredOrder>,
    ledger: HashMap<UserId, Vec<LedgerEntry>>,
}

impl MockState {
    fn order_mut(&mut self, number: &OrderNumber) -> Option<&mut StoredOrder> {
        self.orders.iter_mut().find(|o| &o.order.number == number)
    }

    fn latest(&self, user_id: UserId) -> Result<&LedgerEntry> {
        self.ledger
            .get(&user_id)
            .and_then(|chain| chain.last())
            .ok_or(StorageError::ChainMissing(user_id))
    }
}

/// Mock store that keeps everything in memory.
#[derive(Default)]
pub struct MockStore {
    state: RwLock<MockState>,
    fail_on_register: RwLock<bool>,
    fail_on_list_pending: RwLock<bool>,
    fail_on_apply: RwLock<bool>,
    fail_on_debit: RwLock<bool>,
}

fn injected() -> StorageError {
    StorageError::Unavailable("mock failure".to_string())
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_register(&self, fail: bool) {
        *self.fail_on_register.write().await = fail;
    }

    pub async fn set_fail_on_list_pending(&self, fail: bool) {
        *self.fail_on_list_pending.write().await = fail;
    }

    /// Fail both `apply_status` and `apply_accrual`.
    pub async fn set_fail_on_apply(&self, fail: bool) {
        *self.fail_on_apply.write().await = fail;
    }

    pub async fn set_fail_on_debit(&self, fail: bool) {
        *self.fail_on_debit.write().await = fail;
    }

    /// Current status of an order, if registered.
    pub async fn status_of(&self, number: &OrderNumber) -> Option<OrderStatus> {
        self.state
            .read()
            .await
            .orders
            .iter()
            .find(|o| &o.order.number == number)
            .map(|o| o.order.status)
    }
}

#[async_trait]
impl UserStore for MockStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<UserId> {
        let mut state = self.state.write().await;
        if state.users.contains_key(login) {
            return Err(StorageError::LoginTaken(login.to_string()));
        }

        let id = UserId::new();
        state.users.insert(
            login.to_string(),
            User {
                id,
                login: login.to_string(),
                password_hash: password_hash.to_string(),
            },
        );
        state
            .ledger
            .insert(id, vec![LedgerEntry::genesis(id, helpers::now())]);
        Ok(id)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(login).cloned())
    }
}

#[async_trait]
impl OrderRegister for MockStore {
    async fn register(&self, user_id: UserId, number: &OrderNumber) -> Result<()> {
        if *self.fail_on_register.read().await {
            return Err(injected());
        }
        let mut state = self.state.write().await;
        if state.order_mut(number).is_some() {
            return Err(StorageError::OrderExists(number.clone()));
        }
        state.orders.push(StoredOrder {
            user_id,
            order: Order {
                number: number.clone(),
                status: OrderStatus::New,
                accrual: None,
                uploaded_at: helpers::now(),
            },
        });
        Ok(())
    }

    async fn owner_of(&self, number: &OrderNumber) -> Result<Option<UserId>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .find(|o| &o.order.number == number)
            .map(|o| o.user_id))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .map(|o| o.order.clone())
            .collect())
    }

    async fn list_pending(&self) -> Result<Vec<PendingOrder>> {
        if *self.fail_on_list_pending.read().await {
            return Err(injected());
        }
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| !o.order.status.is_terminal())
            .map(|o| PendingOrder {
                number: o.order.number.clone(),
                status: o.order.status,
                user_id: o.user_id,
            })
            .collect())
    }

    async fn apply_status(&self, number: &OrderNumber, status: OrderStatus) -> Result<bool> {
        if status == OrderStatus::Processed || status.sources().is_empty() {
            return Err(StorageError::InvalidTransition {
                number: number.clone(),
                to: status,
            });
        }
        if *self.fail_on_apply.read().await {
            return Err(injected());
        }

        let mut state = self.state.write().await;
        match state.order_mut(number) {
            Some(stored) if stored.order.status.can_transition_to(status) => {
                stored.order.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_accrual(
        &self,
        number: &OrderNumber,
        accrual: Decimal,
    ) -> Result<Option<LedgerEntry>> {
        if accrual.is_sign_negative() {
            return Err(StorageError::InvalidAmount(accrual));
        }
        if *self.fail_on_apply.read().await {
            return Err(injected());
        }

        let mut state = self.state.write().await;
        let user_id = match state.order_mut(number) {
            Some(stored) if stored.order.status.can_transition_to(OrderStatus::Processed) => {
                stored.user_id
            }
            _ => return Ok(None),
        };

        let credit = state
            .latest(user_id)?
            .next(Some(number.clone()), accrual, helpers::now());

        if let Some(stored) = state.order_mut(number) {
            stored.order.status = OrderStatus::Processed;
            stored.order.accrual = Some(accrual);
        }
        state.ledger.entry(user_id).or_default().push(credit.clone());
        Ok(Some(credit))
    }
}

#[async_trait]
impl LedgerStore for MockStore {
    async fn balance(&self, user_id: UserId) -> Result<Balance> {
        Ok(self.state.read().await.latest(user_id)?.balance())
    }

    async fn debit(
        &self,
        user_id: UserId,
        order: &OrderNumber,
        amount: Decimal,
    ) -> Result<DebitOutcome> {
        if amount <= Decimal::ZERO {
            return Err(StorageError::InvalidAmount(amount));
        }
        if *self.fail_on_debit.read().await {
            return Err(injected());
        }

        let mut state = self.state.write().await;
        let latest = state.latest(user_id)?;
        if latest.balance < amount {
            return Ok(DebitOutcome::InsufficientFunds {
                available: latest.balance,
            });
        }

        let entry = latest.next(Some(order.clone()), -amount, helpers::now());
        state.ledger.entry(user_id).or_default().push(entry.clone());
        Ok(DebitOutcome::Accepted(entry))
    }

    async fn withdrawals(&self, user_id: UserId) -> Result<Vec<Withdrawal>> {
        let state = self.state.read().await;
        Ok(state
            .ledger
            .get(&user_id)
            .map(|chain| chain.iter().filter_map(LedgerEntry::as_withdrawal).collect())
            .unwrap_or_default())
    }

    async fn entries(&self, user_id: UserId) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state.ledger.get(&user_id).cloned().unwrap_or_default())
    }
}
