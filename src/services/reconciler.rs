//! Background reconciliation of pending orders against the accrual oracle.
//!
//! Each tick lists every order that is not yet terminal, asks the oracle
//! about each one in turn and applies the answer:
//!
//! | oracle status          | effect                                      |
//! |------------------------|---------------------------------------------|
//! | registered / unknown   | none                                        |
//! | processing             | status -> Processing                        |
//! | invalid                | status -> Invalid (terminal, no credit)     |
//! | processed              | status -> Processed + ledger credit, atomic |
//!
//! Oracle failures of any kind skip the order until the next tick. Every
//! apply is a conditional, atomic store operation, so abandoning a tick
//! midway (shutdown) or replaying an answer is harmless.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::interfaces::{AccrualClient, AccrualError, AccrualStatus};
use crate::model::{OrderStatus, PendingOrder};
use crate::storage::OrderRegister;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Per-tick counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Orders listed at the start of the tick.
    pub pending: usize,
    /// Moved to Processing.
    pub processing: usize,
    /// Moved to Invalid.
    pub invalid: usize,
    /// Moved to Processed and credited.
    pub processed: usize,
    /// Answered, but nothing to change.
    pub unchanged: usize,
    /// Oracle or store failure; retried next tick.
    pub skipped: usize,
}

enum Applied {
    Processing,
    Invalid,
    Processed,
    Unchanged,
}

pub struct ReconciliationWorker {
    register: Arc<dyn OrderRegister>,
    oracle: Arc<dyn AccrualClient>,
    interval: Duration,
    oracle_timeout: Duration,
}

impl ReconciliationWorker {
    pub fn new(register: Arc<dyn OrderRegister>, oracle: Arc<dyn AccrualClient>) -> Self {
        Self {
            register,
            oracle,
            interval: DEFAULT_INTERVAL,
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }

    /// Set the tick interval. Values below one millisecond are raised to it.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Set the deadline for a single oracle query.
    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    /// Drain the pending orders once.
    pub async fn run_tick(&self) -> TickReport {
        let mut report = TickReport::default();

        let pending = match self.register.list_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "Failed to list pending orders");
                return report;
            }
        };
        report.pending = pending.len();

        for order in &pending {
            match self.reconcile(order).await {
                Some(Applied::Processing) => report.processing += 1,
                Some(Applied::Invalid) => report.invalid += 1,
                Some(Applied::Processed) => report.processed += 1,
                Some(Applied::Unchanged) => report.unchanged += 1,
                None => report.skipped += 1,
            }
        }

        report
    }

    /// Query and apply one order; `None` means skipped.
    async fn reconcile(&self, order: &PendingOrder) -> Option<Applied> {
        let number = &order.number;

        let fetched = tokio::time::timeout(self.oracle_timeout, self.oracle.fetch(number))
            .await
            .unwrap_or(Err(AccrualError::Timeout(self.oracle_timeout)));

        let reply = match fetched {
            Ok(reply) => reply,
            Err(AccrualError::NoContent) => {
                debug!(order = %number, "Order not known to the oracle yet");
                return None;
            }
            Err(e) => {
                warn!(order = %number, error = %e, "Oracle query failed, retrying next tick");
                return None;
            }
        };

        let applied = match reply.status {
            AccrualStatus::Registered | AccrualStatus::Unknown => Ok(Applied::Unchanged),
            AccrualStatus::Processing => self
                .register
                .apply_status(number, OrderStatus::Processing)
                .await
                .map(|changed| if changed { Applied::Processing } else { Applied::Unchanged }),
            AccrualStatus::Invalid => self
                .register
                .apply_status(number, OrderStatus::Invalid)
                .await
                .map(|changed| if changed { Applied::Invalid } else { Applied::Unchanged }),
            AccrualStatus::Processed => {
                let accrual = reply.accrual.unwrap_or(Decimal::ZERO);
                self.register
                    .apply_accrual(number, accrual)
                    .await
                    .map(|credit| match credit {
                        Some(entry) => {
                            info!(
                                order = %number,
                                user_id = %order.user_id,
                                accrual = %accrual,
                                balance = %entry.balance,
                                "Order processed and credited"
                            );
                            Applied::Processed
                        }
                        None => Applied::Unchanged,
                    })
            }
        };

        match applied {
            Ok(applied) => Some(applied),
            Err(e) => {
                warn!(order = %number, error = %e, "Failed to apply oracle outcome");
                None
            }
        }
    }

    /// Run ticks in the background until stopped.
    ///
    /// A tick that outlasts the interval suppresses the triggers it
    /// overlapped. Dropping the handle without calling `stop()` also ends
    /// the task.
    pub fn spawn(self) -> WorkerHandle {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(
                interval_ms = self.interval.as_millis() as u64,
                "Reconciliation worker started"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = cancel_rx.changed() => break,
                }

                tokio::select! {
                    report = self.run_tick() => {
                        if report.pending > 0 {
                            info!(
                                pending = report.pending,
                                processing = report.processing,
                                invalid = report.invalid,
                                processed = report.processed,
                                skipped = report.skipped,
                                "Reconciliation tick"
                            );
                        }
                    }
                    _ = cancel_rx.changed() => {
                        info!("Reconciliation tick abandoned for shutdown");
                        break;
                    }
                }
            }

            info!("Reconciliation worker stopped");
        });

        WorkerHandle {
            cancel: cancel_tx,
            task,
        }
    }
}

/// Handle for controlling a spawned worker.
pub struct WorkerHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker to stop.
    pub fn stop(&self) {
        let _ = self.cancel.send(true);
    }

    /// Wait for the worker task to exit.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{MockAccrualClient, ScriptedReply};
    use crate::interfaces::LedgerStore;
    use crate::model::{OrderNumber, UserId};
    use crate::storage::{MockStore, UserStore};

    struct Fixture {
        store: Arc<MockStore>,
        oracle: Arc<MockAccrualClient>,
        user: UserId,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(MockStore::new());
            let user = store.create_user("alice", "h").await.unwrap();
            Self {
                store,
                oracle: Arc::new(MockAccrualClient::new()),
                user,
            }
        }

        async fn upload(&self, raw: &str, script: Vec<ScriptedReply>) -> OrderNumber {
            let number = OrderNumber::parse(raw).unwrap();
            self.store.register(self.user, &number).await.unwrap();
            self.oracle.script(&number, script).await;
            number
        }

        fn worker(&self) -> ReconciliationWorker {
            ReconciliationWorker::new(self.store.clone(), self.oracle.clone())
                .with_interval(Duration::from_millis(10))
                .with_oracle_timeout(Duration::from_millis(50))
        }
    }

    #[tokio::test]
    async fn test_processed_is_credited_once() {
        let f = Fixture::new().await;
        let order = f
            .upload(
                "12345678903",
                vec![ScriptedReply::Processed(Some(Decimal::from(500)))],
            )
            .await;
        let worker = f.worker();

        let report = worker.run_tick().await;
        assert_eq!(
            report,
            TickReport {
                pending: 1,
                processed: 1,
                ..Default::default()
            }
        );
        assert_eq!(f.store.status_of(&order).await, Some(OrderStatus::Processed));
        assert_eq!(f.store.balance(f.user).await.unwrap().current, Decimal::from(500));

        // Terminal orders are no longer pending; a replayed answer is a no-op.
        assert_eq!(worker.run_tick().await, TickReport::default());
        assert_eq!(f.oracle.calls(&order).await, 1);
        assert!(f.store.apply_accrual(&order, Decimal::from(500)).await.unwrap().is_none());
        assert_eq!(f.store.entries(f.user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_lifecycle_processing_then_processed() {
        let f = Fixture::new().await;
        let order = f
            .upload(
                "12345678903",
                vec![
                    ScriptedReply::Status(AccrualStatus::Registered),
                    ScriptedReply::Status(AccrualStatus::Processing),
                    ScriptedReply::Status(AccrualStatus::Processing),
                    ScriptedReply::Processed(None),
                ],
            )
            .await;
        let worker = f.worker();

        assert_eq!(worker.run_tick().await.unchanged, 1);
        assert_eq!(f.store.status_of(&order).await, Some(OrderStatus::New));

        assert_eq!(worker.run_tick().await.processing, 1);
        assert_eq!(worker.run_tick().await.unchanged, 1);
        assert_eq!(f.store.status_of(&order).await, Some(OrderStatus::Processing));

        assert_eq!(worker.run_tick().await.processed, 1);
        let orders = f.store.list_for_user(f.user).await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Processed);
        assert_eq!(orders[0].accrual, Some(Decimal::ZERO));

        let entries = f.store.entries(f.user).await.unwrap();
        assert_eq!(entries.len(), 2, "genesis plus a zero credit");
        assert_eq!(entries[1].order, Some(order));
        assert_eq!(entries[1].amount, Decimal::ZERO);
        assert_eq!(f.store.balance(f.user).await.unwrap().current, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_invalid_is_terminal_without_credit() {
        let f = Fixture::new().await;
        let order = f
            .upload(
                "12345678903",
                vec![ScriptedReply::Status(AccrualStatus::Invalid)],
            )
            .await;

        assert_eq!(f.worker().run_tick().await.invalid, 1);
        assert_eq!(f.store.status_of(&order).await, Some(OrderStatus::Invalid));
        assert_eq!(f.store.entries(f.user).await.unwrap().len(), 1);
        assert!(f.store.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failures_never_invalidate() {
        let f = Fixture::new().await;
        let order = f
            .upload(
                "12345678903",
                vec![
                    ScriptedReply::ServerError,
                    ScriptedReply::RateLimited,
                    ScriptedReply::NoContent,
                    ScriptedReply::Processed(Some(Decimal::from(10))),
                ],
            )
            .await;
        let worker = f.worker();

        for _ in 0..3 {
            assert_eq!(worker.run_tick().await.skipped, 1);
            assert_eq!(f.store.status_of(&order).await, Some(OrderStatus::New));
        }
        assert_eq!(worker.run_tick().await.processed, 1);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_the_rest() {
        let f = Fixture::new().await;
        let hanging = f.upload("12345678903", vec![ScriptedReply::Hang]).await;
        let failing = f.upload("79927398713", vec![ScriptedReply::ServerError]).await;
        let good = f
            .upload(
                "2377225624",
                vec![ScriptedReply::Processed(Some(Decimal::from(7)))],
            )
            .await;

        let report = f.worker().run_tick().await;
        assert_eq!(report.pending, 3);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.processed, 1);
        assert_eq!(f.store.status_of(&hanging).await, Some(OrderStatus::New));
        assert_eq!(f.store.status_of(&failing).await, Some(OrderStatus::New));
        assert_eq!(f.store.status_of(&good).await, Some(OrderStatus::Processed));
    }

    #[tokio::test]
    async fn test_store_failures_skip() {
        let f = Fixture::new().await;
        let order = f
            .upload(
                "12345678903",
                vec![ScriptedReply::Processed(Some(Decimal::from(5)))],
            )
            .await;
        let worker = f.worker();

        f.store.set_fail_on_list_pending(true).await;
        assert_eq!(worker.run_tick().await, TickReport::default());
        assert_eq!(f.oracle.calls(&order).await, 0);
        f.store.set_fail_on_list_pending(false).await;

        f.store.set_fail_on_apply(true).await;
        assert_eq!(worker.run_tick().await.skipped, 1);
        assert_eq!(f.store.status_of(&order).await, Some(OrderStatus::New));
        f.store.set_fail_on_apply(false).await;

        assert_eq!(worker.run_tick().await.processed, 1);
    }

    #[tokio::test]
    async fn test_spawned_worker_reconciles_and_stops() {
        let f = Fixture::new().await;
        let order = f
            .upload(
                "12345678903",
                vec![ScriptedReply::Processed(Some(Decimal::from(500)))],
            )
            .await;

        let handle = f.worker().spawn();
        for _ in 0..100 {
            if f.store.status_of(&order).await == Some(OrderStatus::Processed) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(f.store.status_of(&order).await, Some(OrderStatus::Processed));

        handle.stop();
        tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_abandons_in_flight_tick() {
        let f = Fixture::new().await;
        f.upload("12345678903", vec![ScriptedReply::Hang]).await;

        let handle = ReconciliationWorker::new(f.store.clone(), f.oracle.clone())
            .with_interval(Duration::from_millis(10))
            .with_oracle_timeout(Duration::from_secs(3600))
            .spawn();
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.stop();
        tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_is_clamped() {
        let f = Fixture::new().await;
        let order = f
            .upload(
                "12345678903",
                vec![ScriptedReply::Processed(Some(Decimal::from(10)))],
            )
            .await;

        let handle = ReconciliationWorker::new(f.store.clone(), f.oracle.clone())
            .with_interval(Duration::ZERO)
            .spawn();
        for _ in 0..100 {
            if f.store.status_of(&order).await == Some(OrderStatus::Processed) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(f.store.status_of(&order).await, Some(OrderStatus::Processed));

        handle.stop();
        tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .unwrap()
            .unwrap();
    }
}
