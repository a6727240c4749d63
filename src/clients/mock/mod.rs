//! Scripted accrual oracle for testing.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::interfaces::accrual_client::{
    AccrualClient, AccrualError, AccrualReply, AccrualStatus, Result,
};
use crate::model::OrderNumber;

/// One scripted oracle answer.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Status(AccrualStatus),
    Processed(Option<Decimal>),
    NoContent,
    RateLimited,
    ServerError,
    /// Never answer; exercises the caller's deadline.
    Hang,
}

impl ScriptedReply {
    async fn into_result(self, number: &OrderNumber) -> Result<AccrualReply> {
        if let ScriptedReply::Hang = self {
            std::future::pending::<()>().await;
        }

        let reply = |status, accrual| AccrualReply {
            order: number.to_string(),
            status,
            accrual,
        };
        match self {
            ScriptedReply::Status(status) => Ok(reply(status, None)),
            ScriptedReply::Processed(accrual) => Ok(reply(AccrualStatus::Processed, accrual)),
            ScriptedReply::NoContent => Err(AccrualError::NoContent),
            ScriptedReply::RateLimited => Err(AccrualError::RateLimited {
                retry_after: Some(Duration::from_secs(60)),
            }),
            ScriptedReply::ServerError => Err(AccrualError::Status {
                status: 500,
                body: "scripted failure".to_string(),
            }),
            ScriptedReply::Hang => Err(AccrualError::Timeout(Duration::MAX)),
        }
    }
}

/// Oracle that replays per-order scripts.
///
/// Each script is consumed front to back; its last reply repeats. Orders
/// without a script answer `NoContent`.
#[derive(Default)]
pub struct MockAccrualClient {
    scripts: RwLock<HashMap<OrderNumber, VecDeque<ScriptedReply>>>,
    calls: RwLock<HashMap<OrderNumber, usize>>,
}

impl MockAccrualClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn script(&self, number: &OrderNumber, replies: Vec<ScriptedReply>) {
        self.scripts
            .write()
            .await
            .insert(number.clone(), replies.into());
    }

    /// How many times `number` was fetched.
    pub async fn calls(&self, number: &OrderNumber) -> usize {
        self.calls.read().await.get(number).copied().unwrap_or(0)
    }

    async fn next_reply(&self, number: &OrderNumber) -> ScriptedReply {
        let mut scripts = self.scripts.write().await;
        match scripts.get_mut(number) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap_or(ScriptedReply::NoContent),
            Some(script) => script.front().cloned().unwrap_or(ScriptedReply::NoContent),
            None => ScriptedReply::NoContent,
        }
    }
}

#[async_trait]
impl AccrualClient for MockAccrualClient {
    async fn fetch(&self, number: &OrderNumber) -> Result<AccrualReply> {
        *self.calls.write().await.entry(number.clone()).or_default() += 1;

        self.next_reply(number).await.into_result(number).await
    }
}
