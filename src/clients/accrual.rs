//! HTTP client for the accrual oracle.
//!
//! One `GET {address}/api/orders/{number}` per query. Only `200 OK` with a
//! decodable body is an answer; every other outcome is an `AccrualError`
//! the worker treats as "try again next tick".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use tracing::debug;

use crate::config::AccrualConfig;
use crate::interfaces::accrual_client::{AccrualClient, AccrualError, AccrualReply, Result};
use crate::model::OrderNumber;

const ORDERS_PATH: &str = "/api/orders/";

/// REST accrual oracle client.
pub struct HttpAccrualClient {
    client: Client,
    address: String,
    timeout: Duration,
}

impl HttpAccrualClient {
    /// Create a client for the configured oracle.
    pub fn new(config: &AccrualConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            address: config.address.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
        })
    }

    fn order_url(&self, number: &OrderNumber) -> String {
        format!("{}{}{}", self.address, ORDERS_PATH, number)
    }

    fn retry_after(response: &reqwest::Response) -> Option<Duration> {
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    fn check_reply(reply: AccrualReply) -> Result<AccrualReply> {
        if let Some(accrual) = reply.accrual {
            if accrual.is_sign_negative() {
                return Err(AccrualError::Malformed(format!(
                    "negative accrual {} for order {}",
                    accrual, reply.order
                )));
            }
        }
        Ok(reply)
    }
}

#[async_trait]
impl AccrualClient for HttpAccrualClient {
    async fn fetch(&self, number: &OrderNumber) -> Result<AccrualReply> {
        let response = self
            .client
            .get(self.order_url(number))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AccrualError::Timeout(self.timeout)
                } else {
                    AccrualError::Http(e)
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let body = response.bytes().await.map_err(|e| {
                    if e.is_timeout() {
                        AccrualError::Timeout(self.timeout)
                    } else {
                        AccrualError::Http(e)
                    }
                })?;
                let reply: AccrualReply = serde_json::from_slice(&body)?;
                debug!(order = %number, status = ?reply.status, "Oracle reply");
                Self::check_reply(reply)
            }
            StatusCode::NO_CONTENT => Err(AccrualError::NoContent),
            StatusCode::TOO_MANY_REQUESTS => Err(AccrualError::RateLimited {
                retry_after: Self::retry_after(&response),
            }),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(AccrualError::Status {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                })
            }
        }
    }
}
