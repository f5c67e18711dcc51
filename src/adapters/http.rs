//! HTTP GET with retry and exponential backoff.
//!
//! `RetryingClient` never turns a failed request into an empty result: after the
//! last attempt the caller gets `EtlError::SourceUnavailable`.

use crate::domain::ports::{HttpReply, HttpTransport, TransportError};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier: 2.0,
        }
    }

    /// base_delay * multiplier^(attempts - 1)
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(attempts.saturating_sub(1) as i32);
        Duration::from_secs_f64(delay_secs)
    }
}

/// 408 / 429 / 5xx 可以重試，其他 4xx 不行
fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("precon-etl/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| EtlError::ConfigError {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> std::result::Result<HttpReply, TransportError> {
        let response = self.client.get(url).send().await.map_err(|e| TransportError {
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError {
            message: format!("failed to read response body: {}", e),
        })?;

        Ok(HttpReply { status, body })
    }
}

#[derive(Clone)]
pub struct RetryingClient {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            tracing::debug!("📡 GET {} (attempt {}/{})", url, attempts, max_attempts);

            let failure = match self.transport.get(url).await {
                Ok(reply) if (200..300).contains(&reply.status) => return Ok(reply.body),
                Ok(reply) if reply.status == 404 => {
                    return Err(EtlError::not_found(format!("{} returned HTTP 404", url)));
                }
                Ok(reply) if !is_transient_status(reply.status) => {
                    return Err(EtlError::SourceUnavailable {
                        endpoint: url.to_string(),
                        attempts,
                        message: format!("HTTP {}", reply.status),
                    });
                }
                Ok(reply) => format!("HTTP {}", reply.status),
                Err(e) => e.message,
            };

            if attempts >= max_attempts {
                tracing::error!(
                    "❌ {} unavailable after {} attempt(s): {}",
                    url,
                    attempts,
                    failure
                );
                return Err(EtlError::SourceUnavailable {
                    endpoint: url.to_string(),
                    attempts,
                    message: failure,
                });
            }

            let delay = self.policy.next_delay(attempts);
            tracing::warn!(
                "🔄 {} failed ({}), retrying in {:?} ({}/{})",
                url,
                failure,
                delay,
                attempts,
                max_attempts
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// 內容無法解析時回傳 `MalformedPayload`，不重試
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| EtlError::MalformedPayload {
            endpoint: url.to_string(),
            message: e.to_string(),
        })
    }
}
