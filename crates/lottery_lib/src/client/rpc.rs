use crate::error::LedgerError;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC endpoint of the ledger node.
///
/// Every request is sent through a freshly built HTTP client with pooling
/// disabled and no-cache headers. Reusing a connection let some nodes answer
/// round queries from a stale cache, so the churn is intentional.
pub struct Rpc {
    url: String,
    timeout_ms: u64,
    max_retries: usize,
    backoff_ms: u64,
    next_id: AtomicU64,
}

impl Rpc {
    pub fn new(rpc_url: &str, timeout_ms: u64, max_retries: usize, backoff_ms: u64) -> Self {
        Self {
            url: rpc_url.to_string(),
            timeout_ms,
            max_retries,
            backoff_ms,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn fresh_client(&self) -> Result<reqwest::Client, LedgerError> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(self.timeout_ms))
            .pool_max_idle_per_host(0)
            .default_headers(headers)
            .build()?;
        Ok(client)
    }

    /// Single attempt, no retry. Used for transaction submission.
    pub async fn call_once<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let client = self.fresh_client()?;
        let response = client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Status(status.as_u16()));
        }
        let envelope: RpcEnvelope = response.json().await.map_err(|e| self.map_transport(e))?;

        if let Some(err) = envelope.error {
            return Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        serde_json::from_value(envelope.result).map_err(|e| {
            LedgerError::Malformed(format!("unexpected result for {}: {}", method, e))
        })
    }

    /// Retries transient failures with exponential backoff and jitter.
    /// Malformed responses and RPC-level rejections are returned at once.
    pub async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, LedgerError> {
        let mut attempt = 0usize;
        loop {
            match self.call_once(method, params.clone()).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(method, attempt, "rpc request recovered");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        method,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "rpc request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        let base = self.backoff_ms.saturating_mul(1u64 << attempt.min(16));
        let jitter = if self.backoff_ms > 1 {
            rand::random_range(0..self.backoff_ms / 2 + 1)
        } else {
            0
        };
        Duration::from_millis(base.saturating_add(jitter))
    }

    fn map_transport(&self, err: reqwest::Error) -> LedgerError {
        if err.is_timeout() {
            LedgerError::Timeout(self.timeout_ms)
        } else {
            LedgerError::Transport(err)
        }
    }
}
