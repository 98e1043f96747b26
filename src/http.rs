//! Shared HTTP plumbing for the feed and search adapters.
//!
//! Retries are local to a single request: transport timeouts, refused
//! connections and 429/5xx responses are retried with exponential backoff.
//! Whatever is left after the last attempt is handed back to the adapter,
//! which decides how it maps onto the error taxonomy.

use crate::constants::USER_AGENT;
use crate::error::{CollectError, Result};
use rand::Rng;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.backoff.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(16));
        let jitter_ms = if base_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=base_ms / 2)
        };
        Duration::from_millis(exp_ms.saturating_add(jitter_ms))
    }
}

pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(CollectError::from)
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// GET `url` with `query`, retrying transient failures per `policy`.
///
/// Returns the last response received, successful or not; only transport
/// failures surface as errors.
pub async fn get_with_retry(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    policy: &RetryPolicy,
) -> Result<Response> {
    let mut attempt = 0;
    loop {
        let outcome = client.get(url).query(query).send().await;
        let retryable = match &outcome {
            Ok(resp) => is_retryable_status(resp.status()),
            Err(e) => is_retryable_error(e),
        };

        if !retryable || attempt >= policy.max_retries {
            return outcome.map_err(CollectError::from);
        }

        let delay = policy.delay_for(attempt);
        match &outcome {
            Ok(resp) => warn!(
                "GET {} returned {}; retrying in {:?} (attempt {}/{})",
                url,
                resp.status().as_u16(),
                delay,
                attempt + 1,
                policy.max_retries
            ),
            Err(e) => warn!(
                "GET {} failed: {}; retrying in {:?} (attempt {}/{})",
                url,
                e,
                delay,
                attempt + 1,
                policy.max_retries
            ),
        }
        drop(outcome);
        tokio::time::sleep(delay).await;
        attempt += 1;
        debug!("Retrying GET {}", url);
    }
}
