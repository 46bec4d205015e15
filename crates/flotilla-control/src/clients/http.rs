//! Shared reqwest wrapper with a fixed retry budget.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::config::HttpConfig;
use crate::error::{ControlError, ControlResult};

/// Longest response body kept in an error.
const MAX_ERROR_BODY: usize = 512;

/// Fixed-budget retry policy with a constant delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per request, including the first.
    pub attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// A single attempt.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Policy from configuration.
    #[must_use]
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            delay: Duration::from_millis(config.retry_delay_millis),
        }
    }
}

/// HTTP client used by every REST collaborator.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Create a client from configuration.
    pub fn new(config: &HttpConfig) -> ControlResult<Self> {
        Self::with_policy(
            Duration::from_secs(config.timeout_secs),
            RetryPolicy::from_config(config),
        )
    }

    /// Create a client with an explicit timeout and retry policy.
    pub fn with_policy(timeout: Duration, retry: RetryPolicy) -> ControlResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ControlError::Http)?;

        Ok(Self { client, retry })
    }

    /// Send a request, retrying connection failures and 5xx answers.
    ///
    /// The closure is called once per attempt. Any answer below 500 is
    /// returned as-is.
    pub async fn send_raw<F>(&self, service: &'static str, build: F) -> ControlResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            let retries_left = attempt < self.retry.attempts;

            match build(&self.client).send().await {
                Ok(response) if response.status().is_server_error() && retries_left => {
                    warn!(
                        service,
                        status = response.status().as_u16(),
                        attempt,
                        "server error, retrying"
                    );
                }
                Ok(response) => return Ok(response),
                Err(e) if (e.is_connect() || e.is_timeout()) && retries_left => {
                    warn!(service, error = %e, attempt, "request failed, retrying");
                }
                Err(e) => return Err(ControlError::Http(e)),
            }

            attempt += 1;
            tokio::time::sleep(self.retry.delay).await;
        }
    }

    /// Send a request and require a 2xx answer.
    pub async fn send<F>(&self, service: &'static str, build: F) -> ControlResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = self.send_raw(service, build).await?;
        ensure_success(service, response).await
    }

    /// Send a request and decode a JSON answer.
    pub async fn json<T, F>(&self, service: &'static str, build: F) -> ControlResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        self.send(service, build)
            .await?
            .json()
            .await
            .map_err(ControlError::Http)
    }
}

/// Turn a non-2xx response into [`ControlError::Api`].
pub async fn ensure_success(service: &'static str, response: Response) -> ControlResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    Err(ControlError::Api {
        service,
        status: status.as_u16(),
        body,
    })
}
