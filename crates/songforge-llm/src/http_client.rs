//! Shared HTTP client for the LLM provider
//!
//! One `reqwest::Client` per process with timeout and retry policy: bounded
//! retries with backoff for 5xx and network failures, never for 4xx.

use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use songforge_utils::error::GenerationError;

/// Hard ceiling on any single HTTP request.
const DEFAULT_MAX_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for 5xx and network failures.
const MAX_RETRIES: u32 = 2;

/// Initial backoff between retries.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Shared HTTP client for provider calls.
#[derive(Clone, Debug)]
pub(crate) struct HttpClient {
    client: Arc<Client>,
    max_timeout: Duration,
}

impl HttpClient {
    /// Create a client with default limits.
    ///
    /// # Errors
    /// Returns `GenerationError::Transport` if the client cannot be built.
    pub fn new() -> Result<Self, GenerationError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .use_rustls_tls()
            .build()
            .map_err(|e| GenerationError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            max_timeout: DEFAULT_MAX_HTTP_TIMEOUT,
        })
    }

    /// Execute a request with the retry policy applied.
    ///
    /// Effective timeout is `min(request_timeout, max_timeout)`. 5xx and
    /// transport errors retry up to [`MAX_RETRIES`] times with linear
    /// backoff; 4xx errors are mapped and returned immediately.
    pub async fn execute_with_retry(
        &self,
        request_builder: reqwest::RequestBuilder,
        request_timeout: Duration,
    ) -> Result<Response, GenerationError> {
        let effective_timeout = request_timeout.min(self.max_timeout);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let request = request_builder
                .try_clone()
                .ok_or_else(|| {
                    GenerationError::Transport("failed to clone request for retry".to_string())
                })?
                .timeout(effective_timeout)
                .build()
                .map_err(|e| GenerationError::Transport(format!("failed to build request: {e}")))?;

            debug!(attempt, timeout_secs = effective_timeout.as_secs(), "executing LLM request");

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_client_error() {
                        return Err(map_client_error(status));
                    }

                    if status.is_server_error() {
                        if attempt <= MAX_RETRIES {
                            warn!(attempt, status = status.as_u16(), "server error, will retry");
                            tokio::time::sleep(INITIAL_BACKOFF * attempt).await;
                            continue;
                        }
                        return Err(GenerationError::ProviderOutage(format!(
                            "provider returned {status} after {attempt} attempts"
                        )));
                    }

                    return Ok(response);
                }
                Err(e) => {
                    if e.is_timeout() {
                        return Err(GenerationError::Timeout {
                            seconds: effective_timeout.as_secs(),
                        });
                    }

                    if attempt <= MAX_RETRIES {
                        warn!(attempt, error = %e, "network error, will retry");
                        tokio::time::sleep(INITIAL_BACKOFF * attempt).await;
                        continue;
                    }

                    return Err(GenerationError::Transport(format!(
                        "request failed after {attempt} attempts: {e}"
                    )));
                }
            }
        }
    }
}

/// Map a 4xx status to the matching error variant.
fn map_client_error(status: StatusCode) -> GenerationError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GenerationError::Auth(format!("provider returned {status}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            GenerationError::Quota(format!("provider returned {status}"))
        }
        other => GenerationError::Transport(format!("provider returned {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_auth_errors() {
        assert!(matches!(
            map_client_error(StatusCode::UNAUTHORIZED),
            GenerationError::Auth(_)
        ));
        assert!(matches!(
            map_client_error(StatusCode::FORBIDDEN),
            GenerationError::Auth(_)
        ));
    }

    #[test]
    fn rate_limit_maps_to_quota() {
        assert!(matches!(
            map_client_error(StatusCode::TOO_MANY_REQUESTS),
            GenerationError::Quota(_)
        ));
    }

    #[test]
    fn other_client_errors_map_to_transport() {
        assert!(matches!(
            map_client_error(StatusCode::BAD_REQUEST),
            GenerationError::Transport(_)
        ));
    }

    #[test]
    fn client_builds() {
        assert!(HttpClient::new().is_ok());
    }
}
