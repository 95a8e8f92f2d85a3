//! Signed SOAP client with bounded timeout retry and failure classification.
//!
//! Every call gets a freshly computed authentication signature (stale
//! timestamps are rejected by the service, so nothing about the header may be
//! reused). Timeouts are retried up to [`RETRY_TIMEOUT_COUNT`] times with no
//! backoff; every other wire failure is classified once into the
//! [`MarketoError`] taxonomy and surfaced unchanged.

use super::auth::Credentials;
use super::transport::{RpcFailure, RpcTransport};
use crate::error::MarketoError;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

/// Maximum timeout retries after the first attempt.
pub const RETRY_TIMEOUT_COUNT: u32 = 5;

/// Retryable application error codes embedded in HTTP error bodies:
/// 10001/20011 are internal server errors, 20015 is the request limit.
const RETRYABLE_SERVICE_CODES: [&str; 3] = ["10001", "20011", "20015"];

/// Signed RPC client over an opaque [`RpcTransport`].
#[derive(Clone)]
pub struct SoapClient {
    transport: Arc<dyn RpcTransport>,
    credentials: Credentials,
}

impl std::fmt::Debug for SoapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapClient")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl SoapClient {
    pub fn new(transport: Arc<dyn RpcTransport>, credentials: Credentials) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// Issue one signed call, retrying transparently on timeouts.
    ///
    /// # Errors
    /// - [`MarketoError::Transport`] when the timeout budget is exhausted
    /// - [`MarketoError::Config`] for client faults, unknown application
    ///   error codes, and connection failures
    /// - [`MarketoError::RetryableService`] for server faults, internal
    ///   errors, and rate limiting
    pub async fn call(&self, operation: &str, body: &Value) -> Result<Value, MarketoError> {
        let mut timeouts = 0;
        loop {
            // fresh timestamp + signature on every attempt
            let auth = self.credentials.auth_header();
            match self.transport.call(operation, &auth, body).await {
                Ok(response) => return Ok(response),
                Err(RpcFailure::Timeout) => {
                    timeouts += 1;
                    if timeouts > RETRY_TIMEOUT_COUNT {
                        return Err(MarketoError::Transport(format!(
                            "'{}' timed out after {} retries",
                            operation, RETRY_TIMEOUT_COUNT
                        )));
                    }
                    log::warn!(
                        "Timeout [{}/{}] on '{}'. Retrying...",
                        timeouts,
                        RETRY_TIMEOUT_COUNT,
                        operation
                    );
                }
                Err(failure) => return Err(self.classify(failure)),
            }
        }
    }

    /// Map a non-timeout wire failure into the error taxonomy.
    fn classify(&self, failure: RpcFailure) -> MarketoError {
        match failure {
            RpcFailure::SoapFault { code, message } => {
                log::debug!("SOAP fault: code={} message={}", code, message);
                if code.ends_with(":Client") || code == "Client" {
                    // malformed request or bad credentials
                    MarketoError::Config(message)
                } else {
                    MarketoError::RetryableService { code, message }
                }
            }
            RpcFailure::Http { status, body } => {
                log::debug!("HTTP error {}: {}", status, body);
                let code = scrape(r"(?s)<code>(.*?)</code>", &body).unwrap_or_default();
                let message = scrape(r"(?s)<message>(.*?)</message>", &body)
                    .unwrap_or_else(|| format!("HTTP {}", status));
                if RETRYABLE_SERVICE_CODES.contains(&code.as_str()) {
                    MarketoError::RetryableService { code, message }
                } else {
                    // authentication failed, invalid request, and the like
                    MarketoError::Config(message)
                }
            }
            RpcFailure::Connect(message) => {
                log::debug!(
                    "Connection error: endpoint={} detail={}",
                    self.transport.endpoint(),
                    message
                );
                MarketoError::Config(format!(
                    "Connection error: {} (endpoint is '{}')",
                    message,
                    self.transport.endpoint()
                ))
            }
            RpcFailure::Timeout => {
                // handled by the retry loop; kept for exhaustiveness
                MarketoError::Transport("request timed out".to_string())
            }
        }
    }
}

fn scrape(pattern: &str, text: &str) -> Option<String> {
    let regex = Regex::new(pattern).ok()?;
    regex
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}
