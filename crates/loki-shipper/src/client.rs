//! HTTP delivery to the push endpoint.
//!
//! One POST per flush, no internal retry and no backoff; at-most-once
//! delivery is the contract, so a failed push surfaces an error and the
//! payload is gone. Connection management stays inside reqwest.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::error;

/// Username and password pair for HTTP Basic authentication.
pub type BasicAuth = (String, String);

/// A push that did not succeed.
///
/// Any non-2xx response or transport-level failure (DNS, connect,
/// timeout). Carries the response status when one was received and
/// whatever diagnostic text is available, so callers can log it.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The endpoint answered outside the 200-299 range.
    #[error("push endpoint returned {status}: {body}")]
    Status {
        /// Response status code.
        status: StatusCode,
        /// Response body text, possibly empty.
        body: String,
    },

    /// The request never produced a response.
    #[error("push transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

impl DeliveryError {
    /// Response status, if the endpoint answered at all.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DeliveryError::Status { status, .. } => Some(*status),
            DeliveryError::Transport(source) => source.status(),
        }
    }
}

/// Client for one configured push endpoint.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    client: reqwest::Client,
    endpoint: String,
    auth: Option<BasicAuth>,
}

impl DeliveryClient {
    /// Builds a client with the given request timeout. A failure to build
    /// the configured client falls back to reqwest defaults so the shipper
    /// keeps operating.
    #[must_use]
    pub fn new(endpoint: String, auth: Option<BasicAuth>, timeout: Duration) -> Self {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(source) => {
                error!("failed to build HTTP client: {source}, using reqwest defaults");
                reqwest::Client::new()
            }
        };

        DeliveryClient {
            client,
            endpoint,
            auth,
        }
    }

    /// POSTs one encoded payload to the endpoint.
    ///
    /// Succeeds on any 2xx response (204 typical). Everything else becomes
    /// a [`DeliveryError`]; timing out counts as a transport failure, not
    /// a retry trigger.
    pub async fn push(&self, payload: Vec<u8>) -> Result<(), DeliveryError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);

        if let Some((username, password)) = &self.auth {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Status { status, body })
    }
}
