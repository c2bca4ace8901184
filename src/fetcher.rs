//! Single-attempt upstream fetch: pre-delay, transport timeout,
//! status/JSON classification.
//!
//! Grounded on `original_source/server/functions.py::fetch`. The pre-delay
//! sleeps before a socket is ever opened, so a cancelled hedge never touches
//! the network. Do not restructure this into a coordinator-side sleep that
//! then spawns a fresh attempt — that would reorder cancellation visibility
//! and change which attempts touch the upstream.

use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

/// What a single fetch attempt resolved to.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// HTTP 200 and a body that parses as JSON.
    Success {
        body: Bytes,
        parsed_json: serde_json::Value,
    },
    /// Any non-200 status.
    BadStatus { code: u16 },
    /// HTTP 200 but the body does not parse as JSON.
    InvalidJson,
    /// Connection error, DNS failure, read error, or timeout.
    TransportError { reason: String },
    /// The attempt was cancelled before or during the HTTP call.
    Cancelled,
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AttemptOutcome::Cancelled)
    }

    /// A terse classification used for the final-failure log message.
    pub fn describe(&self) -> String {
        match self {
            AttemptOutcome::Success { .. } => "success".to_string(),
            AttemptOutcome::BadStatus { code } => FetchError::BadStatus(*code).to_string(),
            AttemptOutcome::InvalidJson => FetchError::InvalidJson.to_string(),
            AttemptOutcome::TransportError { reason } => {
                FetchError::Transport(reason.clone()).to_string()
            }
            AttemptOutcome::Cancelled => "cancelled".to_string(),
        }
    }
}

/// The HTTP-client capability the coordinator depends on: one GET, returning
/// a status code and a body or a transport-level failure reason. Kept as a
/// small trait (rather than a generic `tower::Service`) because the upstream
/// contract here is fixed — a bare GET against one configured URL — so there
/// is no request type to be generic over.
#[async_trait::async_trait]
pub trait UpstreamClient: Send + Sync + 'static {
    async fn get(&self, url: &str, timeout: Duration) -> Result<(u16, Bytes), String>;
}

/// Production implementation backed by `reqwest::Client`.
pub struct ReqwestUpstreamClient {
    client: reqwest::Client,
}

impl ReqwestUpstreamClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestUpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl UpstreamClient for ReqwestUpstreamClient {
    async fn get(&self, url: &str, timeout: Duration) -> Result<(u16, Bytes), String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| e.to_string())?;
        Ok((status, body))
    }
}

/// Performs one attempt: sleep `pre_delay`, then (unless cancelled) issue one
/// GET with transport timeout `per_attempt_timeout`, and classify the
/// result. Never returns an `Err`; every path yields an `AttemptOutcome`.
pub async fn fetch_attempt(
    client: &dyn UpstreamClient,
    url: &str,
    per_attempt_timeout: Duration,
    pre_delay: Duration,
    cancel: &CancellationToken,
) -> AttemptOutcome {
    if !pre_delay.is_zero() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return AttemptOutcome::Cancelled,
            _ = tokio::time::sleep(pre_delay) => {}
        }
    } else if cancel.is_cancelled() {
        return AttemptOutcome::Cancelled;
    }

    let fetch = client.get(url, per_attempt_timeout);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => AttemptOutcome::Cancelled,
        result = fetch => classify(result),
    }
}

fn classify(result: Result<(u16, Bytes), String>) -> AttemptOutcome {
    match result {
        Err(reason) => AttemptOutcome::TransportError { reason },
        Ok((200, body)) => match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(parsed_json) => AttemptOutcome::Success { body, parsed_json },
            Err(_) => AttemptOutcome::InvalidJson,
        },
        Ok((code, _)) => AttemptOutcome::BadStatus { code },
    }
}
