//! Error types surfaced by the coordinator, admission gate, and config loader.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Failure kinds produced by a single fetch attempt.
///
/// These never cross the fetcher's boundary as a `Result::Err`; they are
/// always folded into an [`crate::coordinator::AttemptOutcome`] instead. The
/// type exists so the reason can still be logged and compared in tests.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("upstream returned HTTP status {0}")]
    BadStatus(u16),
    #[error("upstream body did not parse as JSON")]
    InvalidJson,
    #[error("transport error contacting upstream: {0}")]
    Transport(String),
}

/// Outcome of a whole `SmartRequest`, surfaced to the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// The admission gate rejected the request; the ceiling is already met.
    #[error("admission ceiling exceeded")]
    AdmissionRejected,

    /// The client-supplied deadline elapsed before any attempt succeeded.
    #[error("no successful response within timeout ({deadline_ms} ms)")]
    DeadlineExceeded { deadline_ms: i64 },

    /// All three attempts resolved to a non-success outcome.
    #[error("all hedged attempts failed")]
    AllAttemptsFailed,

    /// The `timeout` path or query parameter could not be parsed.
    #[error("malformed deadline value: {0}")]
    MalformedDeadline(String),

    /// The process has no upstream URL configured.
    #[error("no upstream url configured")]
    UpstreamUnconfigured,
}

impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoordinatorError::AdmissionRejected => StatusCode::TOO_MANY_REQUESTS,
            CoordinatorError::DeadlineExceeded { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CoordinatorError::AllAttemptsFailed => StatusCode::INTERNAL_SERVER_ERROR,
            CoordinatorError::MalformedDeadline(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::UpstreamUnconfigured => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Fatal startup errors. Anything other than these and a bind failure is
/// non-fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no upstream url configured: set REMOTE_URL or pass it positionally")]
    MissingUpstreamUrl,
}
