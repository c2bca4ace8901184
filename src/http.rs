//! HTTP front-end: route parsing, admission, and response rendering.
//!
//! Grounded on `examples/axum-resilient-kv-store/src/main.rs` (`AppState`,
//! `Router::new().route(...).with_state(state)`, a `/health` liveness probe)
//! and `original_source/runserver.py` (the `/api/smart` / `/api/smart/{timeout}`
//! route table).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::admission::AdmissionGate;
use crate::config::AppConfig;
use crate::coordinator::{HedgeCoordinator, SmartRequest};
use crate::error::CoordinatorError;
use crate::events::{EventListeners, SmartRequestEvent, TracingWarnListener};

#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    admission: AdmissionGate,
    coordinator: Arc<HedgeCoordinator>,
    admission_listeners: Arc<EventListeners<SmartRequestEvent>>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, coordinator: HedgeCoordinator) -> Self {
        let admission = AdmissionGate::new(config.admission_ceiling);
        let mut admission_listeners = EventListeners::new();
        admission_listeners.add(TracingWarnListener);
        Self {
            config,
            admission,
            coordinator: Arc::new(coordinator),
            admission_listeners: Arc::new(admission_listeners),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/smart", get(handle_smart_query))
        .route("/api/smart/:timeout", get(handle_smart_path))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Deserialize)]
struct SmartQuery {
    timeout: Option<String>,
}

/// `GET /api/smart[?timeout=<ms>]` — deadline read from the query string.
async fn handle_smart_query(
    State(state): State<AppState>,
    Query(query): Query<SmartQuery>,
) -> Response {
    let deadline_ms = match parse_deadline(query.timeout.as_deref()) {
        Ok(d) => d,
        Err(e) => return e.into_response(),
    };
    handle_smart(state, deadline_ms).await
}

/// `GET /api/smart/<ms>` — deadline read from the path, in milliseconds.
///
/// Both the path and query forms are interpreted uniformly as milliseconds.
/// The Python reference only divided the path value by 1000; that asymmetry
/// is not reproduced here.
async fn handle_smart_path(
    State(state): State<AppState>,
    Path(timeout): Path<String>,
) -> Response {
    let deadline_ms = match parse_deadline(Some(&timeout)) {
        Ok(d) => d,
        Err(e) => return e.into_response(),
    };
    handle_smart(state, deadline_ms).await
}

fn parse_deadline(raw: Option<&str>) -> Result<Option<i64>, CoordinatorError> {
    match raw {
        None => Ok(None),
        Some(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| CoordinatorError::MalformedDeadline(s.to_string())),
    }
}

async fn handle_smart(state: AppState, deadline_ms: Option<i64>) -> Response {
    let Some(permit) = state.admission.try_admit() else {
        state
            .admission_listeners
            .emit(&SmartRequestEvent::AdmissionRejected {
                in_flight: state.admission.in_flight(),
                ceiling: state.admission.ceiling(),
            });
        return CoordinatorError::AdmissionRejected.into_response();
    };

    let result = state
        .coordinator
        .run(SmartRequest {
            upstream_url: state.config.upstream_url.clone(),
            deadline_ms,
        })
        .await;

    // Released exactly once, including on every early return above, by
    // AdmissionPermit's Drop impl.
    drop(permit);

    match result {
        Ok(outcome) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            outcome.body,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        r#"{"status":"alive"}"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_deadline_accepts_absent_value() {
        assert_eq!(parse_deadline(None).unwrap(), None);
    }

    #[test]
    fn parse_deadline_accepts_numeric_value() {
        assert_eq!(parse_deadline(Some("200")).unwrap(), Some(200));
    }

    #[test]
    fn parse_deadline_accepts_negative_value() {
        assert_eq!(parse_deadline(Some("-1")).unwrap(), Some(-1));
    }

    #[test]
    fn parse_deadline_rejects_malformed_value() {
        assert!(matches!(
            parse_deadline(Some("not-a-number")),
            Err(CoordinatorError::MalformedDeadline(_))
        ));
    }
}
