//! Scripted/random mock upstream used by integration tests and local manual
//! testing, standing in for the real JSON service.
//!
//! Grounded on `original_source/tools/mockserver.py`: `GET /` serves the next
//! queued `(body, status, delay_ms)` triple if a scenario is loaded, else a
//! random response (including the occasional 10s-delayed connection drop);
//! `GET /requests` returns the elapsed-time log of every `GET /` call since
//! the scenario was last set; `POST /setscenario` replaces the queue and
//! resets the clock. Translated onto `axum` rather than `aiohttp` to match
//! the rest of this workspace's stack.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Clone, Debug, Deserialize)]
struct ScenarioStep {
    body: String,
    status: u16,
    delay_ms: u64,
}

struct MockState {
    scenario: Mutex<std::collections::VecDeque<ScenarioStep>>,
    requests: Mutex<Vec<f64>>,
    start: Mutex<Instant>,
    served: AtomicU64,
}

impl MockState {
    fn new() -> Self {
        Self {
            scenario: Mutex::new(std::collections::VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            start: Mutex::new(Instant::now()),
            served: AtomicU64::new(0),
        }
    }
}

#[derive(Parser)]
#[command(about = "Scripted mock upstream for hedge-proxy integration tests")]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let state = Arc::new(MockState::new());

    let router = Router::new()
        .route("/", get(handle_get))
        .route("/requests", get(handle_requests))
        .route("/setscenario", post(handle_set_scenario))
        .with_state(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));
    tracing::info!("mock upstream listening on http://{addr}");

    axum::serve(listener, router).await.expect("server error");
}

/// Serves the next scripted step, or a randomly generated response when no
/// scenario is loaded: 70% valid 200 JSON, 10% 200 with malformed JSON, 10%
/// non-200 with a body, 10% a connection that hangs for 10s then drops.
async fn handle_get(State(state): State<Arc<MockState>>) -> Response {
    let step = state.scenario.lock().unwrap().pop_front();

    let (body, status, delay) = match step {
        Some(step) => (step.body, step.status, Duration::from_millis(step.delay_ms)),
        None => random_step(),
    };

    let elapsed = state.start.lock().unwrap().elapsed().as_secs_f64();
    state.requests.lock().unwrap().push(elapsed);
    state.served.fetch_add(1, Ordering::SeqCst);

    tokio::time::sleep(delay).await;

    if status == 0 {
        // Mirrors the Python reference's "connection never completes" mode:
        // no response is ever produced for this request.
        std::future::pending::<()>().await;
        unreachable!();
    }

    match StatusCode::from_u16(status) {
        Ok(code) if code == StatusCode::OK => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Ok(code) => (code, body).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

fn random_step() -> (String, u16, Duration) {
    let mut rng = rand::rng();
    let delay_ms = rng.random_range(100..=600);
    let mode = rng.random_range(0..=10);

    if mode > 9 {
        (String::new(), 0, Duration::from_millis(10_000))
    } else if mode > 8 {
        ("Not a valid JSON".to_string(), 200, Duration::from_millis(delay_ms))
    } else if mode > 7 {
        ("Not a valid JSON".to_string(), 500, Duration::from_millis(delay_ms))
    } else {
        (
            format!(r#"{{"time": {delay_ms}}}"#),
            200,
            Duration::from_millis(delay_ms),
        )
    }
}

async fn handle_requests(State(state): State<Arc<MockState>>) -> Json<Vec<f64>> {
    Json(state.requests.lock().unwrap().clone())
}

async fn handle_set_scenario(
    State(state): State<Arc<MockState>>,
    Json(steps): Json<Vec<ScenarioStep>>,
) -> impl IntoResponse {
    *state.scenario.lock().unwrap() = steps.into_iter().collect();
    state.requests.lock().unwrap().clear();
    *state.start.lock().unwrap() = Instant::now();
    (StatusCode::OK, "OK")
}
