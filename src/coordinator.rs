//! The hedged-request coordinator: the core of this repository.
//!
//! Grounded on `tower-resilience-hedge`'s `execute_with_hedging` (the
//! `tokio::select!` race over an `mpsc` channel of `(attempt_index, outcome)`
//! pairs, staggered by per-attempt pre-delay, biased select, cancellation by
//! future-drop) generalized from a race over a generic `tower::Service` to a
//! fixed three-way race over [`UpstreamClient::get`], and on
//! `original_source/server/classes.py`'s `ProcCounter`/`perform_tasks` (the
//! edge-triggered all-failed signal and the deadline race), made explicit
//! here as plain counters owned by the single task draining the channel
//! rather than a separately-signalled `asyncio.Event`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::CoordinatorError;
use crate::events::{EventListeners, SmartRequestEvent};
use crate::fetcher::{fetch_attempt, AttemptOutcome, UpstreamClient};

/// One primary attempt plus two hedges.
const REQUESTED_ATTEMPTS: usize = 3;
/// Pre-delay applied to attempts 2 and 3, relative to coordinator start.
const STAGGER: Duration = Duration::from_millis(300);
const PRE_DELAYS: [Duration; REQUESTED_ATTEMPTS] = [Duration::ZERO, STAGGER, STAGGER];

/// Inputs for one hedged race, derived from the incoming HTTP call.
#[derive(Debug, Clone)]
pub struct SmartRequest {
    pub upstream_url: String,
    /// Absent means "no wall-clock deadline, run until the race resolves".
    /// `Some(ms)` with `ms <= 0` is treated as an already-elapsed deadline.
    pub deadline_ms: Option<i64>,
}

/// The result the front-end renders as a `200 application/json`.
pub struct HedgeOutcome {
    pub body: Bytes,
    #[allow(dead_code)]
    pub parsed_json: serde_json::Value,
}

/// Executes the hedged race for one [`SmartRequest`] against one configured
/// upstream HTTP client.
pub struct HedgeCoordinator {
    client: Arc<dyn UpstreamClient>,
    per_attempt_timeout: Duration,
    listeners: EventListeners<SmartRequestEvent>,
}

impl HedgeCoordinator {
    pub fn new(client: Arc<dyn UpstreamClient>, per_attempt_timeout: Duration) -> Self {
        Self {
            client,
            per_attempt_timeout,
            listeners: EventListeners::new(),
        }
    }

    pub fn with_listener<L>(mut self, listener: L) -> Self
    where
        L: crate::events::EventListener<SmartRequestEvent> + 'static,
    {
        self.listeners.add(listener);
        self
    }

    /// Runs the race to completion. Every spawned attempt is cancelled or
    /// already resolved by the time this returns, regardless of which
    /// branch of the race was taken.
    pub async fn run(&self, request: SmartRequest) -> Result<HedgeOutcome, CoordinatorError> {
        // A non-positive deadline is treated as an immediate expiry.
        // Short-circuit before spawning any attempt so it costs zero
        // upstream GETs.
        if let Some(ms) = request.deadline_ms {
            if ms <= 0 {
                self.listeners
                    .emit(&SmartRequestEvent::DeadlineExceeded { deadline_ms: ms });
                return Err(CoordinatorError::DeadlineExceeded { deadline_ms: ms });
            }
        }

        let (tx, mut rx) = mpsc::channel::<(usize, AttemptOutcome)>(REQUESTED_ATTEMPTS);
        let cancel = CancellationToken::new();

        for (attempt, pre_delay) in PRE_DELAYS.into_iter().enumerate() {
            let client = Arc::clone(&self.client);
            let url = request.upstream_url.clone();
            let per_attempt_timeout = self.per_attempt_timeout;
            let cancel = cancel.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome =
                    fetch_attempt(client.as_ref(), &url, per_attempt_timeout, pre_delay, &cancel)
                        .await;
                // The receiver may already be gone if we raced it to a
                // decision; a dropped send is not an error here.
                let _ = tx.send((attempt, outcome)).await;
            });
        }
        // Drop our own sender so the channel closes once every spawned
        // attempt has sent its one outcome.
        drop(tx);

        let deadline_sleep = async move {
            match request.deadline_ms {
                Some(ms) => tokio::time::sleep(Duration::from_millis(ms as u64)).await,
                None => futures::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline_sleep);

        let mut live = REQUESTED_ATTEMPTS;
        let mut failed = 0usize;
        let mut last_failure: Option<AttemptOutcome> = None;

        let race_result = loop {
            tokio::select! {
                biased;

                maybe_msg = rx.recv() => {
                    let Some((attempt, outcome)) = maybe_msg else {
                        // All senders dropped without a Success: every
                        // attempt resolved Cancelled, which cannot happen
                        // before we ourselves cancel. Treat defensively as
                        // exhaustion.
                        break Err(CoordinatorError::AllAttemptsFailed);
                    };

                    live -= 1;
                    match outcome {
                        AttemptOutcome::Success { .. } => break Ok(outcome),
                        AttemptOutcome::Cancelled => {}
                        AttemptOutcome::BadStatus { code } => {
                            failed += 1;
                            self.listeners
                                .emit(&SmartRequestEvent::BadStatus { attempt, code });
                            last_failure = Some(AttemptOutcome::BadStatus { code });
                        }
                        AttemptOutcome::InvalidJson => {
                            failed += 1;
                            self.listeners
                                .emit(&SmartRequestEvent::InvalidJson { attempt });
                            last_failure = Some(AttemptOutcome::InvalidJson);
                        }
                        AttemptOutcome::TransportError { reason } => {
                            failed += 1;
                            last_failure = Some(AttemptOutcome::TransportError { reason });
                        }
                    }

                    // Edge-triggered "no more hope" signal: every attempt
                    // has failed, or every attempt has resolved one way or
                    // another with none a success.
                    if failed >= REQUESTED_ATTEMPTS || live == 0 {
                        break Err(CoordinatorError::AllAttemptsFailed);
                    }
                }

                _ = &mut deadline_sleep => {
                    let deadline_ms = request.deadline_ms.unwrap_or_default();
                    self.listeners
                        .emit(&SmartRequestEvent::DeadlineExceeded { deadline_ms });
                    break Err(CoordinatorError::DeadlineExceeded { deadline_ms });
                }
            }
        };

        // Cancel every attempt not yet done; do not wait for them to drain.
        cancel.cancel();

        match race_result {
            Ok(AttemptOutcome::Success { body, parsed_json }) => {
                Ok(HedgeOutcome { body, parsed_json })
            }
            Ok(_) => unreachable!("only Success breaks the loop with Ok"),
            Err(CoordinatorError::AllAttemptsFailed) => {
                let last_failure = last_failure
                    .as_ref()
                    .map(AttemptOutcome::describe)
                    .unwrap_or_else(|| "no attempt resolved".to_string());
                self.listeners
                    .emit(&SmartRequestEvent::AllFailed { last_failure });
                Err(CoordinatorError::AllAttemptsFailed)
            }
            Err(other) => Err(other),
        }
    }
}
