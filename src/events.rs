//! Event system for the hedge coordinator.
//!
//! Lifted from `tower-resilience-core`'s `ResilienceEvent` / `EventListener`
//! pair and specialized to the handful of events this application needs. The
//! default listener drains warnings to `./backend_errors.log`, the
//! idiomatic-Rust replacement for the Python reference's
//! `logging.basicConfig(filename='./backend_errors.log', ...)`.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Trait for events emitted during a `SmartRequest`.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    fn event_type(&self) -> &'static str;
    fn timestamp(&self) -> Instant;
}

/// Trait for listening to [`SmartRequestEvent`]s.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// A collection of event listeners, emitting to all of them in order.
#[derive(Clone)]
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits an event to every registered listener. A panicking listener is
    /// caught and logged so it cannot take down the request it is observing.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
            if result.is_err() {
                tracing::warn!(
                    event_type = event.event_type(),
                    "event listener panicked, continuing"
                );
            }
        }
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Events emitted over the lifetime of one `SmartRequest`.
#[derive(Debug, Clone)]
pub enum SmartRequestEvent {
    /// An attempt's HTTP GET resolved with a non-200 status.
    BadStatus { attempt: usize, code: u16 },
    /// An attempt's body did not parse as JSON.
    InvalidJson { attempt: usize },
    /// All three attempts resolved to a non-success outcome.
    AllFailed { last_failure: String },
    /// A client deadline elapsed before any attempt succeeded.
    DeadlineExceeded { deadline_ms: i64 },
    /// Admission was rejected because the in-flight ceiling was met.
    AdmissionRejected { in_flight: usize, ceiling: usize },
}

impl ResilienceEvent for SmartRequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SmartRequestEvent::BadStatus { .. } => "bad_status",
            SmartRequestEvent::InvalidJson { .. } => "invalid_json",
            SmartRequestEvent::AllFailed { .. } => "all_failed",
            SmartRequestEvent::DeadlineExceeded { .. } => "deadline_exceeded",
            SmartRequestEvent::AdmissionRejected { .. } => "admission_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        Instant::now()
    }
}

/// Listener that forwards every event to `tracing::warn!`, which the process
/// wires (via `tracing-appender`) onto `./backend_errors.log`.
pub struct TracingWarnListener;

impl EventListener<SmartRequestEvent> for TracingWarnListener {
    fn on_event(&self, event: &SmartRequestEvent) {
        match event {
            SmartRequestEvent::BadStatus { attempt, code } => {
                tracing::warn!(attempt, code, "service returned a non-200 HTTP status");
            }
            SmartRequestEvent::InvalidJson { attempt } => {
                tracing::warn!(attempt, "service returned an invalid JSON body");
            }
            SmartRequestEvent::AllFailed { last_failure } => {
                tracing::warn!(last_failure, "all hedged attempts failed");
            }
            SmartRequestEvent::DeadlineExceeded { deadline_ms } => {
                tracing::warn!(
                    deadline_ms,
                    "no successful response within timeout ({} ms)",
                    deadline_ms
                );
            }
            SmartRequestEvent::AdmissionRejected { in_flight, ceiling } => {
                tracing::warn!(in_flight, ceiling, "admission ceiling exceeded, rejecting");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener(Arc<AtomicUsize>);

    impl EventListener<SmartRequestEvent> for CountingListener {
        fn on_event(&self, _event: &SmartRequestEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn emits_to_all_listeners() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut listeners = EventListeners::new();
        listeners.add(CountingListener(Arc::clone(&count)));
        listeners.add(CountingListener(Arc::clone(&count)));

        listeners.emit(&SmartRequestEvent::InvalidJson { attempt: 0 });

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        struct PanicsListener;
        impl EventListener<SmartRequestEvent> for PanicsListener {
            fn on_event(&self, _event: &SmartRequestEvent) {
                panic!("boom");
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let mut listeners = EventListeners::new();
        listeners.add(PanicsListener);
        listeners.add(CountingListener(Arc::clone(&count)));

        listeners.emit(&SmartRequestEvent::BadStatus {
            attempt: 1,
            code: 500,
        });

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
