//! Admission gate: a soft ceiling on concurrently in-flight `SmartRequest`s.
//!
//! Grounded on `original_source/server/classes.py::ServerHandler.handle_smart`,
//! which compares `pending_requests > requests_limit` *before* incrementing.
//! That means the effective ceiling is `ceiling + 1` — preserved here
//! deliberately rather than tightened, and asserted by the tests below
//! rather than left as an undocumented quirk.
//!
//! Adapted from `tower-bulkhead`'s semaphore-counter pattern, but using a
//! plain `AtomicUsize` compare-then-increment instead of a
//! `tokio::sync::Semaphore`: a `Semaphore` queues callers until a permit
//! frees up, whereas this gate must reject outright once the ceiling is met.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared, process-wide in-flight counter.
#[derive(Clone)]
pub struct AdmissionGate {
    inner: Arc<AdmissionGateInner>,
}

struct AdmissionGateInner {
    ceiling: usize,
    in_flight: AtomicUsize,
}

impl AdmissionGate {
    pub fn new(ceiling: usize) -> Self {
        Self {
            inner: Arc::new(AdmissionGateInner {
                ceiling,
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Attempts to admit one request. Returns a guard that decrements the
    /// counter on drop (including on every early-return error path), or
    /// `None` if the counter was already strictly greater than the ceiling.
    pub fn try_admit(&self) -> Option<AdmissionPermit> {
        let current = self.inner.in_flight.load(Ordering::SeqCst);
        if current > self.inner.ceiling {
            return None;
        }
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(AdmissionPermit {
            inner: Arc::clone(&self.inner),
        })
    }

    pub fn ceiling(&self) -> usize {
        self.inner.ceiling
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }
}

/// RAII admission permit. Dropping it — on success, on error, or on panic
/// unwind — releases the slot exactly once, the idiomatic-Rust replacement
/// for the Python reference's decrement at the end of `handle_smart`.
pub struct AdmissionPermit {
    inner: Arc<AdmissionGateInner>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_ceiling_plus_one() {
        let gate = AdmissionGate::new(2);
        let p1 = gate.try_admit();
        let p2 = gate.try_admit();
        let p3 = gate.try_admit();
        let p4 = gate.try_admit();

        assert!(p1.is_some());
        assert!(p2.is_some());
        // in_flight == 2 == ceiling here, 2 > 2 is false, so a third permit
        // is still admitted: the documented ceiling+1 overshoot.
        assert!(p3.is_some());
        // in_flight == 3 > 2, now it rejects.
        assert!(p4.is_none());
    }

    #[test]
    fn dropping_a_permit_frees_a_slot() {
        let gate = AdmissionGate::new(1);
        let p1 = gate.try_admit().unwrap();
        let p2 = gate.try_admit();
        assert!(p2.is_some(), "ceiling+1 overshoot admits the second");
        assert!(gate.try_admit().is_none());

        drop(p1);
        assert!(gate.try_admit().is_some());
        let _ = p2;
    }

    #[test]
    fn counter_returns_to_zero_after_all_permits_drop() {
        let gate = AdmissionGate::new(5);
        {
            let _p1 = gate.try_admit().unwrap();
            let _p2 = gate.try_admit().unwrap();
            assert_eq!(gate.in_flight(), 2);
        }
        assert_eq!(gate.in_flight(), 0);
    }
}
