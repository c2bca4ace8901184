//! Hedged-request front-end for a flaky upstream JSON service.
//!
//! For each client request this wraps one upstream GET in up to three
//! staggered hedged attempts, returns the first response that is both HTTP
//! 200 and valid JSON, and honors a per-request deadline supplied by the
//! caller.

pub mod admission;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod http;
