//! Resilience patterns reused from the teacher's HFT core: exponential
//! backoff for retrying transient order-submission/network failures.

pub mod backoff;

pub use backoff::{BackoffConfig, ExponentialBackoff};
