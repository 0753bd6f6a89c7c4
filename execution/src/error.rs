//! Order execution errors (spec §4.3, §7).
//!
//! The taxonomy mirrors the teacher's `Executor` error handling (a plain
//! `anyhow::Result` at the trait boundary) but gives the retry loop a typed
//! classification to act on: `RateLimited`/`Transient` retry with backoff,
//! `MarginInsufficient`/`ReduceOnlyViolation`/`PrecisionError` do not.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("insufficient margin: {0}")]
    MarginInsufficient(String),

    #[error("reduce-only violation: {0}")]
    ReduceOnlyViolation(String),

    #[error("precision/rounding rejected order: {0}")]
    PrecisionError(String),

    #[error("transient exchange error: {0}")]
    Transient(String),

    #[error("permanent exchange error: {0}")]
    Permanent(String),
}

impl ExecError {
    /// Whether the retry loop should back off and try again, per spec §7.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecError::RateLimited(_) | ExecError::Transient(_))
    }
}
