//! Error taxonomy for the pricing core.
//!
//! Only [`PricingError::InvalidRequest`] and [`PricingError::RateLimited`] are
//! ever surfaced from [`crate::coordinator::PricingCore::price`]; every other
//! variant is handled internally by the fallback ladder and never escapes.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors produced anywhere in the pricing core.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PricingError {
    /// Structural violation of a `PricingRequest` (bad enum, negative
    /// passengers, inconsistent route, etc). Surfaced to the caller.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Admission denied by the rate limiter within its 1 s bound. Surfaced
    /// to the caller.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The named upstream's circuit breaker is open. Internal only; triggers
    /// the fallback ladder.
    #[error("circuit open for upstream {0}")]
    CircuitOpen(String),

    /// The upstream client timed out or exhausted its retries. Internal
    /// only; triggers the fallback ladder.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A tier produced no value (cache miss). Internal only; advances the
    /// ladder.
    #[error("cache miss")]
    CacheMiss,

    /// The historical moving-average tier had no data. Internal only;
    /// advances the ladder.
    #[error("historical data unavailable")]
    HistoricalUnavailable,

    /// A tier returned a non-positive base fare. Internal only; advances the
    /// ladder (never aborts it — see DESIGN.md Open Question 3).
    #[error("invalid base fare: {0}")]
    InvalidBase(Decimal),

    /// The caller-supplied deadline passed before a tier could respond.
    /// Internal only; resolves to the emergency tier.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Result alias used throughout the core.
pub type PricingResult<T> = Result<T, PricingError>;
