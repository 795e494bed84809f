//! Dynamic pricing core: computes a fare for one route/class/passenger
//! context by layering market-driven adjustments over a base fare, with a
//! graceful degradation path when the live pricing data source is slow,
//! down, or circuit-broken.
//!
//! The public entry point is [`coordinator::PricingCore`]; everything else
//! is a component it composes.

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod fallback;
pub mod metrics;
pub mod rate_limiter;
pub mod rules;
pub mod types;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_support;

pub use coordinator::PricingCore;
pub use error::{PricingError, PricingResult};
pub use types::{
    AdjustmentKind, BookingChannel, FareClass, LoyaltyTier, MarketData, PriceAdjustment,
    PriceBreakdown, PriceSource, PricingRequest, PricingResponse,
};
