//! Fallback ladder (C7): live -> geo-cache -> historical -> static-floor ->
//! emergency, each tier with its own timeout and confidence score.
//!
//! The first tier to produce a base fare wins; its value is run through the
//! Rules Engine (C6) to produce a full response. Lower tiers are never
//! attempted once one succeeds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::cache::{CacheLookup, PricingCache};
use crate::constants;
use crate::error::PricingError;
use crate::rules;
use crate::types::{AdjustmentKind, PricingRequest, PricingResponse, PriceSource};
use crate::upstream::{UpstreamClient, UpstreamSource};

/// Per-tier timeouts.
pub const T0_LIVE_TIMEOUT: Duration = Duration::from_secs(5);
pub const T1_GEO_CACHE_TIMEOUT: Duration = Duration::from_secs(1);
pub const T2_HISTORICAL_TIMEOUT: Duration = Duration::from_secs(3);
pub const T3_STATIC_FLOOR_TIMEOUT: Duration = Duration::from_millis(500);
pub const T4_EMERGENCY_TIMEOUT: Duration = Duration::from_millis(100);

/// Looks up a 7-day historical moving average for a route. External
/// collaborator (read-only historical data store); the pricing core only
/// consumes it.
#[async_trait::async_trait]
pub trait HistoricalSource: Send + Sync {
    async fn seven_day_average(&self, route: &str) -> Option<Decimal>;
}

/// A historical source with nothing to report; used when no historical
/// store is configured. Always yields [`PricingError::HistoricalUnavailable`].
pub struct NoHistoricalSource;

#[async_trait::async_trait]
impl HistoricalSource for NoHistoricalSource {
    async fn seven_day_average(&self, _route: &str) -> Option<Decimal> {
        None
    }
}

/// Walks the fallback ladder for one request, given that the live tier
/// either wasn't attempted (no time budget left) or failed upstream.
///
/// `deadline` is the absolute instant this call must resolve by (the
/// caller-supplied deadline, default 10 s, per spec.md §5 "Cancellation &
/// timeouts" — never the same budget as [`T0_LIVE_TIMEOUT`]). Each tier with
/// its own network/IO cost is only attempted if enough of that budget
/// remains *at the moment it would run* to cover its own timeout; otherwise
/// the ladder short-circuits straight past it. `chain` is the ordered
/// adjustment chain each tier's raw value is run through (pass
/// [`rules::DEFAULT_CHAIN`] for the standard order).
///
/// Returns the winning tier's finalized response. The T4 emergency tier
/// never fails, so this function is infallible in practice — it returns
/// `Result` only to share the tier-attempt plumbing's error type.
pub async fn run_ladder<S: UpstreamSource, H: HistoricalSource>(
    request: &PricingRequest,
    upstream: &UpstreamClient<S>,
    cache: &PricingCache,
    historical: &H,
    deadline: Instant,
    chain: &[AdjustmentKind],
) -> Result<PricingResponse, PricingError> {
    let remaining = || deadline.saturating_duration_since(Instant::now());
    let emergency = || {
        rules::price_from_base(
            request,
            constants::EMERGENCY_FALLBACK_FARE,
            PriceSource::Emergency,
            chain,
        )
    };

    if remaining().is_zero() {
        warn!(
            error = %PricingError::DeadlineExceeded,
            "deadline already exceeded before the ladder started, jumping to the emergency tier"
        );
        return emergency();
    }

    // T0: live. Only attempted if the full live timeout still fits inside
    // what's left of the caller's deadline.
    if remaining() >= T0_LIVE_TIMEOUT {
        match tokio::time::timeout(T0_LIVE_TIMEOUT, upstream.fetch(request)).await {
            Ok(Ok(quote)) => {
                if let Ok(response) =
                    rules::price_from_base(request, quote.base_fare, PriceSource::Live, chain)
                {
                    return Ok(response);
                }
                // An invalid base fare at this tier advances the ladder
                // rather than aborting it outright.
            }
            Ok(Err(err)) => {
                warn!(error = %err, "live tier failed, falling back");
            }
            Err(_elapsed) => {
                warn!("live tier timed out, falling back");
            }
        }
    } else {
        warn!(
            error = %PricingError::DeadlineExceeded,
            remaining_ms = remaining().as_millis() as u64,
            "skipping live tier: insufficient deadline budget"
        );
    }

    if remaining().is_zero() {
        warn!(error = %PricingError::DeadlineExceeded, "deadline exceeded after the live tier, jumping to the emergency tier");
        return emergency();
    }

    // T1: geo-cache, keyed by origin region. A plain in-memory lookup, never
    // itself a source of delay, so it runs whenever any budget remains at
    // all.
    let geo_key = geo_cache_key(request);
    if let CacheLookup::Hit(cached) = cache.get(&geo_key) {
        if let Ok(response) =
            rules::price_from_base(request, cached.base_fare, PriceSource::Cache, chain)
        {
            return Ok(response);
        }
    }
    // Also check the exact-fingerprint cache: a prior live success for this
    // exact request still counts as a T1-reachable value once the circuit
    // has tripped.
    if let CacheLookup::Hit(cached) = cache.get(&request.fingerprint()) {
        if let Ok(response) =
            rules::price_from_base(request, cached.base_fare, PriceSource::Cache, chain)
        {
            return Ok(response);
        }
    }

    // T2: historical moving average, with a 1.15x markup. Only attempted if
    // its own timeout still fits inside what's left of the deadline.
    if remaining() >= T2_HISTORICAL_TIMEOUT {
        match tokio::time::timeout(
            T2_HISTORICAL_TIMEOUT,
            historical.seven_day_average(&request.route),
        )
        .await
        {
            Ok(Some(avg)) => {
                let base = avg * Decimal::new(115, 2);
                if let Ok(response) =
                    rules::price_from_base(request, base, PriceSource::Historical, chain)
                {
                    return Ok(response);
                }
            }
            Ok(None) => {
                info!("historical tier had no data, falling back");
            }
            Err(_elapsed) => {
                warn!("historical tier timed out, falling back");
            }
        }
    } else {
        warn!(
            error = %PricingError::DeadlineExceeded,
            remaining_ms = remaining().as_millis() as u64,
            "skipping historical tier: insufficient deadline budget"
        );
    }

    // T3: static floor, route base * 1.05. A pure computation with no I/O,
    // so (like T1) it runs regardless of how little budget is left.
    let static_base = constants::route_base_fare(&request.route) * Decimal::new(105, 2);
    if let Ok(response) =
        rules::price_from_base(request, static_base, PriceSource::StaticFloor, chain)
    {
        return Ok(response);
    }

    // T4: emergency. Infallible by construction (EMERGENCY_FALLBACK_FARE is
    // a positive constant), so `price_from_base` cannot return
    // `ErrInvalidBase` here. Runs unconditionally, deadline or not — it
    // never fails.
    emergency()
}

/// Computes the geo-cache key for a request, so a later request for a
/// different exact route sharing the same origin region can still hit the
/// geo-cache tier. Exposed so the coordinator can prime the geo-cache on a
/// live success.
pub fn geo_cache_key(request: &PricingRequest) -> String {
    format!("geo|{}|{}", request.origin_region(), request.route)
}
