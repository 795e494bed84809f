//! End-to-end scenarios against the public `PricingCore` entry point, using
//! fake upstream/historical sources so nothing here touches the network.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use pricing_core::config::PricingConfig;
use pricing_core::coordinator::PricingCore;
use pricing_core::error::PricingError;
use pricing_core::fallback::NoHistoricalSource;
use pricing_core::types::{
    BookingChannel, FareClass, LoyaltyTier, MarketData, PriceSource, PricingRequest,
};
use pricing_core::upstream::{UpstreamQuote, UpstreamSource};
use rust_decimal_macros::dec;

fn request(route: &str, origin: &str, destination: &str) -> PricingRequest {
    PricingRequest {
        route: route.to_string(),
        origin: origin.to_string(),
        destination: destination.to_string(),
        departure_date: (Utc::now() + chrono::Duration::days(90)).date_naive(),
        return_date: None,
        passengers: 1,
        class: FareClass::Economy,
        customer_id: None,
        corporate_id: None,
        loyalty_tier: LoyaltyTier::None,
        booking_channel: BookingChannel::Web,
        market_data: MarketData {
            demand_level: Some(dec!(0.5)),
            season_factor: Some(dec!(1.0)),
            competitor_avg: None,
        },
        request_id: "integration-1".to_string(),
        timestamp: Utc::now(),
        deadline_ms: None,
    }
}

struct AlwaysSucceeds(rust_decimal::Decimal);
#[async_trait]
impl UpstreamSource for AlwaysSucceeds {
    async fn fetch(&self, _r: &PricingRequest) -> Result<UpstreamQuote, PricingError> {
        Ok(UpstreamQuote { base_fare: self.0 })
    }
}

struct AlwaysFails;
#[async_trait]
impl UpstreamSource for AlwaysFails {
    async fn fetch(&self, _r: &PricingRequest) -> Result<UpstreamQuote, PricingError> {
        Err(PricingError::UpstreamUnavailable("simulated outage".to_string()))
    }
}

/// Fails the first `n` calls, then succeeds forever after — used to drive a
/// circuit breaker open and later let it recover via a fresh core.
struct FailsNTimes {
    remaining: AtomicU32,
}
#[async_trait]
impl UpstreamSource for FailsNTimes {
    async fn fetch(&self, _r: &PricingRequest) -> Result<UpstreamQuote, PricingError> {
        if self.remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
            Err(PricingError::UpstreamUnavailable("simulated outage".to_string()))
        } else {
            Ok(UpstreamQuote { base_fare: dec!(650.00) })
        }
    }
}

fn quick_config() -> PricingConfig {
    let mut config = PricingConfig::default();
    config.request_timeout = Duration::from_millis(100);
    config.fallback_timeout = Duration::from_secs(5);
    config
}

#[tokio::test]
async fn happy_path_live_quote_is_priced_and_returned() {
    let core = PricingCore::new(AlwaysSucceeds(dec!(650.00)), quick_config());
    let response = core.price(&request("NYC-LON", "NYC", "LON")).await.unwrap();
    assert_eq!(response.source, PriceSource::Live);
    assert_eq!(response.final_fare, dec!(552.50)); // early-booking discount only
}

#[tokio::test]
async fn second_identical_request_hits_the_cache() {
    let core = PricingCore::new(AlwaysSucceeds(dec!(650.00)), quick_config());
    let req = request("NYC-LON", "NYC", "LON");
    let first = core.price(&req).await.unwrap();
    let second = core.price(&req).await.unwrap();
    assert_eq!(first.source, PriceSource::Live);
    assert_eq!(second.source, PriceSource::Cache);
    assert_eq!(first.final_fare, second.final_fare);
}

#[tokio::test]
async fn circuit_open_after_repeated_failures_falls_back() {
    let mut config = quick_config();
    config.circuit_failure_threshold = 2;
    config.retry_attempts = 1;
    let core = PricingCore::new(AlwaysFails, config);
    let req = request("NYC-LON", "NYC", "LON");

    for _ in 0..2 {
        let response = core.price(&req).await.unwrap();
        assert_ne!(response.source, PriceSource::Live);
    }

    let breaker_state = core.get_circuit_state(pricing_core::upstream::PRIMARY_UPSTREAM).unwrap();
    assert_eq!(breaker_state.state, pricing_core::circuit_breaker::CircuitState::Open);
}

#[tokio::test]
async fn total_collapse_falls_all_the_way_to_the_static_floor() {
    // Every upstream attempt fails and no historical/geo-cache data exists,
    // so the ladder bottoms out at the static floor tier (the emergency
    // tier is only reached when even that fails, which can't happen for a
    // route with a positive base fare).
    let mut config = quick_config();
    config.retry_attempts = 1;
    let core = PricingCore::new(AlwaysFails, config);
    let response = core.price(&request("ZZZ-YYY", "ZZZ", "YYY")).await.unwrap();
    assert_eq!(response.source, PriceSource::StaticFloor);
    assert!(response.final_fare > rust_decimal::Decimal::ZERO);
}

#[tokio::test]
async fn demand_and_class_adjustments_stack_against_a_live_quote() {
    let core = PricingCore::new(AlwaysSucceeds(dec!(650.00)), quick_config());
    let mut req = request("NYC-LON", "NYC", "LON");
    req.class = FareClass::Business;
    req.market_data.demand_level = Some(dec!(0.85));

    let response = core.price(&req).await.unwrap();
    assert_eq!(response.source, PriceSource::Live);
    assert!(response.final_fare > dec!(650.00));
    assert!(response.adjustments.iter().any(|a| a.kind == pricing_core::AdjustmentKind::ClassMultiplier));
    assert!(response.adjustments.iter().any(|a| a.kind == pricing_core::AdjustmentKind::DemandSurge));
}

#[tokio::test]
async fn rate_limiter_rejects_excess_concurrent_demand() {
    let mut config = quick_config();
    config.rate_limit_rps = 1;
    let core = PricingCore::new(AlwaysSucceeds(dec!(650.00)), config);

    // Five requests racing for a 1-token-per-second bucket: at most two can
    // plausibly clear the bounded 1s wait, so at least one must be
    // rejected regardless of scheduling order.
    let (r1, r2, r3, r4, r5) = tokio::join!(
        core.price(&request("NYC-LON", "NYC", "LON")),
        core.price(&request("NYC-PAR", "NYC", "PAR")),
        core.price(&request("LAX-TOK", "LAX", "TOK")),
        core.price(&request("SFO-SIN", "SFO", "SIN")),
        core.price(&request("ORD-FRA", "ORD", "FRA")),
    );
    let results = [r1, r2, r3, r4, r5];
    assert!(results.iter().any(|r| matches!(r, Err(PricingError::RateLimited))));
}

#[tokio::test]
async fn recovers_to_live_after_the_circuit_half_opens() {
    let mut config = quick_config();
    config.circuit_failure_threshold = 1;
    config.circuit_reset_timeout = Duration::from_millis(20);
    config.retry_attempts = 1;
    let core = PricingCore::with_historical(
        FailsNTimes { remaining: AtomicU32::new(1) },
        NoHistoricalSource,
        config,
    );

    let fallback_response = core.price(&request("NYC-LON", "NYC", "LON")).await.unwrap();
    assert_ne!(fallback_response.source, PriceSource::Live);

    tokio::time::sleep(Duration::from_millis(30)).await;

    let recovered = core.price(&request("NYC-LON", "NYC", "LON")).await.unwrap();
    assert_eq!(recovered.source, PriceSource::Live);
}
