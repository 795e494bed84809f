//! Pricing coordinator (C8): the public entry point composing the cache,
//! rate limiter, circuit breaker registry, upstream client, and fallback
//! ladder into one `price()` call.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info_span, Instrument};

use crate::cache::{CacheLookup, PricingCache};
use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitSnapshot};
use crate::config::PricingConfig;
use crate::error::PricingError;
use crate::fallback::{self, HistoricalSource, NoHistoricalSource};
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::rate_limiter::RateLimiter;
use crate::types::{AdjustmentKind, AuditRecord, PriceSource, PricingRequest, PricingResponse};
use crate::upstream::{UpstreamClient, UpstreamSource, PRIMARY_UPSTREAM};

/// Ties together every component and exposes the request-level and
/// administrative operations.
pub struct PricingCore<S: UpstreamSource, H: HistoricalSource = NoHistoricalSource> {
    cache: PricingCache,
    rate_limiter: RateLimiter,
    breakers: Arc<CircuitBreakerRegistry>,
    upstream: UpstreamClient<S>,
    historical: H,
    metrics: MetricsRegistry,
    adjustment_chain: Vec<AdjustmentKind>,
    config: PricingConfig,
}

impl<S: UpstreamSource> PricingCore<S, NoHistoricalSource> {
    /// Builds a core with no historical data source configured; the T2
    /// fallback tier will always fall through immediately.
    pub fn new(source: S, config: PricingConfig) -> Self {
        Self::with_historical(source, NoHistoricalSource, config)
    }
}

impl<S: UpstreamSource, H: HistoricalSource> PricingCore<S, H> {
    pub fn with_historical(source: S, historical: H, config: PricingConfig) -> Self {
        let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: config.circuit_failure_threshold,
            reset_timeout: config.circuit_reset_timeout,
        }));
        let breaker = breakers.get_or_create(PRIMARY_UPSTREAM);
        let upstream = UpstreamClient::new(
            source,
            breaker,
            crate::upstream::UpstreamConfig {
                request_timeout: config.request_timeout,
                retry_attempts: config.retry_attempts,
            },
        );
        let adjustment_chain = config.adjustment_chain.clone();
        Self {
            cache: PricingCache::new(config.cache_max_size),
            rate_limiter: RateLimiter::new(config.rate_limit_rps),
            breakers,
            upstream,
            historical,
            metrics: MetricsRegistry::new(config.audit_log_capacity),
            adjustment_chain,
            config,
        }
    }

    /// Prices one request end to end:
    /// 1. Structural validation.
    /// 2. Exact-fingerprint cache lookup (hit short-circuits with `source =
    ///    cache`).
    /// 3. Rate-limiter admission.
    /// 4. The fallback ladder (live -> geo-cache -> historical ->
    ///    static-floor -> emergency).
    /// 5. Caching of live-sourced successes only, under both the exact
    ///    fingerprint and the geo-cache key.
    /// 6. An audit record, win or lose.
    pub async fn price(&self, request: &PricingRequest) -> Result<PricingResponse, PricingError> {
        let start = Instant::now();
        self.metrics.record_request();

        let span = info_span!("price_request", request_id = %request.request_id, route = %request.route);
        let result = self.price_inner(request, start).instrument(span).await;

        let latency_ms = start.elapsed().as_millis() as u64;
        self.metrics.record_latency(latency_ms);

        match &result {
            Ok(response) => {
                self.metrics.record_audit(AuditRecord {
                    request_id: request.request_id.clone(),
                    route: request.route.clone(),
                    source: response.source,
                    latency_ms,
                    rules_applied: response.adjustments.iter().filter(|a| a.applied).map(|a| a.kind).collect(),
                    final_fare: response.final_fare,
                    fallback_reason: None,
                    timestamp: response.timestamp,
                });
            }
            Err(err) => {
                self.metrics.record_error(error_kind(err));
                self.metrics.record_audit(AuditRecord {
                    request_id: request.request_id.clone(),
                    route: request.route.clone(),
                    source: PriceSource::Emergency,
                    latency_ms,
                    rules_applied: vec![],
                    final_fare: rust_decimal::Decimal::ZERO,
                    fallback_reason: Some(err.to_string()),
                    timestamp: chrono::Utc::now(),
                });
            }
        }

        result
    }

    async fn price_inner(
        &self,
        request: &PricingRequest,
        start: Instant,
    ) -> Result<PricingResponse, PricingError> {
        request.validate()?;

        let fingerprint = request.fingerprint();
        if let CacheLookup::Hit(mut cached) = self.cache.get(&fingerprint) {
            self.metrics.record_cache_hit();
            if cached.source != PriceSource::Emergency {
                cached.source = PriceSource::Cache;
                cached.confidence_score = PriceSource::Cache.confidence();
                return Ok(cached);
            }
        } else {
            self.metrics.record_cache_miss();
        }

        if !self.rate_limiter.acquire().await {
            return Err(PricingError::RateLimited);
        }

        // The caller's deadline is measured from call entry (`start`), not
        // from here, so the rate-limiter wait above already eats into it.
        let deadline = start + request.deadline();
        let response = fallback::run_ladder(
            request,
            &self.upstream,
            &self.cache,
            &self.historical,
            deadline,
            &self.adjustment_chain,
        )
        .await?;

        match response.source {
            PriceSource::Live => {
                self.metrics.record_live_call();
                self.cache.put(fingerprint, response.clone());
                self.cache.put(fallback::geo_cache_key(request), response.clone());
            }
            other => {
                self.metrics.record_fallback(other);
            }
        }

        Ok(response)
    }

    /// Administrative: a point-in-time snapshot of counters and latency
    /// buckets.
    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Administrative: the retained audit trail, oldest first.
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.metrics.audit_records()
    }

    /// Administrative: evicts every cached response.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Administrative: the named upstream's breaker state, if it has ever
    /// been consulted.
    pub fn get_circuit_state(&self, upstream: &str) -> Option<CircuitSnapshot> {
        self.breakers.snapshot(upstream)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

fn error_kind(err: &PricingError) -> &'static str {
    match err {
        PricingError::InvalidRequest(_) => "invalid_request",
        PricingError::RateLimited => "rate_limited",
        PricingError::CircuitOpen(_) => "circuit_open",
        PricingError::UpstreamUnavailable(_) => "upstream_unavailable",
        PricingError::CacheMiss => "cache_miss",
        PricingError::HistoricalUnavailable => "historical_unavailable",
        PricingError::InvalidBase(_) => "invalid_base",
        PricingError::DeadlineExceeded => "deadline_exceeded",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_request;
    use crate::upstream::UpstreamQuote;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct AlwaysSucceeds;
    #[async_trait]
    impl UpstreamSource for AlwaysSucceeds {
        async fn fetch(&self, _r: &PricingRequest) -> Result<UpstreamQuote, PricingError> {
            Ok(UpstreamQuote { base_fare: dec!(650.00) })
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl UpstreamSource for AlwaysFails {
        async fn fetch(&self, _r: &PricingRequest) -> Result<UpstreamQuote, PricingError> {
            Err(PricingError::UpstreamUnavailable("down".to_string()))
        }
    }

    fn test_config() -> PricingConfig {
        let mut config = PricingConfig::default();
        config.request_timeout = Duration::from_millis(100);
        config.fallback_timeout = Duration::from_secs(5);
        config
    }

    #[tokio::test]
    async fn live_request_is_cached_and_reused() {
        let core = PricingCore::new(AlwaysSucceeds, test_config());
        let request = sample_request();

        let first = core.price(&request).await.unwrap();
        assert_eq!(first.source, PriceSource::Live);

        let second = core.price(&request).await.unwrap();
        assert_eq!(second.source, PriceSource::Cache);
        assert_eq!(second.final_fare, first.final_fare);

        let snapshot = core.get_metrics();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.cache_hits, 1);
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_touching_upstream() {
        let core = PricingCore::new(AlwaysFails, test_config());
        let mut request = sample_request();
        request.passengers = 0;
        let result = core.price(&request).await;
        assert!(matches!(result, Err(PricingError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn collapse_falls_back_and_is_not_cached_under_live_source() {
        let core = PricingCore::new(AlwaysFails, test_config());
        let request = sample_request();
        let response = core.price(&request).await.unwrap();
        assert_ne!(response.source, PriceSource::Live);
        assert_eq!(core.cache_len(), 0);
    }

    #[tokio::test]
    async fn clear_cache_evicts_prior_live_success() {
        let core = PricingCore::new(AlwaysSucceeds, test_config());
        let request = sample_request();
        core.price(&request).await.unwrap();
        assert!(core.cache_len() > 0);
        core.clear_cache();
        assert_eq!(core.cache_len(), 0);
    }

    #[tokio::test]
    async fn custom_adjustment_chain_is_honored_over_the_default() {
        let mut config = test_config();
        // Supply a chain that activates `fuel_surcharge`, which is absent
        // from `rules::DEFAULT_CHAIN`.
        config.adjustment_chain = vec![AdjustmentKind::FuelSurcharge];
        let core = PricingCore::new(AlwaysSucceeds, config);
        let response = core.price(&sample_request()).await.unwrap();
        assert!(response.adjustments.iter().any(|a| a.kind == AdjustmentKind::FuelSurcharge));
        assert!(!response.adjustments.iter().any(|a| a.kind == AdjustmentKind::AdvanceBooking));
    }

    #[tokio::test]
    async fn very_short_deadline_skips_straight_to_fallback() {
        let mut config = test_config();
        config.retry_attempts = 1;
        let core = PricingCore::new(AlwaysSucceeds, config);
        let mut request = sample_request();
        request.deadline_ms = Some(1);
        let response = core.price(&request).await.unwrap();
        assert_ne!(response.source, PriceSource::Live);
    }

    #[tokio::test]
    async fn circuit_state_reflects_repeated_upstream_failures() {
        let mut config = test_config();
        config.circuit_failure_threshold = 1;
        let core = PricingCore::new(AlwaysFails, config);
        let request = sample_request();
        core.price(&request).await.unwrap();
        let snapshot = core.get_circuit_state(PRIMARY_UPSTREAM).unwrap();
        assert_eq!(snapshot.state, crate::circuit_breaker::CircuitState::Open);
    }
}
