//! Upstream client (C5): issues a pricing request to the external live
//! pricing data source, with timeout, retry, and circuit-breaker
//! integration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::circuit_breaker::{Admission, CircuitBreaker};
use crate::error::PricingError;
use crate::types::PricingRequest;

/// Name the primary live pricing data source is registered under, for the
/// circuit breaker registry and administrative `getCircuitState` calls.
pub const PRIMARY_UPSTREAM: &str = "pricing_service_primary";

/// A provisional base fare from the upstream, before any adjustment chain
/// has run.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamQuote {
    pub base_fare: Decimal,
}

/// Abstraction over the live pricing data source so tests can inject a
/// fake without a network dependency.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    async fn fetch(&self, request: &PricingRequest) -> Result<UpstreamQuote, PricingError>;
}

/// Configuration for [`UpstreamClient`].
#[derive(Debug, Clone, Copy)]
pub struct UpstreamConfig {
    pub request_timeout: Duration,
    pub retry_attempts: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            retry_attempts: 3,
        }
    }
}

/// Wraps an [`UpstreamSource`] with circuit breaker admission, a timeout,
/// and exponential-backoff retry.
pub struct UpstreamClient<S: UpstreamSource> {
    source: S,
    breaker: Arc<CircuitBreaker>,
    config: UpstreamConfig,
}

impl<S: UpstreamSource> UpstreamClient<S> {
    pub fn new(source: S, breaker: Arc<CircuitBreaker>, config: UpstreamConfig) -> Self {
        Self {
            source,
            breaker,
            config,
        }
    }

    /// Attempts to fetch a quote, retrying with `attempt * 1s` backoff, all
    /// routed through the circuit breaker. An open circuit skips the
    /// attempt entirely and returns [`PricingError::CircuitOpen`].
    pub async fn fetch(&self, request: &PricingRequest) -> Result<UpstreamQuote, PricingError> {
        match self.breaker.try_admit() {
            Admission::Rejected => {
                return Err(PricingError::CircuitOpen(PRIMARY_UPSTREAM.to_string()));
            }
            Admission::Proceed => {}
        }

        let mut last_err: Option<PricingError> = None;
        for attempt in 1..=self.config.retry_attempts {
            let attempt_result =
                tokio::time::timeout(self.config.request_timeout, self.source.fetch(request))
                    .await;

            match attempt_result {
                Ok(Ok(quote)) => {
                    self.breaker.record_success();
                    return Ok(quote);
                }
                Ok(Err(err)) => {
                    warn!(attempt, error = %err, "upstream attempt failed");
                    last_err = Some(err);
                }
                Err(_elapsed) => {
                    warn!(attempt, "upstream attempt timed out");
                    last_err = Some(PricingError::UpstreamUnavailable(
                        "request timed out".to_string(),
                    ));
                }
            }

            if attempt < self.config.retry_attempts {
                let backoff = Duration::from_secs(attempt as u64);
                debug!(?backoff, "backing off before next upstream attempt");
                tokio::time::sleep(backoff).await;
            }
        }

        self.breaker.record_failure();
        Err(last_err.unwrap_or_else(|| {
            PricingError::UpstreamUnavailable("all retries exhausted".to_string())
        }))
    }
}
