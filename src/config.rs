//! Runtime configuration, loaded from environment variables with
//! `.env` support via `dotenv`.

use std::time::Duration;

use crate::rules;
use crate::types::AdjustmentKind;

/// All tunables for one [`crate::coordinator::PricingCore`] instance.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub cache_max_size: usize,
    pub cache_validity: Duration,
    pub price_validity: Duration,
    pub fallback_timeout: Duration,
    pub rate_limit_rps: u32,
    pub request_timeout: Duration,
    pub retry_attempts: u32,
    pub circuit_failure_threshold: u32,
    pub circuit_reset_timeout: Duration,
    pub audit_log_capacity: usize,
    /// Order the Rules Engine (C6) applies its adjustment steps in. Defaults
    /// to [`rules::DEFAULT_CHAIN`]; a caller can supply a different ordered
    /// list (e.g. to activate `competitor_adjustment`/`fuel_surcharge`, which
    /// are absent from the default) at start-up.
    pub adjustment_chain: Vec<AdjustmentKind>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            cache_max_size: 10_000,
            cache_validity: Duration::from_secs(15 * 60),
            price_validity: Duration::from_secs(15 * 60),
            fallback_timeout: Duration::from_secs(5),
            rate_limit_rps: 100,
            request_timeout: Duration::from_secs(5),
            retry_attempts: 3,
            circuit_failure_threshold: 3,
            circuit_reset_timeout: Duration::from_secs(10),
            audit_log_capacity: 1_000,
            adjustment_chain: rules::DEFAULT_CHAIN.to_vec(),
        }
    }
}

impl PricingConfig {
    /// Loads configuration from environment variables, falling back to
    /// [`Default::default`] for anything unset or unparsable. Calls
    /// `dotenv::dotenv()` first so a local `.env` file is picked up the
    /// same way it is at the process entry point.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();
        Self {
            cache_max_size: env_usize("PRICING_CACHE_MAX_SIZE", defaults.cache_max_size),
            cache_validity: env_secs("PRICING_CACHE_VALIDITY_SECS", defaults.cache_validity),
            price_validity: env_secs("PRICING_PRICE_VALIDITY_SECS", defaults.price_validity),
            fallback_timeout: env_secs("PRICING_FALLBACK_TIMEOUT_SECS", defaults.fallback_timeout),
            rate_limit_rps: env_u32("PRICING_RATE_LIMIT_RPS", defaults.rate_limit_rps),
            request_timeout: env_secs("PRICING_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            retry_attempts: env_u32("PRICING_RETRY_ATTEMPTS", defaults.retry_attempts),
            circuit_failure_threshold: env_u32(
                "PRICING_CIRCUIT_FAILURE_THRESHOLD",
                defaults.circuit_failure_threshold,
            ),
            circuit_reset_timeout: env_secs(
                "PRICING_CIRCUIT_RESET_TIMEOUT_SECS",
                defaults.circuit_reset_timeout,
            ),
            audit_log_capacity: env_usize("PRICING_AUDIT_LOG_CAPACITY", defaults.audit_log_capacity),
            // No sane flat env-var encoding for an ordered enum list; callers
            // who need a non-default chain construct `PricingConfig`
            // directly and override this field.
            adjustment_chain: defaults.adjustment_chain,
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
