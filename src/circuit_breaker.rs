//! Per-upstream circuit breaker (C3): closed/open/half-open state machine
//! guarding calls to an external pricing data source.
//!
//! The whole transition table is evaluated as a single critical section per
//! call, guarded by one `parking_lot::Mutex` per upstream — small enough
//! that serializing it entirely is cheaper (and far simpler to reason about)
//! than a lock-free state machine would be.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Observable state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Snapshot returned by [`CircuitBreaker::snapshot`] / the `getCircuitState`
/// administrative operation.
#[derive(Debug, Clone)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<Instant>,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_permits: u32,
}

/// Configuration for a breaker instance.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(10),
        }
    }
}

/// A single named upstream's breaker.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

/// Whether a call may currently proceed to the upstream.
pub enum Admission {
    Proceed,
    /// Circuit is open (or half-open with no permits left); short-circuit.
    Rejected,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_permits: 0,
            }),
        }
    }

    /// Call before attempting the upstream. Transitions Open -> HalfOpen
    /// once `reset_timeout` has elapsed, and reserves the single half-open
    /// permit atomically so concurrent callers can't both slip through.
    pub fn try_admit(&self) -> Admission {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Admission::Proceed,
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
                if elapsed >= self.config.reset_timeout {
                    // Transition and immediately consume the single
                    // half-open permit on behalf of this caller so no
                    // concurrent caller can also slip through.
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_permits = 0;
                    Admission::Proceed
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_permits > 0 {
                    inner.half_open_permits -= 1;
                    Admission::Proceed
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    /// Record a successful upstream call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.half_open_permits = 0;
    }

    /// Record a failed upstream call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_permits = 0;
            }
            CircuitState::Open => {
                // Already open; nothing to do.
            }
        }
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        CircuitSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            opened_at: inner.opened_at,
        }
    }
}

/// Registry of breakers keyed by upstream name, one breaker per named
/// upstream. The primary live pricing data source is registered under
/// `"pricing_service_primary"`.
pub struct CircuitBreakerRegistry {
    breakers: Mutex<HashMap<String, std::sync::Arc<CircuitBreaker>>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn get_or_create(&self, upstream: &str) -> std::sync::Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(upstream.to_string())
            .or_insert_with(|| std::sync::Arc::new(CircuitBreaker::new(self.config)))
            .clone()
    }

    pub fn snapshot(&self, upstream: &str) -> Option<CircuitSnapshot> {
        self.breakers.lock().get(upstream).map(|b| b.snapshot())
    }
}
