//! Metrics & audit (C9): in-memory counters exposed via a read-only
//! snapshot, plus a bounded ring buffer of audit records.
//!
//! Hot-path counters are plain `AtomicU64`s — no mutex on the increment
//! path — and are mirrored through the `metrics` crate's macros so an
//! embedding transport can attach a Prometheus exporter without the core
//! blocking on emission.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::types::{AuditRecord, PriceSource};

/// Latency histogram bucket boundaries, in milliseconds.
pub const LATENCY_BUCKETS_MS: [u64; 6] = [10, 50, 100, 200, 500, 1000];

/// A lock-free latency histogram over the fixed bucket set above. Each
/// bucket counts observations `<=` its boundary; the implicit final bucket
/// (index `LATENCY_BUCKETS_MS.len()`) counts everything larger.
#[derive(Default)]
pub struct LatencyHistogram {
    buckets: [AtomicU64; 7],
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, latency_ms: u64) {
        let idx = LATENCY_BUCKETS_MS
            .iter()
            .position(|&b| latency_ms <= b)
            .unwrap_or(LATENCY_BUCKETS_MS.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let mut out = Vec::with_capacity(7);
        for (i, &boundary) in LATENCY_BUCKETS_MS.iter().enumerate() {
            out.push((format!("<={boundary}ms"), self.buckets[i].load(Ordering::Relaxed)));
        }
        out.push(("overflow".to_string(), self.buckets[6].load(Ordering::Relaxed)));
        out
    }
}

/// A read-only snapshot of the core's counters and histograms, returned by
/// the `getMetrics` administrative operation.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub live_calls: u64,
    pub fallback_calls: HashMap<String, u64>,
    pub error_counts: HashMap<String, u64>,
    pub end_to_end_latency_ms: Vec<(String, u64)>,
}

/// Owns all counters and the audit ring buffer. Every update is a single
/// atomic operation or a short `parking_lot::Mutex` critical section (the
/// audit ring buffer push); nothing here ever blocks on I/O.
pub struct MetricsRegistry {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    live_calls: AtomicU64,
    fallback_calls: Mutex<HashMap<String, u64>>,
    error_counts: Mutex<HashMap<String, u64>>,
    end_to_end_latency: LatencyHistogram,
    audit_log: Mutex<VecDeque<AuditRecord>>,
    audit_capacity: usize,
}

impl MetricsRegistry {
    pub fn new(audit_capacity: usize) -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            live_calls: AtomicU64::new(0),
            fallback_calls: Mutex::new(HashMap::new()),
            error_counts: Mutex::new(HashMap::new()),
            end_to_end_latency: LatencyHistogram::new(),
            audit_log: Mutex::new(VecDeque::with_capacity(audit_capacity.min(1024))),
            audit_capacity,
        }
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("pricing_core_requests_total").increment(1);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("pricing_core_cache_hits_total").increment(1);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("pricing_core_cache_misses_total").increment(1);
    }

    pub fn record_live_call(&self) {
        self.live_calls.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("pricing_core_live_calls_total").increment(1);
    }

    pub fn record_fallback(&self, tier: PriceSource) {
        let key = tier_key(tier);
        *self.fallback_calls.lock().entry(key.to_string()).or_insert(0) += 1;
        metrics::counter!("pricing_core_fallback_calls_total", "tier" => key).increment(1);
    }

    pub fn record_error(&self, kind: &str) {
        *self.error_counts.lock().entry(kind.to_string()).or_insert(0) += 1;
        metrics::counter!("pricing_core_errors_total", "kind" => kind.to_string()).increment(1);
    }

    pub fn record_latency(&self, latency_ms: u64) {
        self.end_to_end_latency.record(latency_ms);
        metrics::histogram!("pricing_core_latency_ms").record(latency_ms as f64);
    }

    pub fn record_audit(&self, record: AuditRecord) {
        let mut log = self.audit_log.lock();
        if log.len() >= self.audit_capacity {
            log.pop_front();
        }
        log.push_back(record);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            live_calls: self.live_calls.load(Ordering::Relaxed),
            fallback_calls: self.fallback_calls.lock().clone(),
            error_counts: self.error_counts.lock().clone(),
            end_to_end_latency_ms: self.end_to_end_latency.snapshot(),
        }
    }

    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.audit_log.lock().iter().cloned().collect()
    }
}

fn tier_key(tier: PriceSource) -> &'static str {
    match tier {
        PriceSource::Live => "live",
        PriceSource::Cache => "cache",
        PriceSource::Historical => "historical",
        PriceSource::StaticFloor => "static_floor",
        PriceSource::Emergency => "emergency",
    }
}
