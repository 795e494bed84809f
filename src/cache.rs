//! Pricing cache (C2): a thread-safe fingerprint -> response map with TTL
//! expiry and bounded size.
//!
//! Backed by `parking_lot::RwLock`, a good fit for short critical sections.
//! `get` never blocks on a write; it only upgrades to a write lock when it
//! needs to evict an expired entry, so only one writer ever touches a given
//! key's expiry without serializing every read behind every write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::constants::CACHE_VALIDITY_MINUTES;
use crate::types::{CacheEntry, PricingResponse};

/// Outcome of a [`PricingCache::get`] call.
pub enum CacheLookup {
    Hit(PricingResponse),
    Miss,
}

/// Thread-safe pricing cache with TTL expiry and LRU-by-`createdAt`
/// eviction under size pressure.
pub struct PricingCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PricingCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_size,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns the live value if present and unexpired; otherwise removes
    /// the (possibly expired) entry and reports a miss. Never fails.
    pub fn get(&self, key: &str) -> CacheLookup {
        let now = Utc::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return CacheLookup::Hit(entry.value.clone());
                }
                Some(_) => { /* expired: fall through to the write path below */ }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return CacheLookup::Miss;
                }
            }
        }
        // Expired entry: take the write lock and remove it under the writer
        // discipline so no reader can observe a stale snapshot mid-removal.
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(key) {
            if entry.expires_at <= now {
                entries.remove(key);
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        CacheLookup::Miss
    }

    /// Inserts `response` under `key` with the default TTL, evicting the
    /// oldest-by-`createdAt` entry if this insert would exceed `max_size`.
    pub fn put(&self, key: String, response: PricingResponse) {
        let now = Utc::now();
        let entry = CacheEntry {
            value: response,
            created_at: now,
            expires_at: now + Duration::minutes(CACHE_VALIDITY_MINUTES),
        };

        let mut entries = self.entries.write();
        entries.insert(key, entry);

        if entries.len() > self.max_size {
            if let Some(oldest_key) = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest_key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.write().remove(key);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}
