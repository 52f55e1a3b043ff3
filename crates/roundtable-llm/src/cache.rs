//! Response cache
//!
//! Maps a call fingerprint to a previously obtained result. Entries expire
//! after a TTL (checked lazily on lookup) and the oldest-inserted entry is
//! evicted first when the cache is full, keeping eviction O(1) amortized.

use crate::provider::ModelCallResult;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use tracing::debug;

/// One cached result with its insertion time
#[derive(Debug, Clone)]
struct CacheEntry {
    result: ModelCallResult,
    inserted_at: DateTime<Utc>,
    hit_count: u64,
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    /// Lookups that returned a live entry
    pub hits: u64,
    /// Lookups that found nothing (or only an expired entry)
    pub misses: u64,
    /// Entries removed by TTL expiry or capacity pressure
    pub evictions: u64,
    /// Current entry count
    pub entries: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Insertion order for FIFO eviction
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// TTL + FIFO response cache, safe for concurrent use.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    max_entries: usize,
    state: Mutex<CacheState>,
}

impl ResponseCache {
    /// Create a cache with the given TTL (seconds) and capacity.
    #[must_use]
    pub fn new(ttl_secs: i64, max_entries: usize) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs),
            max_entries,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Look up a fingerprint. Expired entries are treated as misses and
    /// evicted on the spot.
    pub async fn get(&self, fingerprint: &str) -> Option<ModelCallResult> {
        self.get_at(fingerprint, Utc::now()).await
    }

    /// Clock-injected variant of [`get`](Self::get).
    pub async fn get_at(&self, fingerprint: &str, now: DateTime<Utc>) -> Option<ModelCallResult> {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        let expired = match state.entries.get_mut(fingerprint) {
            Some(entry) if now - entry.inserted_at < self.ttl => {
                entry.hit_count += 1;
                state.hits += 1;
                return Some(entry.result.clone().as_cached());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.entries.remove(fingerprint);
            state.order.retain(|k| k != fingerprint);
            state.evictions += 1;
            debug!(fingerprint = &fingerprint[..8.min(fingerprint.len())], "Evicted expired entry");
        }
        state.misses += 1;
        None
    }

    /// Insert a result, evicting the oldest-inserted entries past capacity.
    pub async fn put(&self, fingerprint: String, result: ModelCallResult) {
        self.put_at(fingerprint, result, Utc::now()).await;
    }

    /// Clock-injected variant of [`put`](Self::put).
    pub async fn put_at(&self, fingerprint: String, result: ModelCallResult, now: DateTime<Utc>) {
        if self.max_entries == 0 {
            return;
        }
        let mut state = self.state.lock().await;

        // Re-inserting an existing key refreshes the entry in place; its
        // original queue position keeps eviction order stable.
        if !state.entries.contains_key(&fingerprint) {
            state.order.push_back(fingerprint.clone());
        }
        state.entries.insert(
            fingerprint,
            CacheEntry {
                result,
                inserted_at: now,
                hit_count: 0,
            },
        );

        while state.entries.len() > self.max_entries {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
                state.evictions += 1;
            } else {
                break;
            }
        }
    }

    /// Snapshot of the hit/miss counters.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            entries: state.entries.len(),
        }
    }
}
