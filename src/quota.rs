//! Client-local quota gates.
//!
//! * The generation gate is a sliding window: at most `capacity` accepted
//!   generations within `window`.
//! * The download gate counts exports per payload fingerprint.
//!
//! Both gates fail open: a missing or corrupt record is an empty history or a
//! zero count, and a failed write never blocks the action.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::QuotaError;
use crate::store::KeyValueStore;

pub const GENERATIONS_KEY: &str = "coldlink_qr_generations";
pub const DOWNLOADS_KEY: &str = "coldlink_qr_downloads";

const MINUTE_MS: i64 = 60_000;

/// Hex characters kept from the payload digest.
const FINGERPRINT_LEN: usize = 16;

/// Short, stable key for a payload. Collisions only merge two soft quotas.
pub fn fingerprint(payload: &str) -> String {
    let digest = Sha256::digest(payload.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(FINGERPRINT_LEN);
    key
}

/// Minutes until the oldest entry leaves the window, rounded up, at least 1.
pub fn retry_after_minutes(oldest_ms: i64, now_ms: i64, window: Duration) -> u32 {
    let remaining = (window.num_milliseconds() - (now_ms - oldest_ms)).max(0);
    let minutes = (remaining + MINUTE_MS - 1) / MINUTE_MS;
    u32::try_from(minutes.max(1)).unwrap_or(u32::MAX)
}

/// Sliding-window limit on generations.
#[derive(Debug, Clone)]
pub struct GenerationGate {
    window: Duration,
    capacity: u32,
}

impl GenerationGate {
    pub fn new(window: Duration, capacity: u32) -> Self {
        Self { window, capacity }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Accepts and records a generation at `now`, or reports the wait time.
    pub fn check_and_record(
        &self,
        store: &mut dyn KeyValueStore,
        now: DateTime<Utc>,
    ) -> Result<(), QuotaError> {
        let now_ms = now.timestamp_millis();
        let mut recent = self.recent(&*store, now_ms);

        if recent.len() >= self.capacity as usize {
            let oldest = recent.iter().copied().min().unwrap_or(now_ms);
            let retry_after_minutes = retry_after_minutes(oldest, now_ms, self.window);
            warn!(
                used = recent.len(),
                retry_after_minutes, "generation limit reached"
            );
            return Err(QuotaError::GenerationLimit {
                limit: self.capacity,
                retry_after_minutes,
            });
        }

        recent.push(now_ms);
        match serde_json::to_string(&recent) {
            Ok(json) => {
                if let Err(error) = store.set(GENERATIONS_KEY, json) {
                    warn!(%error, "failed to persist generation history");
                }
            }
            Err(error) => warn!(%error, "failed to serialize generation history"),
        }
        debug!(used = recent.len(), capacity = self.capacity, "generation recorded");
        Ok(())
    }

    /// Generations still available at `now`. Does not write.
    pub fn remaining(&self, store: &dyn KeyValueStore, now: DateTime<Utc>) -> u32 {
        let used = self.recent(store, now.timestamp_millis()).len();
        self.capacity
            .saturating_sub(u32::try_from(used).unwrap_or(u32::MAX))
    }

    fn recent(&self, store: &dyn KeyValueStore, now_ms: i64) -> Vec<i64> {
        let window_ms = self.window.num_milliseconds();
        read_history(store)
            .into_iter()
            .filter(|timestamp| now_ms - timestamp < window_ms)
            .collect()
    }
}

/// Persisted history; anything that is not an array of finite numbers is
/// skipped.
fn read_history(store: &dyn KeyValueStore) -> Vec<i64> {
    let raw = match store.get(GENERATIONS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(error) => {
            warn!(%error, "generation history unreadable, treating as empty");
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
        Ok(values) => values
            .iter()
            .filter_map(|value| {
                value
                    .as_i64()
                    .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            })
            .collect(),
        Err(error) => {
            warn!(%error, "generation history corrupt, treating as empty");
            Vec::new()
        }
    }
}

/// Per-fingerprint download record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadEntry {
    pub count: u32,
    /// Epoch milliseconds of the last counted download; 0 when unknown.
    #[serde(default)]
    pub last_used: i64,
}

/// Accepts both the current object form and bare counts.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Entry(DownloadEntry),
    Count(u32),
}

impl From<StoredEntry> for DownloadEntry {
    fn from(stored: StoredEntry) -> Self {
        match stored {
            StoredEntry::Entry(entry) => entry,
            StoredEntry::Count(count) => DownloadEntry {
                count,
                last_used: 0,
            },
        }
    }
}

/// Per-payload download limit.
#[derive(Debug, Clone)]
pub struct DownloadGate {
    capacity: u32,
    max_tracked: usize,
}

impl DownloadGate {
    pub fn new(capacity: u32, max_tracked: usize) -> Self {
        Self {
            capacity,
            max_tracked: max_tracked.max(1),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Fails when `fingerprint` already reached the limit.
    pub fn check(&self, store: &dyn KeyValueStore, fingerprint: &str) -> Result<(), QuotaError> {
        let used = self.count(store, fingerprint);
        if used >= self.capacity {
            warn!(fingerprint, used, "download limit reached");
            return Err(QuotaError::DownloadLimit {
                limit: self.capacity,
            });
        }
        Ok(())
    }

    /// Counts one download. Call only after the export side effect succeeded.
    pub fn record(&self, store: &mut dyn KeyValueStore, fingerprint: &str, now: DateTime<Utc>) {
        let mut counters = read_counters(&*store);
        let entry = counters
            .entry(fingerprint.to_string())
            .or_insert(DownloadEntry {
                count: 0,
                last_used: 0,
            });
        entry.count = entry.count.saturating_add(1);
        entry.last_used = now.timestamp_millis();
        let count = entry.count;

        self.evict(&mut counters);
        match serde_json::to_string(&counters) {
            Ok(json) => {
                if let Err(error) = store.set(DOWNLOADS_KEY, json) {
                    warn!(%error, "failed to persist download counters");
                }
            }
            Err(error) => warn!(%error, "failed to serialize download counters"),
        }
        debug!(fingerprint, count, capacity = self.capacity, "download recorded");
    }

    pub fn count(&self, store: &dyn KeyValueStore, fingerprint: &str) -> u32 {
        read_counters(store)
            .get(fingerprint)
            .map_or(0, |entry| entry.count)
    }

    pub fn remaining(&self, store: &dyn KeyValueStore, fingerprint: &str) -> u32 {
        self.capacity.saturating_sub(self.count(store, fingerprint))
    }

    /// Drops the least recently used fingerprints beyond `max_tracked`.
    fn evict(&self, counters: &mut BTreeMap<String, DownloadEntry>) {
        if counters.len() <= self.max_tracked {
            return;
        }
        let mut by_age: Vec<(i64, String)> = counters
            .iter()
            .map(|(key, entry)| (entry.last_used, key.clone()))
            .collect();
        by_age.sort();
        let excess = counters.len() - self.max_tracked;
        for (_, key) in by_age.into_iter().take(excess) {
            counters.remove(&key);
        }
        debug!(evicted = excess, "pruned download counters");
    }
}

fn read_counters(store: &dyn KeyValueStore) -> BTreeMap<String, DownloadEntry> {
    let raw = match store.get(DOWNLOADS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return BTreeMap::new(),
        Err(error) => {
            warn!(%error, "download counters unreadable, treating as empty");
            return BTreeMap::new();
        }
    };
    match serde_json::from_str::<BTreeMap<String, StoredEntry>>(&raw) {
        Ok(stored) => stored
            .into_iter()
            .map(|(key, entry)| (key, entry.into()))
            .collect(),
        Err(error) => {
            warn!(%error, "download counters corrupt, treating as empty");
            BTreeMap::new()
        }
    }
}

/// Both gates over one store.
pub struct QuotaTracker {
    store: Box<dyn KeyValueStore>,
    generation: GenerationGate,
    download: DownloadGate,
}

impl QuotaTracker {
    pub fn new(
        store: Box<dyn KeyValueStore>,
        generation: GenerationGate,
        download: DownloadGate,
    ) -> Self {
        Self {
            store,
            generation,
            download,
        }
    }

    pub fn try_generate(&mut self, now: DateTime<Utc>) -> Result<(), QuotaError> {
        self.generation.check_and_record(self.store.as_mut(), now)
    }

    pub fn generations_remaining(&self, now: DateTime<Utc>) -> u32 {
        self.generation.remaining(self.store.as_ref(), now)
    }

    pub fn check_download(&self, payload: &str) -> Result<(), QuotaError> {
        self.download.check(self.store.as_ref(), &fingerprint(payload))
    }

    pub fn record_download(&mut self, payload: &str, now: DateTime<Utc>) {
        self.download
            .record(self.store.as_mut(), &fingerprint(payload), now);
    }

    pub fn downloads_remaining(&self, payload: &str) -> u32 {
        self.download
            .remaining(self.store.as_ref(), &fingerprint(payload))
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }
}
