//! # Result Cache
//!
//! Bounded, expiring cache of analysis records keyed by execution identity and
//! analysis mode, mirrored to a [`KeyValueStore`] after every mutation.
//!
//! ## Policy
//!
//! - Entries expire [`CacheLimits::ttl`] after creation and are evicted lazily
//!   on read or by [`ResultCache::sweep_expired`].
//! - Size is estimated as twice the serialized character length of the record.
//! - When an insert pushes either bound over its maximum, the oldest entries
//!   are evicted until both are at or below [`CacheLimits::eviction_target`] of
//!   their maximum.
//! - A single record larger than [`CacheLimits::max_entry_fraction`] of the
//!   byte budget is never cached.
//! - [`ResultCache::check_version`] clears everything when the stored ruleset
//!   version differs from the running one, at most once per
//!   [`CacheLimits::version_check_interval`].
//!
//! Persistence errors are logged and swallowed.

pub mod store;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::model::AnalysisRecord;

pub use store::{FileStore, KeyValueStore, MemoryStore};

/// Store key holding the serialized entry map.
pub const SNAPSHOT_KEY: &str = "analysis_cache";
/// Store key holding the ruleset version the snapshot was produced under.
pub const VERSION_KEY: &str = "analysis_cache_version";
/// Store key holding the time of the last version comparison.
pub const VERSION_CHECKED_AT_KEY: &str = "analysis_cache_version_checked_at";

/// Bumped whenever repair, validation or prompt logic changes in a way that
/// makes previously cached analyses stale.
pub const RULESET_VERSION: &str = "2024.06-repair-v4";

/// Capacity and timing policy.
#[derive(Debug, Clone)]
pub struct CacheLimits {
    pub max_entries: usize,
    pub max_bytes: usize,
    pub ttl: Duration,
    /// Fraction of each bound that eviction shrinks the cache down to
    pub eviction_target: f64,
    /// Largest fraction of `max_bytes` a single entry may occupy
    pub max_entry_fraction: f64,
    pub version_check_interval: Duration,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_bytes: 50 * 1024 * 1024,
            ttl: Duration::hours(24),
            eviction_target: 0.8,
            max_entry_fraction: 0.1,
            version_check_interval: Duration::hours(1),
        }
    }
}

impl CacheLimits {
    fn target_entries(&self) -> usize {
        (self.max_entries as f64 * self.eviction_target).floor() as usize
    }

    fn target_bytes(&self) -> usize {
        (self.max_bytes as f64 * self.eviction_target).floor() as usize
    }

    fn max_entry_bytes(&self) -> usize {
        (self.max_bytes as f64 * self.max_entry_fraction).floor() as usize
    }
}

/// Identity of a cached analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub execution_id: String,
    pub monitoring_included: bool,
}

impl CacheKey {
    pub fn new(execution_id: impl Into<String>, monitoring_included: bool) -> Self {
        Self {
            execution_id: execution_id.into(),
            monitoring_included,
        }
    }

    /// Parse a `"{executionId}_{monitoringIncluded}"` storage key.
    pub fn parse(key: &str) -> Option<Self> {
        let (id, flag) = key.rsplit_once('_')?;
        let monitoring_included = flag.parse().ok()?;
        Some(Self::new(id, monitoring_included))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.execution_id, self.monitoring_included)
    }
}

/// A cached record plus the bookkeeping needed for expiry and eviction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub payload: AnalysisRecord,
    pub created_at: DateTime<Utc>,
    pub byte_size: usize,
    /// Insertion order, breaks ties between equal timestamps
    #[serde(default)]
    pub sequence: u64,
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    total_bytes: usize,
    next_sequence: u64,
}

impl CacheState {
    fn insert(&mut self, key: CacheKey, entry: CacheEntry) {
        self.total_bytes += entry.byte_size;
        if let Some(old) = self.entries.insert(key, entry) {
            self.total_bytes = self.total_bytes.saturating_sub(old.byte_size);
        }
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let removed = self.entries.remove(key)?;
        self.total_bytes = self.total_bytes.saturating_sub(removed.byte_size);
        Some(removed)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }
}

/// Estimated in-memory footprint of a record: two bytes per serialized char.
pub fn estimate_size(record: &AnalysisRecord) -> Result<usize, serde_json::Error> {
    let text = serde_json::to_string(record)?;
    Ok(text.chars().count() * 2)
}

pub struct ResultCache {
    state: RwLock<CacheState>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    limits: CacheLimits,
    ruleset_version: String,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResultCache {
    /// Build a cache and reload whatever unexpired entries the store holds.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        limits: CacheLimits,
        ruleset_version: impl Into<String>,
    ) -> Self {
        let cache = Self {
            state: RwLock::new(CacheState::default()),
            store,
            clock,
            limits,
            ruleset_version: ruleset_version.into(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        };
        cache.load();
        cache
    }

    pub fn limits(&self) -> &CacheLimits {
        &self.limits
    }

    pub fn ruleset_version(&self) -> &str {
        &self.ruleset_version
    }

    /// Cached record for the key, or `None` when absent or expired.
    pub fn get(&self, execution_id: &str, monitoring_included: bool) -> Option<AnalysisRecord> {
        let key = CacheKey::new(execution_id, monitoring_included);
        let now = self.clock.now();

        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            match state.entries.get(&key) {
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    debug!(cache_key = %key, "Cache miss");
                    return None;
                }
                Some(entry) if !self.is_expired(entry, now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(cache_key = %key, "Cache hit");
                    return Some(entry.payload.clone());
                }
                Some(_) => {}
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let still_expired = state
            .entries
            .get(&key)
            .map_or(false, |entry| self.is_expired(entry, now));
        if still_expired {
            state.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(cache_key = %key, "Evicted expired entry on read");
            self.persist(&state);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or overwrite, then enforce the capacity bounds.
    ///
    /// Returns `false` when the record was not cached.
    pub fn put(&self, execution_id: &str, monitoring_included: bool, record: &AnalysisRecord) -> bool {
        let key = CacheKey::new(execution_id, monitoring_included);

        let byte_size = match estimate_size(record) {
            Ok(size) => size,
            Err(err) => {
                warn!(cache_key = %key, error = %err, "Could not size record; not caching");
                return false;
            }
        };
        if byte_size > self.limits.max_entry_bytes() {
            warn!(
                cache_key = %key,
                byte_size,
                limit = self.limits.max_entry_bytes(),
                "Record exceeds per-entry size limit; not caching"
            );
            return false;
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.insert(
            key,
            CacheEntry {
                payload: record.clone(),
                created_at: self.clock.now(),
                byte_size,
                sequence,
            },
        );

        self.enforce_bounds(&mut state);
        self.persist(&state);
        true
    }

    /// Remove the entries for both analysis modes of an execution.
    pub fn invalidate(&self, execution_id: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let removed = [false, true]
            .into_iter()
            .filter_map(|flag| state.remove(&CacheKey::new(execution_id, flag)))
            .count();
        info!(execution_id, removed, "Invalidated cached analyses");
        self.persist(&state);
    }

    /// Drop every entry and the persisted snapshot.
    pub fn invalidate_all(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let removed = state.entries.len();
        state.clear();
        if let Err(err) = self.store.remove(SNAPSHOT_KEY) {
            warn!(error = %err, "Failed to remove persisted cache snapshot");
        }
        info!(removed, "Invalidated all cached analyses");
    }

    /// Remove every expired entry; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let expired: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }

        if !expired.is_empty() {
            self.evictions.fetch_add(expired.len() as u64, Ordering::Relaxed);
            info!(removed = expired.len(), "Swept expired cache entries");
            self.persist(&state);
        }
        expired.len()
    }

    /// Compare the running ruleset version with the stored one, clearing the
    /// cache on mismatch.
    ///
    /// Skipped when the previous comparison happened less than
    /// `version_check_interval` ago. Returns `true` when the cache was cleared.
    pub fn check_version(&self) -> bool {
        let now = self.clock.now();

        let last_checked = match self.store.get(VERSION_CHECKED_AT_KEY) {
            Ok(value) => value.and_then(|v| DateTime::parse_from_rfc3339(v.trim()).ok()),
            Err(err) => {
                warn!(error = %err, "Failed to read version check marker");
                None
            }
        };
        if let Some(last) = last_checked {
            if now - last.with_timezone(&Utc) < self.limits.version_check_interval {
                debug!("Ruleset version checked recently; skipping");
                return false;
            }
        }

        if let Err(err) = self.store.set(VERSION_CHECKED_AT_KEY, &now.to_rfc3339()) {
            warn!(error = %err, "Failed to record version check time");
        }

        let stored = match self.store.get(VERSION_KEY) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "Failed to read stored ruleset version");
                None
            }
        };
        if stored.as_deref() == Some(self.ruleset_version.as_str()) {
            return false;
        }

        info!(
            stored = stored.as_deref().unwrap_or("<none>"),
            current = %self.ruleset_version,
            "Ruleset version changed; clearing analysis cache"
        );
        self.invalidate_all();
        if let Err(err) = self.store.set(VERSION_KEY, &self.ruleset_version) {
            warn!(error = %err, "Failed to store ruleset version");
        }
        true
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            entries: state.entries.len(),
            bytes: state.total_bytes,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Run the expiry sweep and version check on a timer until the returned
    /// handle is aborted.
    pub fn spawn_maintenance(self: Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let swept = self.sweep_expired();
                let cleared = self.check_version();
                debug!(swept, cleared, "Cache maintenance pass complete");
            }
        })
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.created_at >= self.limits.ttl
    }

    fn over_bounds(&self, state: &CacheState) -> bool {
        state.entries.len() > self.limits.max_entries || state.total_bytes > self.limits.max_bytes
    }

    fn enforce_bounds(&self, state: &mut CacheState) {
        if !self.over_bounds(state) {
            return;
        }

        let mut by_age: Vec<(DateTime<Utc>, u64, CacheKey)> = state
            .entries
            .iter()
            .map(|(key, entry)| (entry.created_at, entry.sequence, key.clone()))
            .collect();
        by_age.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let target_entries = self.limits.target_entries();
        let target_bytes = self.limits.target_bytes();
        let mut evicted = 0u64;
        for (_, _, key) in by_age {
            if state.entries.len() <= target_entries && state.total_bytes <= target_bytes {
                break;
            }
            state.remove(&key);
            evicted += 1;
        }

        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        info!(
            evicted,
            entries = state.entries.len(),
            bytes = state.total_bytes,
            "Evicted oldest cache entries"
        );
    }

    fn load(&self) {
        let raw = match self.store.get(SNAPSHOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "Failed to read persisted cache snapshot");
                return;
            }
        };

        let snapshot: HashMap<String, CacheEntry> = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "Discarding unreadable cache snapshot");
                return;
            }
        };

        let now = self.clock.now();
        let total = snapshot.len();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for (raw_key, entry) in snapshot {
            let Some(key) = CacheKey::parse(&raw_key) else {
                warn!(key = %raw_key, "Skipping malformed cache key");
                continue;
            };
            if self.is_expired(&entry, now) {
                continue;
            }
            state.next_sequence = state.next_sequence.max(entry.sequence + 1);
            state.insert(key, entry);
        }

        self.enforce_bounds(&mut state);
        let kept = state.entries.len();
        info!(kept, discarded = total - kept, "Reloaded persisted analysis cache");
        if kept != total {
            self.persist(&state);
        }
    }

    fn persist(&self, state: &CacheState) {
        let snapshot: HashMap<String, &CacheEntry> = state
            .entries
            .iter()
            .map(|(key, entry)| (key.to_string(), entry))
            .collect();

        let result = serde_json::to_string(&snapshot)
            .map_err(crate::error::StoreError::from)
            .and_then(|text| self.store.set(SNAPSHOT_KEY, &text));
        if let Err(err) = result {
            warn!(error = %err, "Failed to persist analysis cache");
        }
    }
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("limits", &self.limits)
            .field("ruleset_version", &self.ruleset_version)
            .field("stats", &self.stats())
            .finish()
    }
}
