//! Bounded analysis cache.
//!
//! Entries are keyed by [`key::generate_key`], expire after a TTL, and are
//! evicted least-recently-accessed first when the cache is full. Every write
//! persists a JSON snapshot to an optional [`storage::KeyValueStore`];
//! persistence failures are logged and never surface to callers.
pub mod key;
pub mod similarity;
pub mod storage;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, Millis};
use crate::config::CacheConfig;
use crate::models::AnalysisResult;
use similarity::{SimilarityFn, positional_similarity};
use storage::KeyValueStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub data: AnalysisResult,
    pub timestamp: Millis,
    #[serde(rename = "expires")]
    pub expires_at: Millis,
    pub size: usize,
    #[serde(default)]
    pub access_count: u64,
    #[serde(default)]
    pub last_accessed: Millis,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

/// Point-in-time statistics, including memory estimates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReport {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub hit_rate: f64,
    pub entries: usize,
    pub max_size: usize,
    pub total_size_bytes: usize,
    pub average_entry_bytes: usize,
}

/// Persisted snapshot shape: `{cache: {key: entry}, stats: {...}}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    cache: HashMap<String, CacheEntry>,
    #[serde(default)]
    stats: CacheStats,
}

pub struct AnalysisCache {
    entries: HashMap<String, CacheEntry>,
    max_size: usize,
    default_ttl: Millis,
    storage_key: String,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Arc<dyn Clock>,
    similarity: SimilarityFn,
    stats: CacheStats,
}

impl AnalysisCache {
    /// In-memory cache with no persistence.
    #[must_use]
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            max_size: config.max_size.max(1),
            default_ttl: secs_to_ms(config.ttl_secs),
            storage_key: config.storage_key.clone(),
            store: None,
            clock,
            similarity: positional_similarity,
            stats: CacheStats::default(),
        }
    }

    /// Cache backed by `store`, restoring whatever unexpired entries the slot
    /// already holds.
    #[must_use]
    pub fn open(config: &CacheConfig, clock: Arc<dyn Clock>, store: Arc<dyn KeyValueStore>) -> Self {
        let mut cache = Self::new(config, clock);
        cache.store = Some(store);
        cache.load();
        cache
    }

    /// Replace the similarity used by [`invalidate_by_text`](Self::invalidate_by_text).
    #[must_use]
    pub fn with_similarity(mut self, similarity: SimilarityFn) -> Self {
        self.similarity = similarity;
        self
    }

    #[must_use]
    pub fn generate_key(text: &str, options: &Value) -> String {
        key::generate_key(text, options)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size.max(1);
        let mut evicted = false;
        while self.entries.len() > self.max_size {
            evicted |= self.evict_lru();
        }
        if evicted {
            self.persist();
        }
    }

    /// TTL for entries set without an explicit one. Existing entries keep
    /// their expiry.
    pub fn set_default_ttl(&mut self, ttl: Duration) {
        self.default_ttl = ttl.as_millis().try_into().unwrap_or(Millis::MAX);
    }

    /// Look up `key`. Expired entries count as misses and are dropped.
    pub fn get(&mut self, key: &str) -> Option<AnalysisResult> {
        let now = self.clock.now_ms();
        let expired = match self.entries.get(key) {
            None => {
                self.stats.misses += 1;
                return None;
            }
            Some(entry) => now > entry.expires_at,
        };

        if expired {
            debug!("cache entry {key} expired");
            self.entries.remove(key);
            self.stats.misses += 1;
            self.persist();
            return None;
        }

        self.stats.hits += 1;
        let entry = self.entries.get_mut(key)?;
        entry.last_accessed = now;
        entry.access_count += 1;
        Some(entry.data.clone())
    }

    /// Insert or replace `key`. `ttl` falls back to the configured default.
    pub fn set(&mut self, key: &str, value: AnalysisResult, ttl: Option<Duration>) {
        let now = self.clock.now_ms();
        let ttl = ttl
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(self.default_ttl);

        if !self.entries.contains_key(key) {
            while self.entries.len() >= self.max_size {
                if !self.evict_lru() {
                    break;
                }
            }
        }

        let size = serde_json::to_string(&value).map(|s| s.len()).unwrap_or(0);
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                data: value,
                timestamp: now,
                expires_at: now.saturating_add(ttl),
                size,
                access_count: 0,
                last_accessed: now,
            },
        );
        self.persist();
    }

    /// Present and unexpired. Does not count as an access.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.entries.get(key).is_some_and(|e| now <= e.expires_at)
    }

    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = CacheStats::default();
        self.persist();
    }

    /// Remove every entry whose text fingerprint is at least `threshold`
    /// similar to the fingerprint of `text`. Returns the number removed.
    pub fn invalidate_by_text(&mut self, text: &str, threshold: f64) -> usize {
        let target = key::fingerprint(text);
        let similarity = self.similarity;
        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|k| similarity(&target, key::text_component(k)) >= threshold)
            .cloned()
            .collect();

        for k in &doomed {
            self.entries.remove(k);
        }
        if !doomed.is_empty() {
            self.stats.invalidations += doomed.len() as u64;
            debug!("invalidated {} cache entries", doomed.len());
            self.persist();
        }
        doomed.len()
    }

    /// Drop all expired entries regardless of access. Returns the number removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let removed = self.purge_expired();
        if removed > 0 {
            self.persist();
        }
        removed
    }

    #[must_use]
    pub fn stats(&self) -> CacheReport {
        let total_size_bytes: usize = self.entries.values().map(|e| e.size).sum();
        let lookups = self.stats.hits + self.stats.misses;
        CacheReport {
            hits: self.stats.hits,
            misses: self.stats.misses,
            evictions: self.stats.evictions,
            invalidations: self.stats.invalidations,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                self.stats.hits as f64 / lookups as f64
            },
            entries: self.entries.len(),
            max_size: self.max_size,
            total_size_bytes,
            average_entry_bytes: total_size_bytes.checked_div(self.entries.len()).unwrap_or(0),
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────

    fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, e| now <= e.expires_at);
        before - self.entries.len()
    }

    /// Evict the least-recently-accessed entry; ties go to the oldest insert.
    fn evict_lru(&mut self) -> bool {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, e)| (e.last_accessed, e.timestamp))
            .map(|(k, _)| k.clone());

        match victim {
            Some(k) => {
                debug!("evicting LRU cache entry {k}");
                self.entries.remove(&k);
                self.stats.evictions += 1;
                true
            }
            None => false,
        }
    }

    fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct SnapshotRef<'a> {
            cache: &'a HashMap<String, CacheEntry>,
            stats: &'a CacheStats,
        }
        serde_json::to_string(&SnapshotRef {
            cache: &self.entries,
            stats: &self.stats,
        })
    }

    /// Write the snapshot; on failure purge expired entries and retry once,
    /// then give up and stay in-memory.
    fn persist(&mut self) {
        let Some(store) = self.store.clone() else {
            return;
        };

        let attempt = |cache: &Self| -> Result<(), String> {
            let json = cache.snapshot_json().map_err(|e| e.to_string())?;
            store
                .set_item(&cache.storage_key, &json)
                .map_err(|e| e.to_string())
        };

        if let Err(first) = attempt(self) {
            warn!("cache persist failed: {first}; retrying after purging expired entries");
            self.purge_expired();
            if let Err(second) = attempt(self) {
                warn!("cache persist failed again: {second}; continuing in memory");
            }
        }
    }

    fn load(&mut self) {
        let Some(store) = self.store.clone() else {
            return;
        };

        let raw = match store.get_item(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                warn!("cache load failed: {e}");
                return;
            }
        };

        let snapshot: Snapshot = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                warn!("discarding unreadable cache snapshot: {e}");
                return;
            }
        };

        let now = self.clock.now_ms();
        let total = snapshot.cache.len();
        self.entries = snapshot
            .cache
            .into_iter()
            .filter(|(_, e)| now <= e.expires_at)
            .collect();
        self.stats = snapshot.stats;

        while self.entries.len() > self.max_size {
            self.evict_lru();
        }
        info!(
            "restored {} cache entries ({} expired)",
            self.entries.len(),
            total.saturating_sub(self.entries.len())
        );
    }
}

fn secs_to_ms(secs: u64) -> Millis {
    i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}

/// Periodically drop expired entries until `token` is cancelled.
pub fn spawn_sweeper(
    cache: Arc<TokioMutex<AnalysisCache>>,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // interval fires immediately; skip that tick
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = cache.lock().await.cleanup_expired();
                    if removed > 0 {
                        debug!("sweeper removed {removed} expired cache entries");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{Issue, IssueType, Severity};
    use serde_json::json;
    use storage::MemoryStore;

    fn config(max_size: usize) -> CacheConfig {
        CacheConfig {
            max_size,
            ttl_secs: 60,
            ..CacheConfig::default()
        }
    }

    fn result(text: &str) -> AnalysisResult {
        let mut r = AnalysisResult::empty(text, 0);
        if text.len() >= 2 {
            r.issues
                .push(Issue::new(IssueType::Spelling, Severity::Error, 0, 2, text, "m."));
        }
        r
    }

    #[test]
    fn test_set_get_hit_and_miss() {
        let clock = ManualClock::new(1_000);
        let mut cache = AnalysisCache::new(&config(10), clock);
        let key = AnalysisCache::generate_key("hello", &json!({}));

        assert!(cache.get(&key).is_none());
        cache.set(&key, result("hello"), None);
        assert_eq!(cache.get(&key).unwrap().original_text, "hello");

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.hit_rate, 0.5);
        assert_eq!(stats.entries, 1);
        assert!(stats.total_size_bytes > 0);
        assert_eq!(stats.average_entry_bytes, stats.total_size_bytes);
    }

    #[test]
    fn test_ttl_expiry() {
        let clock = ManualClock::new(0);
        let mut cache = AnalysisCache::new(&config(10), clock.clone());
        cache.set("k", result("abc"), Some(Duration::from_millis(500)));

        clock.advance(499);
        assert!(cache.has("k"));
        assert!(cache.get("k").is_some());

        clock.advance(2);
        assert!(!cache.has("k"));
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_evicts_least_recently_accessed() {
        let clock = ManualClock::new(0);
        let mut cache = AnalysisCache::new(&config(3), clock.clone());
        for k in ["a", "b", "c"] {
            cache.set(k, result(k), None);
            clock.advance(10);
        }

        // touch the oldest insert
        assert!(cache.get("a").is_some());
        clock.advance(10);

        cache.set("d", result("d"), None);
        assert_eq!(cache.len(), 3);
        assert!(cache.has("a"), "just-accessed entry must survive");
        assert!(!cache.has("b"), "second-oldest entry is the LRU victim");
        assert!(cache.has("c"));
        assert!(cache.has("d"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_replacing_existing_key_does_not_evict() {
        let clock = ManualClock::new(0);
        let mut cache = AnalysisCache::new(&config(2), clock);
        cache.set("a", result("a"), None);
        cache.set("b", result("b"), None);
        cache.set("a", result("aa"), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_delete_and_clear() {
        let clock = ManualClock::new(0);
        let mut cache = AnalysisCache::new(&config(5), clock);
        cache.set("a", result("a"), None);
        cache.set("b", result("b"), None);
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_by_text_exact() {
        let clock = ManualClock::new(0);
        let mut cache = AnalysisCache::new(&config(10), clock);
        let k1 = AnalysisCache::generate_key("same text", &json!({"lang": "en"}));
        let k2 = AnalysisCache::generate_key("same text", &json!({"lang": "de"}));
        let k3 = AnalysisCache::generate_key("other text", &json!({"lang": "en"}));
        for k in [&k1, &k2, &k3] {
            cache.set(k, result("x"), None);
        }

        let removed = cache.invalidate_by_text("same text", 1.0);
        assert_eq!(removed, 2);
        assert!(cache.has(&k3));
        assert_eq!(cache.stats().invalidations, 2);
    }

    #[test]
    fn test_pluggable_similarity() {
        fn everything(_: &str, _: &str) -> f64 {
            1.0
        }
        let clock = ManualClock::new(0);
        let mut cache = AnalysisCache::new(&config(10), clock).with_similarity(everything);
        cache.set("aaaa_bbbb", result("x"), None);
        cache.set("cccc_dddd", result("y"), None);
        assert_eq!(cache.invalidate_by_text("anything", 0.9), 2);
    }

    #[test]
    fn test_cleanup_expired() {
        let clock = ManualClock::new(0);
        let mut cache = AnalysisCache::new(&config(10), clock.clone());
        cache.set("short", result("s"), Some(Duration::from_millis(10)));
        cache.set("long", result("l"), Some(Duration::from_secs(10)));
        clock.advance(100);
        assert_eq!(cache.cleanup_expired(), 1);
        assert!(cache.has("long"));
    }

    #[test]
    fn test_persist_and_restore() {
        let clock = ManualClock::new(0);
        let store = Arc::new(MemoryStore::new());
        {
            let mut cache = AnalysisCache::open(&config(10), clock.clone(), store.clone());
            cache.set("keep", result("keep me"), Some(Duration::from_secs(100)));
            cache.set("drop", result("drop me"), Some(Duration::from_millis(5)));
            assert!(cache.get("keep").is_some());
            // stats are written with the next snapshot
            cache.set("late", result("late"), Some(Duration::from_secs(100)));
        }
        assert_eq!(store.writes(), 3);

        clock.advance(1_000);
        let mut restored = AnalysisCache::open(&config(10), clock, store);
        assert_eq!(restored.len(), 2, "expired entries are discarded on load");
        assert_eq!(restored.get("keep").unwrap().original_text, "keep me");
        assert_eq!(restored.stats().hits, 2, "stats survive the round-trip");
    }

    #[test]
    fn test_snapshot_shape() {
        let clock = ManualClock::new(7);
        let store = Arc::new(MemoryStore::new());
        let mut cache = AnalysisCache::open(&config(10), clock, store.clone());
        cache.set("k", result("abc"), Some(Duration::from_millis(3)));

        let raw = store.get_item(&config(10).storage_key).unwrap().unwrap();
        let snapshot: Value = serde_json::from_str(&raw).unwrap();
        let entry = &snapshot["cache"]["k"];
        assert_eq!(entry["timestamp"], 7);
        assert_eq!(entry["expires"], 10);
        assert!(entry["size"].as_u64().unwrap() > 0);
        assert_eq!(entry["data"]["originalText"], "abc");
        assert!(snapshot["stats"].is_object());
    }

    #[test]
    fn test_quota_failure_purges_expired_and_retries() {
        let clock = ManualClock::new(0);
        let store = Arc::new(MemoryStore::with_quota(1_500));
        let mut cache = AnalysisCache::open(&config(10), clock.clone(), store.clone());

        // First entry alone would blow the quota, so nothing is written yet.
        let big = "x".repeat(2_000);
        cache.set("big", AnalysisResult::empty(&big, 0), Some(Duration::from_millis(10)));
        assert_eq!(store.writes(), 0);
        assert!(cache.has("big"), "cache keeps working in memory");

        clock.advance(100);
        cache.set("small", result("tiny"), None);
        assert_eq!(store.writes(), 1, "retry after purging expired entries succeeds");
        assert!(!cache.has("big"));
        assert!(cache.has("small"));
    }

    #[test]
    fn test_load_ignores_garbage() {
        let clock = ManualClock::new(0);
        let store = Arc::new(MemoryStore::new());
        store
            .set_item(&config(10).storage_key, "definitely not json")
            .unwrap();
        let cache = AnalysisCache::open(&config(10), clock, store);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shrinking_max_size_evicts() {
        let clock = ManualClock::new(0);
        let mut cache = AnalysisCache::new(&config(5), clock.clone());
        for k in ["a", "b", "c", "d"] {
            cache.set(k, result(k), None);
            clock.advance(1);
        }
        cache.set_max_size(2);
        assert_eq!(cache.len(), 2);
        assert!(cache.has("c") && cache.has("d"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired() {
        let clock = ManualClock::new(0);
        let cache = Arc::new(TokioMutex::new(AnalysisCache::new(&config(5), clock.clone())));
        cache
            .lock()
            .await
            .set("k", result("k"), Some(Duration::from_millis(10)));
        clock.advance(50);

        let token = CancellationToken::new();
        let handle = spawn_sweeper(cache.clone(), Duration::from_secs(300), token.clone());
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(cache.lock().await.is_empty());

        token.cancel();
        handle.await.unwrap();
    }
}
