//! Analysis orchestration: validation, caching, statistics and debouncing.
pub mod debounce;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::analyzer::TextAnalyzer;
use crate::cache::storage::KeyValueStore;
use crate::cache::{AnalysisCache, CacheReport, spawn_sweeper};
use crate::clock::Clock;
use crate::config::Config;
use crate::models::{AnalysisOptions, AnalysisResult};
use crate::provider::{ProviderError, TextCompletionProvider};
use crate::text::char_len;
use debounce::{DebounceOutcome, Debouncer};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("text is {length} characters, maximum is {max}")]
    TooLong { length: usize, max: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("engine has been destroyed")]
    Destroyed,
}

/// Running totals over every `analyze` call that produced a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub total_analyses: u64,
    pub cache_hits: u64,
    pub failures: u64,
    pub total_issues: u64,
    pub average_latency_ms: f64,
}

impl EngineStats {
    fn record(&mut self, latency: Duration, issues: usize, from_cache: bool) {
        self.total_analyses += 1;
        if from_cache {
            self.cache_hits += 1;
        }
        self.total_issues += issues as u64;
        let latency_ms = latency.as_secs_f64() * 1000.0;
        self.average_latency_ms += (latency_ms - self.average_latency_ms) / self.total_analyses as f64;
    }
}

/// Partial update for [`AnalysisEngine::configure`]. Absent fields keep
/// their current value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfigPatch {
    pub max_text_length: Option<usize>,
    pub max_chunk_size: Option<usize>,
    pub debounce_ms: Option<u64>,
    pub cache_max_size: Option<usize>,
    pub cache_ttl_secs: Option<u64>,
    pub rate_limit_max_requests: Option<u32>,
    pub rate_limit_window_secs: Option<u64>,
}

pub struct AnalysisEngine {
    config: Mutex<Config>,
    analyzer: TextAnalyzer,
    cache: Arc<TokioMutex<AnalysisCache>>,
    stats: Mutex<EngineStats>,
    debouncer: Debouncer,
    root: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
    clock: Arc<dyn Clock>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AnalysisEngine {
    /// Build the pipeline and start the cache sweeper. Must be called inside
    /// a tokio runtime.
    pub fn new(
        config: Config,
        provider: Arc<dyn TextCompletionProvider>,
        clock: Arc<dyn Clock>,
        store: Option<Arc<dyn KeyValueStore>>,
    ) -> Self {
        let cache = match store {
            Some(store) => AnalysisCache::open(&config.cache, Arc::clone(&clock), store),
            None => AnalysisCache::new(&config.cache, Arc::clone(&clock)),
        };
        let cache = Arc::new(TokioMutex::new(cache));

        let root = CancellationToken::new();
        let sweeper = spawn_sweeper(
            Arc::clone(&cache),
            Duration::from_secs(config.cache.sweep_interval_secs.max(1)),
            root.child_token(),
        );

        info!(
            "analysis engine ready: provider={}, max_text_length={}, debounce={}ms",
            provider.name(),
            config.max_text_length,
            config.debounce_ms
        );

        Self {
            analyzer: TextAnalyzer::new(provider, &config, Arc::clone(&clock)),
            config: Mutex::new(config),
            cache,
            stats: Mutex::new(EngineStats::default()),
            debouncer: Debouncer::new(root.clone()),
            root,
            sweeper: Mutex::new(Some(sweeper)),
            destroyed: AtomicBool::new(false),
            clock,
        }
    }

    fn ensure_alive(&self) -> Result<(), EngineError> {
        if self.destroyed.load(Ordering::SeqCst) {
            Err(EngineError::Destroyed)
        } else {
            Ok(())
        }
    }

    pub fn config(&self) -> Config {
        lock(&self.config).clone()
    }

    pub fn stats(&self) -> EngineStats {
        *lock(&self.stats)
    }

    pub async fn cache_stats(&self) -> CacheReport {
        self.cache.lock().await.stats()
    }

    /// Shared handle to the cache, for callers that manage entries directly.
    pub fn cache(&self) -> Arc<TokioMutex<AnalysisCache>> {
        Arc::clone(&self.cache)
    }

    /// Validate, consult the cache, and on a miss run the full pipeline.
    ///
    /// Empty or whitespace-only text yields an empty result without touching
    /// the cache or the provider. Provider errors are returned unchanged.
    pub async fn analyze(
        &self,
        text: &str,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult, EngineError> {
        self.ensure_alive()?;
        let started = Instant::now();

        let max = lock(&self.config).max_text_length;
        let length = char_len(text);
        if length > max {
            return Err(ValidationError::TooLong { length, max }.into());
        }
        if text.trim().is_empty() {
            return Ok(AnalysisResult::empty(text, self.clock.now_ms()));
        }

        let key = AnalysisCache::generate_key(text, &options.to_value());
        let cached = self.cache.lock().await.get(&key);
        if let Some(mut result) = cached {
            result.metadata.from_cache = true;
            debug!("cache hit for {key}");
            lock(&self.stats).record(started.elapsed(), result.issues.len(), true);
            return Ok(result);
        }

        let result = match self.analyzer.analyze_text(text, options).await {
            Ok(result) => result,
            Err(_) if self.is_destroyed() => return Err(EngineError::Destroyed),
            Err(e) => {
                lock(&self.stats).failures += 1;
                return Err(e.into());
            }
        };

        self.cache.lock().await.set(&key, result.clone(), None);
        lock(&self.stats).record(started.elapsed(), result.issues.len(), false);
        Ok(result)
    }

    /// Debounced [`analyze`](Self::analyze), keyed by `analysis_id`.
    ///
    /// Returns `Ok(None)` when a later call with the same id superseded this
    /// one, and [`EngineError::Destroyed`] when the engine was torn down
    /// while waiting.
    pub async fn analyze_realtime(
        &self,
        text: &str,
        options: &AnalysisOptions,
        analysis_id: &str,
    ) -> Result<Option<AnalysisResult>, EngineError> {
        self.ensure_alive()?;
        let delay = Duration::from_millis(lock(&self.config).debounce_ms);

        match self.debouncer.wait(analysis_id, delay).await {
            DebounceOutcome::Fire => self.analyze(text, options).await.map(Some),
            DebounceOutcome::Superseded => {
                debug!("{analysis_id}: superseded by a newer edit");
                Ok(None)
            }
            DebounceOutcome::Cancelled => Err(EngineError::Destroyed),
        }
    }

    /// Drop cached results for `text` (and, heuristically, near-identical
    /// text). Uses the configured threshold when `threshold` is `None`.
    pub async fn invalidate_cache(&self, text: &str, threshold: Option<f64>) -> usize {
        let threshold = threshold.unwrap_or_else(|| lock(&self.config).cache.invalidation_threshold);
        self.cache.lock().await.invalidate_by_text(text, threshold)
    }

    pub async fn configure(&self, patch: EngineConfigPatch) {
        let config = {
            let mut config = lock(&self.config);
            if let Some(v) = patch.max_text_length {
                config.max_text_length = v;
            }
            if let Some(v) = patch.max_chunk_size {
                config.max_chunk_size = v;
            }
            if let Some(v) = patch.debounce_ms {
                config.debounce_ms = v;
            }
            if let Some(v) = patch.cache_max_size {
                config.cache.max_size = v;
            }
            if let Some(v) = patch.cache_ttl_secs {
                config.cache.ttl_secs = v;
            }
            if let Some(v) = patch.rate_limit_max_requests {
                config.rate_limit.max_requests = v;
            }
            if let Some(v) = patch.rate_limit_window_secs {
                config.rate_limit.window_secs = v;
            }
            config.clone()
        };

        self.analyzer.set_max_chunk_size(config.max_chunk_size);
        self.analyzer.set_rate_limit(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_secs),
        );

        let mut cache = self.cache.lock().await;
        cache.set_max_size(config.cache.max_size);
        cache.set_default_ttl(Duration::from_secs(config.cache.ttl_secs));
        debug!("engine reconfigured: {patch:?}");
    }

    /// Clear the cache, statistics and rate limiter, and drop pending
    /// debounced calls. The engine stays usable.
    pub async fn reset(&self) {
        let dropped = self.debouncer.cancel_pending();
        self.cache.lock().await.clear();
        *lock(&self.stats) = EngineStats::default();
        self.analyzer.reset();
        info!("engine reset ({dropped} pending call(s) dropped)");
    }

    /// Cancel every pending debounce timer, stop the sweeper and the queue
    /// worker. Later calls fail with [`EngineError::Destroyed`].
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.root.cancel();
        if let Some(sweeper) = lock(&self.sweeper).take() {
            sweeper.abort();
        }
        self.analyzer.shutdown();
        info!("analysis engine destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl Drop for AnalysisEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}
