/// Configuration module for proofmark.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "proofmark.json";

// ── Default value functions ──────────────────────────────────────────

fn default_max_text_length() -> usize {
    10_000
}

fn default_max_chunk_size() -> usize {
    1_000
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_cache_max_size() -> usize {
    100
}

fn default_cache_ttl_secs() -> u64 {
    60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

fn default_storage_key() -> String {
    "proofmark_analysis_cache".to_string()
}

fn default_invalidation_threshold() -> f64 {
    0.8
}

fn default_max_requests() -> u32 {
    20
}

fn default_window_secs() -> u64 {
    60
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "PROOFMARK_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_offset() -> f64 {
    8.0
}

fn default_padding() -> f64 {
    8.0
}

fn default_mobile_breakpoint() -> f64 {
    768.0
}

fn default_tablet_breakpoint() -> f64 {
    1024.0
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub overlay: OverlayConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,

    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    #[serde(default = "default_invalidation_threshold")]
    pub invalidation_threshold: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProviderConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct OverlayConfig {
    #[serde(default = "default_offset")]
    pub offset: f64,

    #[serde(default = "default_padding")]
    pub padding: f64,

    #[serde(default = "default_mobile_breakpoint")]
    pub mobile_breakpoint: f64,

    #[serde(default = "default_tablet_breakpoint")]
    pub tablet_breakpoint: f64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            max_text_length: default_max_text_length(),
            max_chunk_size: default_max_chunk_size(),
            debounce_ms: default_debounce_ms(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            provider: ProviderConfig::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_cache_max_size(),
            ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            storage_key: default_storage_key(),
            invalidation_threshold: default_invalidation_threshold(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            offset: default_offset(),
            padding: default_padding(),
            mobile_breakpoint: default_mobile_breakpoint(),
            tablet_breakpoint: default_tablet_breakpoint(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"proofmark.json"`.
    /// If the file does not exist, returns a default config and generates a
    /// template when the default path was used.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.max_text_length > 0, "max_text_length must be positive");
        anyhow::ensure!(self.max_chunk_size > 0, "max_chunk_size must be positive");
        anyhow::ensure!(self.cache.max_size > 0, "cache.max_size must be positive");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.cache.invalidation_threshold),
            "cache.invalidation_threshold must be within [0, 1]"
        );
        anyhow::ensure!(
            self.rate_limit.max_requests > 0,
            "rate_limit.max_requests must be positive"
        );
        anyhow::ensure!(
            self.rate_limit.window_secs > 0,
            "rate_limit.window_secs must be positive"
        );
        anyhow::ensure!(
            self.overlay.mobile_breakpoint <= self.overlay.tablet_breakpoint,
            "overlay.mobile_breakpoint must not exceed overlay.tablet_breakpoint"
        );
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_text_length, 10_000);
        assert_eq!(config.max_chunk_size, 1_000);
        assert_eq!(config.cache.max_size, 100);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.provider.api_key_env, "PROOFMARK_API_KEY");
        assert_eq!(config.overlay.mobile_breakpoint, 768.0);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"max_chunk_size": 400, "cache": {"max_size": 5}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_chunk_size, 400);
        assert_eq!(config.cache.max_size, 5);
        // Other fields should have defaults
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.max_text_length, 10_000);
    }

    #[test]
    fn test_validate_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_threshold() {
        let mut config = Config::default();
        config.cache.invalidation_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_breakpoints() {
        let mut config = Config::default();
        config.overlay.mobile_breakpoint = 2000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("absent.json");
        let config = Config::load(&path.to_string_lossy()).unwrap();
        assert_eq!(config, Config::default());
        // Only the default path gets a generated template
        assert!(!path.exists());
    }

    #[test]
    fn test_load_invalid_json_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = Config::load(&path.to_string_lossy()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("proofmark.json");
        let path = path.to_string_lossy();
        let mut config = Config::default();
        config.debounce_ms = 250;
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.debounce_ms, 250);
    }
}
