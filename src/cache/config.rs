//! Configuration for the global resolution cache

use crate::error::{ResolveError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the global cache
///
/// All fields have defaults sized for a single application process that
/// resolves a few thousand references:
/// - 10,000 entries / 100 MiB total, 10 MiB per entry
/// - 5 minute TTL, swept once a minute
/// - circuit breaker opens after 5 consecutive internal failures for 60s
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache
    pub max_entries: usize,

    /// Maximum total estimated size of cached values in bytes
    pub max_size_bytes: usize,

    /// Default time-to-live for entries set without an explicit TTL
    pub default_ttl: Duration,

    /// TTL jitter factor (0.0 - 1.0) applied to the default TTL only
    pub ttl_jitter: f64,

    /// Interval of the background expiry sweep
    pub cleanup_interval: Duration,

    /// Order eviction candidates by recency when priority eviction is off
    pub enable_lru: bool,

    /// Run the background expiry sweep
    pub enable_auto_cleanup: bool,

    /// Usage ratio at which the memory monitor starts warning
    pub memory_pressure_threshold: f64,

    /// Largest single entry accepted by `set`
    pub max_entry_size_bytes: usize,

    /// Isolate internal cache failures behind a circuit breaker
    pub enable_circuit_breaker: bool,

    /// Consecutive internal failures that open the breaker
    pub circuit_breaker_threshold: u32,

    /// How long the breaker stays open before probing again
    pub circuit_breaker_reset_timeout: Duration,

    /// Use the weighted eviction score instead of plain recency
    pub enable_priority_eviction: bool,

    /// Eviction never shrinks the cache below this many entries
    pub min_cache_size: usize,

    /// Run the background memory-pressure monitor
    pub enable_memory_monitoring: bool,

    /// Interval of the background memory-pressure check
    pub memory_check_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            // 100 MiB
            max_size_bytes: 100 * 1024 * 1024,
            default_ttl: Duration::from_secs(5 * 60),
            ttl_jitter: 0.0,
            cleanup_interval: Duration::from_secs(60),
            enable_lru: true,
            enable_auto_cleanup: true,
            memory_pressure_threshold: 0.8,
            // 10 MiB
            max_entry_size_bytes: 10 * 1024 * 1024,
            enable_circuit_breaker: true,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_timeout: Duration::from_secs(60),
            enable_priority_eviction: true,
            min_cache_size: 100,
            enable_memory_monitoring: true,
            memory_check_interval: Duration::from_secs(30),
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(ResolveError::Config(
                "max_entries must be greater than 0".to_string(),
            ));
        }

        if self.max_size_bytes == 0 {
            return Err(ResolveError::Config(
                "max_size_bytes must be greater than 0".to_string(),
            ));
        }

        if self.max_entry_size_bytes > self.max_size_bytes {
            return Err(ResolveError::Config(
                "max_entry_size_bytes must not exceed max_size_bytes".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            return Err(ResolveError::Config(
                "ttl_jitter must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.memory_pressure_threshold) {
            return Err(ResolveError::Config(
                "memory_pressure_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.enable_circuit_breaker && self.circuit_breaker_threshold == 0 {
            return Err(ResolveError::Config(
                "circuit_breaker_threshold must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Calculate the default TTL with jitter applied
    pub fn ttl_with_jitter(&self) -> Duration {
        if self.ttl_jitter == 0.0 {
            return self.default_ttl;
        }

        let base_secs = self.default_ttl.as_secs_f64();
        let jitter_range = base_secs * self.ttl_jitter;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let final_secs = (base_secs + jitter).max(0.001);

        Duration::from_secs_f64(final_secs)
    }

    /// Apply `CONFREF_CACHE_*` environment overrides on top of the defaults
    ///
    /// Recognised variables: `MAX_ENTRIES`, `MAX_SIZE_BYTES`, `DEFAULT_TTL_MS`,
    /// `CLEANUP_INTERVAL_MS`, `MIN_CACHE_SIZE`, `CIRCUIT_BREAKER_THRESHOLD`,
    /// `CIRCUIT_BREAKER_RESET_TIMEOUT_MS`, `ENABLE_CIRCUIT_BREAKER`,
    /// `ENABLE_MEMORY_MONITORING`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(v) = parse_var::<usize>(&lookup, "CONFREF_CACHE_MAX_ENTRIES")? {
            builder = builder.max_entries(v);
        }
        if let Some(v) = parse_var::<usize>(&lookup, "CONFREF_CACHE_MAX_SIZE_BYTES")? {
            builder = builder.max_size_bytes(v);
        }
        if let Some(v) = parse_var::<u64>(&lookup, "CONFREF_CACHE_DEFAULT_TTL_MS")? {
            builder = builder.default_ttl(Duration::from_millis(v));
        }
        if let Some(v) = parse_var::<u64>(&lookup, "CONFREF_CACHE_CLEANUP_INTERVAL_MS")? {
            builder = builder.cleanup_interval(Duration::from_millis(v));
        }
        if let Some(v) = parse_var::<usize>(&lookup, "CONFREF_CACHE_MIN_CACHE_SIZE")? {
            builder = builder.min_cache_size(v);
        }
        if let Some(v) = parse_var::<u32>(&lookup, "CONFREF_CACHE_CIRCUIT_BREAKER_THRESHOLD")? {
            builder = builder.circuit_breaker_threshold(v);
        }
        if let Some(v) =
            parse_var::<u64>(&lookup, "CONFREF_CACHE_CIRCUIT_BREAKER_RESET_TIMEOUT_MS")?
        {
            builder = builder.circuit_breaker_reset_timeout(Duration::from_millis(v));
        }
        if let Some(v) = parse_var::<bool>(&lookup, "CONFREF_CACHE_ENABLE_CIRCUIT_BREAKER")? {
            builder = builder.enable_circuit_breaker(v);
        }
        if let Some(v) = parse_var::<bool>(&lookup, "CONFREF_CACHE_ENABLE_MEMORY_MONITORING")? {
            builder = builder.enable_memory_monitoring(v);
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ResolveError::Config(format!("invalid value for {}: {:?}", name, raw))),
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    max_entries: Option<usize>,
    max_size_bytes: Option<usize>,
    default_ttl: Option<Duration>,
    ttl_jitter: Option<f64>,
    cleanup_interval: Option<Duration>,
    enable_lru: Option<bool>,
    enable_auto_cleanup: Option<bool>,
    memory_pressure_threshold: Option<f64>,
    max_entry_size_bytes: Option<usize>,
    enable_circuit_breaker: Option<bool>,
    circuit_breaker_threshold: Option<u32>,
    circuit_breaker_reset_timeout: Option<Duration>,
    enable_priority_eviction: Option<bool>,
    min_cache_size: Option<usize>,
    enable_memory_monitoring: Option<bool>,
    memory_check_interval: Option<Duration>,
}

impl CacheConfigBuilder {
    /// Set maximum number of cache entries
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Set maximum cache size in bytes
    pub fn max_size_bytes(mut self, size: usize) -> Self {
        self.max_size_bytes = Some(size);
        self
    }

    /// Set default TTL for cache entries
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Set TTL jitter factor (0.0 - 1.0)
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    /// Set expiry sweep interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Enable or disable recency ordering
    pub fn enable_lru(mut self, enable: bool) -> Self {
        self.enable_lru = Some(enable);
        self
    }

    /// Enable or disable the background expiry sweep
    pub fn enable_auto_cleanup(mut self, enable: bool) -> Self {
        self.enable_auto_cleanup = Some(enable);
        self
    }

    pub fn memory_pressure_threshold(mut self, threshold: f64) -> Self {
        self.memory_pressure_threshold = Some(threshold);
        self
    }

    /// Set the largest accepted entry size
    pub fn max_entry_size_bytes(mut self, size: usize) -> Self {
        self.max_entry_size_bytes = Some(size);
        self
    }

    pub fn enable_circuit_breaker(mut self, enable: bool) -> Self {
        self.enable_circuit_breaker = Some(enable);
        self
    }

    pub fn circuit_breaker_threshold(mut self, threshold: u32) -> Self {
        self.circuit_breaker_threshold = Some(threshold);
        self
    }

    pub fn circuit_breaker_reset_timeout(mut self, timeout: Duration) -> Self {
        self.circuit_breaker_reset_timeout = Some(timeout);
        self
    }

    /// Enable or disable score-based eviction
    pub fn enable_priority_eviction(mut self, enable: bool) -> Self {
        self.enable_priority_eviction = Some(enable);
        self
    }

    /// Set the eviction floor
    pub fn min_cache_size(mut self, size: usize) -> Self {
        self.min_cache_size = Some(size);
        self
    }

    pub fn enable_memory_monitoring(mut self, enable: bool) -> Self {
        self.enable_memory_monitoring = Some(enable);
        self
    }

    pub fn memory_check_interval(mut self, interval: Duration) -> Self {
        self.memory_check_interval = Some(interval);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            max_entries: self.max_entries.unwrap_or(defaults.max_entries),
            max_size_bytes: self.max_size_bytes.unwrap_or(defaults.max_size_bytes),
            default_ttl: self.default_ttl.unwrap_or(defaults.default_ttl),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
            cleanup_interval: self.cleanup_interval.unwrap_or(defaults.cleanup_interval),
            enable_lru: self.enable_lru.unwrap_or(defaults.enable_lru),
            enable_auto_cleanup: self
                .enable_auto_cleanup
                .unwrap_or(defaults.enable_auto_cleanup),
            memory_pressure_threshold: self
                .memory_pressure_threshold
                .unwrap_or(defaults.memory_pressure_threshold),
            max_entry_size_bytes: self
                .max_entry_size_bytes
                .unwrap_or(defaults.max_entry_size_bytes),
            enable_circuit_breaker: self
                .enable_circuit_breaker
                .unwrap_or(defaults.enable_circuit_breaker),
            circuit_breaker_threshold: self
                .circuit_breaker_threshold
                .unwrap_or(defaults.circuit_breaker_threshold),
            circuit_breaker_reset_timeout: self
                .circuit_breaker_reset_timeout
                .unwrap_or(defaults.circuit_breaker_reset_timeout),
            enable_priority_eviction: self
                .enable_priority_eviction
                .unwrap_or(defaults.enable_priority_eviction),
            min_cache_size: self.min_cache_size.unwrap_or(defaults.min_cache_size),
            enable_memory_monitoring: self
                .enable_memory_monitoring
                .unwrap_or(defaults.enable_memory_monitoring),
            memory_check_interval: self
                .memory_check_interval
                .unwrap_or(defaults.memory_check_interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, 10_000);
        assert_eq!(config.max_size_bytes, 100 * 1024 * 1024);
        assert_eq!(config.default_ttl, Duration::from_secs(300));
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        assert_eq!(config.circuit_breaker_threshold, 5);
        assert_eq!(config.min_cache_size, 100);
        assert!(config.enable_auto_cleanup);
        assert!(config.enable_priority_eviction);
    }

    #[test]
    fn test_config_validation() {
        assert!(CacheConfig::default().validate().is_ok());

        let mut invalid = CacheConfig::default();
        invalid.max_entries = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = CacheConfig::default();
        invalid.ttl_jitter = 1.5;
        assert!(invalid.validate().is_err());

        let mut invalid = CacheConfig::default();
        invalid.max_entry_size_bytes = invalid.max_size_bytes + 1;
        assert!(invalid.validate().is_err());

        let mut invalid = CacheConfig::default();
        invalid.circuit_breaker_threshold = 0;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .default_ttl(Duration::from_secs(600))
            .max_entries(5000)
            .max_size_bytes(50_000_000)
            .min_cache_size(0)
            .build();

        assert_eq!(config.default_ttl, Duration::from_secs(600));
        assert_eq!(config.max_entries, 5000);
        assert_eq!(config.max_size_bytes, 50_000_000);
        assert_eq!(config.min_cache_size, 0);
        assert_eq!(config.circuit_breaker_threshold, 5);
    }

    #[test]
    fn test_ttl_with_jitter() {
        let config = CacheConfig {
            default_ttl: Duration::from_secs(3600),
            ttl_jitter: 0.1,
            ..Default::default()
        };

        let ttl = config.ttl_with_jitter();
        assert!(ttl.as_secs_f64() >= 3600.0 - 360.0);
        assert!(ttl.as_secs_f64() <= 3600.0 + 360.0);

        let exact = CacheConfig::default();
        assert_eq!(exact.ttl_with_jitter(), exact.default_ttl);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CONFREF_CACHE_MAX_ENTRIES", "250"),
            ("CONFREF_CACHE_DEFAULT_TTL_MS", "1500"),
            ("CONFREF_CACHE_ENABLE_CIRCUIT_BREAKER", "false"),
        ]);

        let config = CacheConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.max_entries, 250);
        assert_eq!(config.default_ttl, Duration::from_millis(1500));
        assert!(!config.enable_circuit_breaker);
        assert_eq!(config.max_size_bytes, CacheConfig::default().max_size_bytes);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result = CacheConfig::from_lookup(|k| {
            (k == "CONFREF_CACHE_MAX_ENTRIES").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(ResolveError::Config(_))));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: CacheConfig = serde_json::from_str(r#"{"max_entries": 42}"#).unwrap();
        assert_eq!(config.max_entries, 42);
        assert_eq!(config.min_cache_size, 100);
    }
}
