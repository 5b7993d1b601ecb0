//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Cache key type - reference plus its resolver options, see [`CacheKeyBuilder`](super::CacheKeyBuilder)
pub type CacheKey = String;

/// Cache value type - any configuration value
pub type CacheValue = serde_json::Value;

/// Eviction priority of an entry
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Weight used by the eviction score
    pub fn weight(self) -> i64 {
        match self {
            Priority::Low => 1,
            Priority::Normal => 2,
            Priority::High => 3,
            Priority::Critical => 4,
        }
    }

    /// Parse a priority name, case-insensitive
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            "critical" => Some(Priority::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

/// Coarse classification of how close the cache is to its ceilings
///
/// Variants are declared in ascending order so levels compare by rank.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPressure {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl MemoryPressure {
    /// Classify a usage ratio (0.0 - 1.0+)
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 0.95 {
            MemoryPressure::Critical
        } else if ratio >= 0.85 {
            MemoryPressure::High
        } else if ratio >= 0.70 {
            MemoryPressure::Medium
        } else {
            MemoryPressure::Low
        }
    }

    /// Fraction of entries proactively removed at this level
    pub fn relief_fraction(self) -> f64 {
        match self {
            MemoryPressure::Critical => 0.5,
            MemoryPressure::High => 0.3,
            MemoryPressure::Medium | MemoryPressure::Low => 0.0,
        }
    }
}

impl fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryPressure::Low => write!(f, "low"),
            MemoryPressure::Medium => write!(f, "medium"),
            MemoryPressure::High => write!(f, "high"),
            MemoryPressure::Critical => write!(f, "critical"),
        }
    }
}

/// State of the cache's own circuit breaker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Per-protocol slice of the cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStats {
    pub entries: usize,
    pub size_bytes: usize,
    pub hits: u64,
}

/// Statistics and metrics for cache monitoring
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheStats {
    /// Number of live entries
    pub total_entries: usize,

    /// Estimated size of all live values in bytes
    pub total_size_bytes: usize,

    /// Total number of cache hits
    pub hits: u64,

    /// Total number of cache misses
    pub misses: u64,

    /// Entries removed because their TTL passed
    pub expired_removed: u64,

    /// Entries removed to make room or relieve pressure
    pub evicted: u64,

    /// hits / (hits + misses), 0.0 before any lookup
    pub hit_ratio: f64,

    /// Breakdown by reference protocol
    pub by_protocol: HashMap<String, ProtocolStats>,

    pub memory_pressure: MemoryPressure,

    pub circuit_breaker_state: CircuitState,

    /// Number of times storm damping was activated
    pub eviction_storms: u64,

    /// Inserts rejected for size or under critical pressure
    pub out_of_memory_events: u64,

    /// Inserts rejected because eviction could not free room
    pub starvation_events: u64,

    /// Mean resolution cost of live entries
    pub avg_resolution_cost_ms: f64,

    /// Overall health score (0-100)
    pub efficiency_score: f64,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        self.hit_ratio * 100.0
    }

    /// Recompute the derived ratio and score fields from the counters
    pub(crate) fn refresh_derived(&mut self) {
        let lookups = self.hits + self.misses;
        self.hit_ratio = if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        };
        self.efficiency_score = self.compute_efficiency_score();
    }

    /// Calculate cache efficiency score (0-100)
    /// Based on hit rate, eviction churn and capacity rejections
    fn compute_efficiency_score(&self) -> f64 {
        let eviction_penalty = if self.total_entries > 0 || self.evicted > 0 {
            (self.evicted as f64 / (self.total_entries as f64 + self.evicted as f64)) * 20.0
        } else {
            0.0
        };
        let starvation_penalty = (self.starvation_events + self.out_of_memory_events).min(10) as f64;
        let pressure_penalty = match self.memory_pressure {
            MemoryPressure::Critical => 10.0,
            MemoryPressure::High => 5.0,
            _ => 0.0,
        };

        (self.hit_rate() - eviction_penalty - starvation_penalty - pressure_penalty)
            .clamp(0.0, 100.0)
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, size: {} bytes, evicted: {}, pressure: {}, breaker: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.total_entries,
            self.total_size_bytes,
            self.evicted,
            self.memory_pressure,
            self.circuit_breaker_state
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::High < Priority::Critical);
        assert_eq!(Priority::default(), Priority::Normal);
        assert_eq!(Priority::parse("HIGH"), Some(Priority::High));
        assert_eq!(Priority::parse("urgent"), None);
    }

    #[test]
    fn test_memory_pressure_classification() {
        assert_eq!(MemoryPressure::from_ratio(0.10), MemoryPressure::Low);
        assert_eq!(MemoryPressure::from_ratio(0.70), MemoryPressure::Medium);
        assert_eq!(MemoryPressure::from_ratio(0.86), MemoryPressure::High);
        assert_eq!(MemoryPressure::from_ratio(0.95), MemoryPressure::Critical);
        assert_eq!(MemoryPressure::from_ratio(1.30), MemoryPressure::Critical);
    }

    #[test]
    fn test_memory_pressure_ranks_by_ordinal() {
        // lexicographically "high" < "low", the ranking must not follow the labels
        assert!(MemoryPressure::High > MemoryPressure::Low);
        assert!(MemoryPressure::Medium < MemoryPressure::High);
        assert!(MemoryPressure::Critical >= MemoryPressure::High);
    }

    #[test]
    fn test_cache_stats_hit_ratio() {
        let mut stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        stats.refresh_derived();

        assert_eq!(stats.hit_ratio, 0.8);
        assert_eq!(stats.hit_rate(), 80.0);
    }

    #[test]
    fn test_cache_stats_zero_requests() {
        let mut stats = CacheStats::default();
        stats.refresh_derived();
        assert_eq!(stats.hit_ratio, 0.0);
        assert_eq!(stats.efficiency_score, 0.0);
    }

    #[test]
    fn test_cache_stats_efficiency_score() {
        let mut stats = CacheStats {
            hits: 90,
            misses: 10,
            total_entries: 100,
            evicted: 10,
            ..Default::default()
        };
        stats.refresh_derived();

        let score = stats.efficiency_score;
        assert!(score > 0.0 && score < 90.0);

        stats.memory_pressure = MemoryPressure::Critical;
        stats.refresh_derived();
        assert!(stats.efficiency_score < score);
    }

    #[test]
    fn test_cache_stats_display() {
        let stats = CacheStats {
            hits: 100,
            misses: 50,
            total_entries: 75,
            total_size_bytes: 1024,
            ..Default::default()
        };

        let display = format!("{}", stats);
        assert!(display.contains("hits: 100"));
        assert!(display.contains("misses: 50"));
        assert!(display.contains("breaker: closed"));
    }
}
