//! Cache entry management with TTL support

use crate::cache::clock::{millis_between, to_chrono};
use crate::cache::types::{CacheKey, CacheValue, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Recency bonus window of the eviction score (one hour)
const RECENCY_WINDOW_MS: u64 = 3_600_000;

/// A cache entry with TTL and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cache key
    pub key: CacheKey,

    /// The cached value
    pub value: CacheValue,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    /// Create a new entry; it counts as accessed once by the insert itself
    pub fn new(
        key: CacheKey,
        value: CacheValue,
        ttl: Duration,
        protocol: String,
        now: DateTime<Utc>,
    ) -> Self {
        let size_bytes = estimate_size(&value);

        Self {
            key,
            value,
            metadata: CacheMetadata {
                created_at: now,
                last_accessed_at: now,
                ttl,
                access_count: 1,
                size_bytes,
                protocol,
                tags: Vec::new(),
                priority: Priority::Normal,
                failure_count: 0,
                last_failure_at: None,
                resolution_cost_ms: 0,
            },
        }
    }

    /// When the entry stops being served
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.metadata.created_at + to_chrono(self.metadata.ttl)
    }

    /// Check if the entry has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    /// Time left before expiry, `None` once expired
    pub fn time_until_expiration(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.is_expired_at(now) {
            None
        } else {
            (self.expires_at() - now).to_std().ok()
        }
    }

    /// Mark the entry as accessed (updates access time and count)
    pub fn mark_accessed(&mut self, now: DateTime<Utc>) {
        self.metadata.last_accessed_at = now;
        self.metadata.access_count += 1;
    }

    /// Record a failed refresh of this entry's reference
    pub fn mark_failed(&mut self, now: DateTime<Utc>) {
        self.metadata.failure_count += 1;
        self.metadata.last_failure_at = Some(now);
    }

    /// Add a tag to the entry for categorization
    pub fn add_tag(&mut self, tag: String) {
        if !self.metadata.tags.contains(&tag) {
            self.metadata.tags.push(tag);
        }
    }

    /// Check if entry has a specific tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.tags.iter().any(|t| t == tag)
    }

    /// Eviction score; lower scores are evicted first
    ///
    /// `priority×1000 + access_count×100 + recency bonus (≤3600) +
    /// resolution_cost_ms/10 − failure_count×50 − size_bytes/1024`
    pub fn eviction_score(&self, now: DateTime<Utc>) -> f64 {
        let m = &self.metadata;
        let idle_ms = millis_between(m.last_accessed_at, now);
        let recency = RECENCY_WINDOW_MS.saturating_sub(idle_ms) as f64 / 1000.0;

        (m.priority.weight() * 1000) as f64
            + m.access_count as f64 * 100.0
            + recency
            + m.resolution_cost_ms as f64 / 10.0
            - m.failure_count as f64 * 50.0
            - m.size_bytes as f64 / 1024.0
    }
}

/// Estimate the in-memory footprint of a value
///
/// Strings count two bytes per character, arrays and objects two bytes per
/// character of their JSON encoding, scalars a flat eight bytes.
pub fn estimate_size(value: &CacheValue) -> usize {
    match value {
        CacheValue::String(s) => s.chars().count() * 2,
        CacheValue::Array(_) | CacheValue::Object(_) => value.to_string().chars().count() * 2,
        CacheValue::Null | CacheValue::Bool(_) | CacheValue::Number(_) => 8,
    }
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the entry was created
    pub created_at: DateTime<Utc>,

    /// Last access time (for LRU tracking)
    pub last_accessed_at: DateTime<Utc>,

    /// Time-to-live from creation
    pub ttl: Duration,

    /// Number of times this entry has been accessed, including the insert
    pub access_count: u64,

    /// Estimated size of the value in bytes
    pub size_bytes: usize,

    /// Protocol of the reference this value resolved
    pub protocol: String,

    /// Tags for categorization and selective clearing
    pub tags: Vec<String>,

    pub priority: Priority,

    pub failure_count: u32,

    pub last_failure_at: Option<DateTime<Utc>>,

    /// How long the original resolution took
    pub resolution_cost_ms: u64,
}
