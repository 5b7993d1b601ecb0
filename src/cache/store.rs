//! Global cache store with priority eviction, circuit breaking and memory-pressure handling

use crate::cache::{
    breaker::CircuitBreaker,
    clock::{to_chrono, Clock, SystemClock},
    config::CacheConfig,
    entry::CacheEntry,
    types::{CacheKey, CacheStats, CacheValue, CircuitState, MemoryPressure, Priority},
};
use crate::error::{ResolveError, Result};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// More evictions than this inside the window count as a storm
const STORM_EVICTION_THRESHOLD: usize = 100;

/// Trailing window over which evictions are counted
const STORM_WINDOW: Duration = Duration::from_secs(10);

/// How long ceilings stay raised once a storm is detected
const STORM_DAMPING_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Options for a single `set`
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Protocol of the reference the value was resolved from
    pub protocol: String,

    /// Overrides the configured default TTL
    pub ttl: Option<Duration>,

    pub tags: Vec<String>,

    /// Defaults to [`Priority::Normal`]
    pub priority: Option<Priority>,

    /// How long the resolution took, rewards keeping expensive values
    pub resolution_cost_ms: u64,
}

impl SetOptions {
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_resolution_cost(mut self, cost_ms: u64) -> Self {
        self.resolution_cost_ms = cost_ms;
        self
    }
}

/// Shared, resource-bounded cache for resolved references
///
/// This implementation provides:
/// - Serialized async access through a single mutex
/// - TTL expiration checked on read and by a background sweep
/// - Score-based eviction that respects entry priority and a size floor
/// - A circuit breaker isolating internal failures
/// - Memory-pressure relief and eviction-storm damping
///
/// While the circuit is open, reads count as misses and writes, deletes and
/// clears are skipped.
///
/// The handle is cheap to clone; every clone shares the same storage.
/// Background tasks hold only a weak reference and stop once the last
/// handle is dropped or [`GlobalCache::cleanup`] is called.
#[derive(Debug, Clone)]
pub struct GlobalCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    store: Mutex<CacheStore>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Internal cache storage
#[derive(Debug)]
struct CacheStore {
    /// Main storage: key -> entry
    entries: HashMap<CacheKey, CacheEntry>,

    /// Running counters; derived fields are filled in on snapshot
    stats: CacheStats,

    /// Sum of resolution costs of live entries
    total_resolution_cost_ms: u64,

    breaker: CircuitBreaker,

    /// Timestamps of evictions inside the storm window
    recent_evictions: VecDeque<DateTime<Utc>>,

    /// Ceilings are raised until this instant
    storm_active_until: Option<DateTime<Utc>>,

    #[cfg(test)]
    injected_failures: u32,
}

impl GlobalCache {
    /// Create a cache on the wall clock
    ///
    /// Background maintenance tasks are spawned when called inside a tokio
    /// runtime; otherwise only on-demand sweeps run.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        info!("Initializing global cache with config: {:?}", config);

        let store = CacheStore {
            entries: HashMap::new(),
            stats: CacheStats::default(),
            total_resolution_cost_ms: 0,
            breaker: CircuitBreaker::new(
                config.enable_circuit_breaker,
                config.circuit_breaker_threshold,
                config.circuit_breaker_reset_timeout,
            ),
            recent_evictions: VecDeque::new(),
            storm_active_until: None,
            #[cfg(test)]
            injected_failures: 0,
        };

        let cache = Self {
            inner: Arc::new(CacheInner {
                config,
                clock,
                store: Mutex::new(store),
                tasks: std::sync::Mutex::new(Vec::new()),
            }),
        };
        cache.start_background_tasks();
        cache
    }

    /// The configuration this cache was built with
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Get a live entry, counting a hit or a miss
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = self.now();
        let mut store = self.inner.store.lock().await;

        if !store.breaker.allow(now) {
            debug!("Cache circuit open, treating lookup as miss: {}", key);
            store.stats.misses += 1;
            return None;
        }

        match store.lookup(key, now) {
            Ok(found) => {
                store.breaker.record_success();
                found
            }
            Err(e) => {
                warn!("Cache lookup failed for {}: {}", key, e);
                store.breaker.record_failure(now);
                store.stats.misses += 1;
                None
            }
        }
    }

    /// Insert or replace an entry
    ///
    /// Returns `false` when the value is rejected for size or pressure, when
    /// eviction cannot make room, or when the circuit is open.
    pub async fn set(
        &self,
        key: impl Into<CacheKey>,
        value: CacheValue,
        options: SetOptions,
    ) -> bool {
        let key = key.into();
        let now = self.now();
        let config = &self.inner.config;
        let mut store = self.inner.store.lock().await;

        if !store.breaker.allow(now) {
            debug!("Cache circuit open, skipping insert: {}", key);
            return false;
        }

        let entry = build_entry(config, key, value, options, now);
        match store.insert(config, entry, now) {
            Ok(inserted) => {
                store.breaker.record_success();
                inserted
            }
            Err(e) => {
                warn!("Cache insert failed: {}", e);
                store.breaker.record_failure(now);
                false
            }
        }
    }

    /// Remove a specific entry
    pub async fn delete(&self, key: &str) -> bool {
        let now = self.now();
        let mut store = self.inner.store.lock().await;

        if !store.breaker.allow(now) {
            debug!("Cache circuit open, skipping delete: {}", key);
            return false;
        }

        match store.remove_entry(key) {
            Ok(removed) => {
                store.breaker.record_success();
                if removed.is_some() {
                    debug!("Removed cache entry: {}", key);
                }
                removed.is_some()
            }
            Err(e) => {
                warn!("Cache delete failed for {}: {}", key, e);
                store.breaker.record_failure(now);
                false
            }
        }
    }

    /// Remove everything, or only entries carrying any of `tags`
    pub async fn clear(&self, tags: Option<&[String]>) -> usize {
        let now = self.now();
        let mut store = self.inner.store.lock().await;

        if !store.breaker.allow(now) {
            debug!("Cache circuit open, skipping clear");
            return 0;
        }

        let Some(tags) = tags else {
            let count = store.entries.len();
            store.reset_storage();
            info!("Cleared {} entries from cache", count);
            return count;
        };

        let keys: Vec<CacheKey> = store
            .entries
            .iter()
            .filter(|(_, entry)| tags.iter().any(|tag| entry.has_tag(tag)))
            .map(|(key, _)| key.clone())
            .collect();

        let removed = self.remove_keys(&mut store, &keys);
        info!("Cleared {} entries with tags {:?}", removed, tags);
        removed
    }

    /// Remove every entry whose key starts with `prefix`
    pub async fn clear_by_prefix(&self, prefix: &str) -> usize {
        let now = self.now();
        let mut store = self.inner.store.lock().await;

        if !store.breaker.allow(now) {
            debug!("Cache circuit open, skipping clear of prefix {}", prefix);
            return 0;
        }

        let keys: Vec<CacheKey> = store
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();

        let removed = self.remove_keys(&mut store, &keys);
        debug!("Cleared {} entries with prefix {}", removed, prefix);
        removed
    }

    /// Remove all expired entries
    pub async fn cleanup_expired(&self) -> usize {
        let now = self.now();
        let mut store = self.inner.store.lock().await;

        let expired: Vec<CacheKey> = store
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        let removed = self.remove_keys(&mut store, &expired);
        store.stats.expired_removed += removed as u64;

        if removed > 0 {
            debug!("Cleaned up {} expired entries", removed);
        }
        removed
    }

    /// Proactively shed entries under high or critical pressure
    ///
    /// Removes 30% of entries at `High` and 50% at `Critical`, lowest eviction
    /// score first. Critical-priority entries are never removed here.
    pub async fn handle_memory_pressure(&self) -> usize {
        let now = self.now();
        let config = &self.inner.config;
        let mut store = self.inner.store.lock().await;

        let pressure = store.pressure(config, now);
        let fraction = pressure.relief_fraction();
        if fraction == 0.0 {
            return 0;
        }

        let target = (store.entries.len() as f64 * fraction).floor() as usize;
        let (max_entries, _) = store.effective_limits(config, now);
        let floor = eviction_floor(config, max_entries);

        let mut candidates: Vec<(f64, CacheKey)> = store
            .entries
            .values()
            .filter(|entry| entry.metadata.priority != Priority::Critical)
            .map(|entry| (entry.eviction_score(now), entry.key.clone()))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut removed = 0;
        for (_, key) in candidates.into_iter().take(target) {
            if store.entries.len() <= floor {
                break;
            }
            match store.remove_entry(&key) {
                Ok(Some(_)) => {
                    removed += 1;
                    store.stats.evicted += 1;
                    store.record_eviction(now);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Memory pressure relief failed: {}", e);
                    store.breaker.record_failure(now);
                    break;
                }
            }
        }

        info!(
            "Memory pressure {}: removed {} of {} targeted entries",
            pressure, removed, target
        );
        removed
    }

    /// Record a failed refresh for an entry, lowering its eviction score
    pub async fn record_failure(&self, key: &str) -> bool {
        let now = self.now();
        let mut store = self.inner.store.lock().await;

        match store.entries.get_mut(key) {
            Some(entry) => {
                entry.mark_failed(now);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the cache statistics
    pub async fn get_stats(&self) -> CacheStats {
        let now = self.now();
        let config = &self.inner.config;
        let mut store = self.inner.store.lock().await;

        let memory_pressure = store.pressure(config, now);
        let mut stats = store.stats.clone();
        stats.memory_pressure = memory_pressure;
        stats.circuit_breaker_state = store.breaker.state();
        stats.avg_resolution_cost_ms = if stats.total_entries == 0 {
            0.0
        } else {
            store.total_resolution_cost_ms as f64 / stats.total_entries as f64
        };
        stats.refresh_derived();
        stats
    }

    /// Current memory-pressure classification
    pub async fn memory_pressure(&self) -> MemoryPressure {
        let now = self.now();
        let mut store = self.inner.store.lock().await;
        store.pressure(&self.inner.config, now)
    }

    /// Current circuit breaker state (as last observed by an operation)
    pub async fn circuit_state(&self) -> CircuitState {
        self.inner.store.lock().await.breaker.state()
    }

    /// Check if a key exists (without updating access metadata)
    pub async fn contains_key(&self, key: &str) -> bool {
        self.inner.store.lock().await.entries.contains_key(key)
    }

    /// Get number of entries in cache
    pub async fn len(&self) -> usize {
        self.inner.store.lock().await.entries.len()
    }

    /// Check if cache is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.store.lock().await.entries.is_empty()
    }

    /// Stop background tasks and drop all entries; safe to call repeatedly
    pub async fn cleanup(&self) {
        let handles: Vec<JoinHandle<()>> = match self.inner.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        let stopped = handles.len();
        for handle in handles {
            handle.abort();
        }

        let mut store = self.inner.store.lock().await;
        store.reset_storage();

        if stopped > 0 {
            info!("Global cache cleaned up ({} background tasks stopped)", stopped);
        }
    }

    fn remove_keys(&self, store: &mut CacheStore, keys: &[CacheKey]) -> usize {
        let mut removed = 0;
        for key in keys {
            match store.remove_entry(key) {
                Ok(Some(_)) => removed += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to remove cache entry {}: {}", key, e);
                    store.breaker.record_failure(self.now());
                }
            }
        }
        removed
    }

    fn start_background_tasks(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No tokio runtime available, background cache maintenance disabled");
            return;
        };
        let config = &self.inner.config;
        let mut handles = Vec::new();

        if config.enable_auto_cleanup {
            if config.cleanup_interval.is_zero() {
                warn!("cleanup_interval is zero, automatic expiry sweep disabled");
            } else {
                handles.push(runtime.spawn(run_expiry_sweep(
                    Arc::downgrade(&self.inner),
                    config.cleanup_interval,
                )));
            }
        }

        if config.enable_memory_monitoring {
            if config.memory_check_interval.is_zero() {
                warn!("memory_check_interval is zero, memory monitoring disabled");
            } else {
                handles.push(runtime.spawn(run_memory_monitor(
                    Arc::downgrade(&self.inner),
                    config.memory_check_interval,
                )));
            }
        }

        match self.inner.tasks.lock() {
            Ok(mut tasks) => tasks.extend(handles),
            Err(poisoned) => poisoned.into_inner().extend(handles),
        }
    }

    #[cfg(test)]
    pub(crate) async fn inject_failures(&self, count: u32) {
        self.inner.store.lock().await.injected_failures = count;
    }
}

/// Background task for automatic expiry sweeps
async fn run_expiry_sweep(inner: Weak<CacheInner>, interval: Duration) {
    info!("Starting automatic cache cleanup task (interval: {:?})", interval);

    let mut ticker = tokio::time::interval(interval);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else { break };
        let cache = GlobalCache { inner };

        let removed = cache.cleanup_expired().await;
        if removed > 0 {
            debug!("Auto cleanup: removed {} expired entries", removed);
        }
    }
}

/// Background task for memory-pressure checks
async fn run_memory_monitor(inner: Weak<CacheInner>, interval: Duration) {
    info!("Starting cache memory monitor (interval: {:?})", interval);

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else { break };
        let cache = GlobalCache { inner };

        let (pressure, ratio) = {
            let now = cache.now();
            let mut store = cache.inner.store.lock().await;
            let ratio = store.usage_ratio(&cache.inner.config, now);
            (MemoryPressure::from_ratio(ratio), ratio)
        };

        if ratio >= cache.inner.config.memory_pressure_threshold {
            warn!(
                "Cache usage at {:.0}% of capacity (pressure: {})",
                ratio * 100.0,
                pressure
            );
        }

        if pressure >= MemoryPressure::High {
            cache.handle_memory_pressure().await;
        }
    }
}

fn build_entry(
    config: &CacheConfig,
    key: CacheKey,
    value: CacheValue,
    options: SetOptions,
    now: DateTime<Utc>,
) -> CacheEntry {
    let ttl = options.ttl.unwrap_or_else(|| config.ttl_with_jitter());
    let mut entry = CacheEntry::new(key, value, ttl, options.protocol, now);
    entry.metadata.priority = options.priority.unwrap_or_default();
    entry.metadata.resolution_cost_ms = options.resolution_cost_ms;
    for tag in options.tags {
        entry.add_tag(tag);
    }
    entry
}

/// Entry count eviction may not go below; never more than capacity allows
fn eviction_floor(config: &CacheConfig, max_entries: usize) -> usize {
    config.min_cache_size.min(max_entries.saturating_sub(1))
}

impl CacheStore {
    fn lookup(&mut self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        self.take_injected_failure()?;

        let expired = match self.entries.get(key) {
            None => {
                debug!("Cache miss: {}", key);
                self.stats.misses += 1;
                return Ok(None);
            }
            Some(entry) => entry.is_expired_at(now),
        };

        if expired {
            debug!("Cache entry expired: {}", key);
            self.remove_entry(key)?;
            self.stats.expired_removed += 1;
            self.stats.misses += 1;
            return Ok(None);
        }

        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| ResolveError::Cache(format!("entry vanished during lookup: {}", key)))?;
        entry.mark_accessed(now);
        let snapshot = entry.clone();

        self.stats.hits += 1;
        self.stats
            .by_protocol
            .entry(snapshot.metadata.protocol.clone())
            .or_default()
            .hits += 1;

        debug!("Cache hit: {}", key);
        Ok(Some(snapshot))
    }

    fn insert(&mut self, config: &CacheConfig, entry: CacheEntry, now: DateTime<Utc>) -> Result<bool> {
        self.take_injected_failure()?;

        let size = entry.metadata.size_bytes;
        let priority = entry.metadata.priority;

        if size > config.max_entry_size_bytes {
            warn!(
                "Rejecting cache entry {}: {} bytes exceeds per-entry limit of {}",
                entry.key, size, config.max_entry_size_bytes
            );
            self.stats.out_of_memory_events += 1;
            return Ok(false);
        }

        let pressure = self.pressure(config, now);
        if pressure == MemoryPressure::Critical && priority == Priority::Low {
            warn!("Rejecting low-priority entry {} under critical memory pressure", entry.key);
            self.stats.out_of_memory_events += 1;
            return Ok(false);
        }

        // a replaced entry's room is credited; it is only dropped once the insert is certain
        let (replaced_count, replaced_bytes) = match self.entries.get(&entry.key) {
            Some(existing) => (1, existing.metadata.size_bytes),
            None => (0, 0),
        };

        let (max_entries, max_size) = self.effective_limits(config, now);
        let needed_count = (self.entries.len() + 1 - replaced_count).saturating_sub(max_entries);
        let needed_bytes = (self.stats.total_size_bytes + size)
            .saturating_sub(replaced_bytes)
            .saturating_sub(max_size);

        if (needed_count > 0 || needed_bytes > 0)
            && !self.evict(
                config,
                now,
                &entry.key,
                needed_bytes,
                needed_count,
                priority,
                pressure,
                max_entries,
            )?
        {
            warn!(
                "Cache starvation: could not free {} bytes / {} entries for {}",
                needed_bytes, needed_count, entry.key
            );
            self.stats.starvation_events += 1;
            return Ok(false);
        }

        if self.remove_entry(&entry.key)?.is_some() {
            debug!("Replacing existing cache entry: {}", entry.key);
        }

        debug!("Inserting cache entry: {}", entry.key);
        self.account_insert(&entry);
        self.entries.insert(entry.key.clone(), entry);
        Ok(true)
    }

    /// Evict lowest-ranked eligible entries; true when enough room was freed
    #[allow(clippy::too_many_arguments)]
    fn evict(
        &mut self,
        config: &CacheConfig,
        now: DateTime<Utc>,
        incoming_key: &str,
        needed_bytes: usize,
        needed_count: usize,
        incoming: Priority,
        pressure: MemoryPressure,
        max_entries: usize,
    ) -> Result<bool> {
        let floor = eviction_floor(config, max_entries);

        let mut candidates: Vec<(f64, CacheKey)> = self
            .entries
            .values()
            .filter(|entry| entry.key != incoming_key)
            .filter(|entry| is_evictable(entry.metadata.priority, incoming, pressure))
            .map(|entry| (eviction_rank(config, entry, now), entry.key.clone()))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut freed_bytes = 0;
        let mut freed_count = 0;

        for (_, key) in candidates {
            if freed_bytes >= needed_bytes && freed_count >= needed_count {
                break;
            }
            if self.entries.len() <= floor {
                debug!("Eviction stopped at size floor of {} entries", floor);
                break;
            }
            if let Some(evicted) = self.remove_entry(&key)? {
                debug!("Evicting cache entry: {}", key);
                freed_bytes += evicted.metadata.size_bytes;
                freed_count += 1;
                self.stats.evicted += 1;
                self.record_eviction(now);
            }
        }

        Ok(freed_bytes >= needed_bytes && freed_count >= needed_count)
    }

    fn remove_entry(&mut self, key: &str) -> Result<Option<CacheEntry>> {
        match self.entries.remove(key) {
            Some(entry) => {
                self.account_remove(&entry)?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn account_insert(&mut self, entry: &CacheEntry) {
        let m = &entry.metadata;
        self.stats.total_entries += 1;
        self.stats.total_size_bytes += m.size_bytes;
        self.total_resolution_cost_ms += m.resolution_cost_ms;

        let proto = self.stats.by_protocol.entry(m.protocol.clone()).or_default();
        proto.entries += 1;
        proto.size_bytes += m.size_bytes;
    }

    fn account_remove(&mut self, entry: &CacheEntry) -> Result<()> {
        let m = &entry.metadata;
        let underflow = || ResolveError::Cache(format!("accounting underflow removing {}", entry.key));

        self.stats.total_entries = self.stats.total_entries.checked_sub(1).ok_or_else(underflow)?;
        self.stats.total_size_bytes = self
            .stats
            .total_size_bytes
            .checked_sub(m.size_bytes)
            .ok_or_else(underflow)?;
        self.total_resolution_cost_ms = self
            .total_resolution_cost_ms
            .saturating_sub(m.resolution_cost_ms);

        let proto = self
            .stats
            .by_protocol
            .get_mut(&m.protocol)
            .ok_or_else(underflow)?;
        proto.entries = proto.entries.checked_sub(1).ok_or_else(underflow)?;
        proto.size_bytes = proto.size_bytes.saturating_sub(m.size_bytes);
        Ok(())
    }

    fn reset_storage(&mut self) {
        self.entries.clear();
        self.stats.total_entries = 0;
        self.stats.total_size_bytes = 0;
        self.total_resolution_cost_ms = 0;
        for proto in self.stats.by_protocol.values_mut() {
            proto.entries = 0;
            proto.size_bytes = 0;
        }
    }

    fn record_eviction(&mut self, now: DateTime<Utc>) {
        self.recent_evictions.push_back(now);
        let window_start = now - to_chrono(STORM_WINDOW);
        while self
            .recent_evictions
            .front()
            .is_some_and(|at| *at < window_start)
        {
            self.recent_evictions.pop_front();
        }

        if self.recent_evictions.len() > STORM_EVICTION_THRESHOLD && !self.storm_active(now) {
            warn!(
                "Eviction storm detected ({} evictions in {:?}), raising cache ceilings by 20%",
                self.recent_evictions.len(),
                STORM_WINDOW
            );
            self.storm_active_until = Some(now + to_chrono(STORM_DAMPING_PERIOD));
            self.stats.eviction_storms += 1;
        }
    }

    fn storm_active(&mut self, now: DateTime<Utc>) -> bool {
        match self.storm_active_until {
            Some(until) if now < until => true,
            Some(_) => {
                info!("Eviction storm damping ended, restoring cache ceilings");
                self.storm_active_until = None;
                false
            }
            None => false,
        }
    }

    /// (max_entries, max_size_bytes), raised by 20% during a storm
    fn effective_limits(&mut self, config: &CacheConfig, now: DateTime<Utc>) -> (usize, usize) {
        if self.storm_active(now) {
            (
                config.max_entries + config.max_entries / 5,
                config.max_size_bytes + config.max_size_bytes / 5,
            )
        } else {
            (config.max_entries, config.max_size_bytes)
        }
    }

    fn usage_ratio(&mut self, config: &CacheConfig, now: DateTime<Utc>) -> f64 {
        let (max_entries, max_size) = self.effective_limits(config, now);
        let size_ratio = self.stats.total_size_bytes as f64 / max_size.max(1) as f64;
        let count_ratio = self.entries.len() as f64 / max_entries.max(1) as f64;
        size_ratio.max(count_ratio)
    }

    fn pressure(&mut self, config: &CacheConfig, now: DateTime<Utc>) -> MemoryPressure {
        MemoryPressure::from_ratio(self.usage_ratio(config, now))
    }

    #[cfg(test)]
    fn take_injected_failure(&mut self) -> Result<()> {
        if self.injected_failures > 0 {
            self.injected_failures -= 1;
            return Err(ResolveError::Cache("injected failure".to_string()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn take_injected_failure(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Never evict higher-priority entries, and critical ones only under critical pressure
fn is_evictable(candidate: Priority, incoming: Priority, pressure: MemoryPressure) -> bool {
    candidate <= incoming
        && (candidate != Priority::Critical || pressure == MemoryPressure::Critical)
}

fn eviction_rank(config: &CacheConfig, entry: &CacheEntry, now: DateTime<Utc>) -> f64 {
    if config.enable_priority_eviction {
        entry.eviction_score(now)
    } else if config.enable_lru {
        entry.metadata.last_accessed_at.timestamp_millis() as f64
    } else {
        entry.metadata.created_at.timestamp_millis() as f64
    }
}
