//! Cache-backed resolver wrapper
//!
//! Wraps any [`Resolver`] so resolved values are served from and stored in a
//! shared [`GlobalCache`]. Three resolver options control how a value is
//! cached and are left out of the cache key:
//!
//! - `ttlMs`: time-to-live in milliseconds
//! - `priority`: `low`, `normal`, `high` or `critical`
//! - `tags`: list of tags for selective clearing

use crate::cache::{protocol_prefix, CacheKey, CacheKeyBuilder, GlobalCache, Priority, SetOptions};
use crate::error::{ResolveError, Result};
use crate::resolver::{BatchRequest, BatchResult, Resolver, ResolverOptions};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

const TTL_OPTION: &str = "ttlMs";
const PRIORITY_OPTION: &str = "priority";
const TAGS_OPTION: &str = "tags";

/// Resolver decorator consulting a shared cache before the wrapped resolver
pub struct CachingResolver<R> {
    inner: R,
    cache: GlobalCache,
}

impl<R: Resolver> CachingResolver<R> {
    pub fn new(inner: R, cache: GlobalCache) -> Self {
        Self { inner, cache }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn cache(&self) -> &GlobalCache {
        &self.cache
    }

    fn cache_key(&self, reference: &str, options: &ResolverOptions) -> CacheKey {
        options
            .iter()
            .filter(|(name, _)| !is_cache_control(name))
            .fold(CacheKeyBuilder::new(reference), |builder, (name, value)| {
                builder.param(name.as_str(), value.clone())
            })
            .build()
    }

    fn set_options(&self, options: &ResolverOptions, cost: Duration) -> SetOptions {
        let mut set = SetOptions::new(self.inner.protocol().to_ascii_lowercase())
            .with_resolution_cost(cost.as_millis() as u64);

        if let Some(ttl_ms) = options.get(TTL_OPTION).and_then(Value::as_u64) {
            set = set.with_ttl(Duration::from_millis(ttl_ms));
        }
        if let Some(priority) = options
            .get(PRIORITY_OPTION)
            .and_then(Value::as_str)
            .and_then(Priority::parse)
        {
            set = set.with_priority(priority);
        }
        if let Some(tags) = options.get(TAGS_OPTION).and_then(Value::as_array) {
            set = set.with_tags(
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            );
        }
        set
    }

    async fn store(&self, reference: &str, options: &ResolverOptions, value: &str, cost: Duration) {
        let key = self.cache_key(reference, options);
        let stored = self
            .cache
            .set(key, Value::String(value.to_string()), self.set_options(options, cost))
            .await;
        if !stored {
            debug!("Resolved value for {} was not cached", reference);
        }
    }
}

fn is_cache_control(name: &str) -> bool {
    matches!(name, TTL_OPTION | PRIORITY_OPTION | TAGS_OPTION)
}

#[async_trait]
impl<R: Resolver> Resolver for CachingResolver<R> {
    fn protocol(&self) -> &str {
        self.inner.protocol()
    }

    fn default_options(&self) -> ResolverOptions {
        self.inner.default_options()
    }

    async fn initialize(&self) -> Result<()> {
        self.inner.initialize().await
    }

    fn validate_reference(&self, reference: &str) -> bool {
        self.inner.validate_reference(reference)
    }

    async fn resolve(&self, reference: &str, options: &ResolverOptions) -> Result<String> {
        if let Some(cached) = self.get_cached(reference, options).await {
            return Ok(cached);
        }

        let started = Instant::now();
        match self.inner.resolve(reference, options).await {
            Ok(value) => {
                self.store(reference, options, &value, started.elapsed()).await;
                Ok(value)
            }
            Err(e) => {
                self.cache
                    .record_failure(&self.cache_key(reference, options))
                    .await;
                Err(e)
            }
        }
    }

    async fn cleanup(&self) -> Result<()> {
        self.inner.cleanup().await
    }

    fn supports_batch(&self) -> bool {
        self.inner.supports_batch()
    }

    async fn resolve_batch(&self, requests: Vec<BatchRequest>) -> Vec<BatchResult> {
        let mut results: Vec<Option<BatchResult>> = Vec::with_capacity(requests.len());
        let mut misses = Vec::new();

        for request in &requests {
            match self.get_cached(&request.reference, &request.options).await {
                Some(value) => results.push(Some(BatchResult {
                    reference: request.reference.clone(),
                    result: Ok(value),
                })),
                None => {
                    results.push(None);
                    misses.push(request.clone());
                }
            }
        }

        if misses.is_empty() {
            return results.into_iter().flatten().collect();
        }

        let started = Instant::now();
        let resolved = self.inner.resolve_batch(misses).await;
        let per_item_cost = started.elapsed() / resolved.len().max(1) as u32;

        let mut by_reference: HashMap<String, Result<String>> = resolved
            .into_iter()
            .map(|r| (r.reference, r.result))
            .collect();

        for (slot, request) in results.iter_mut().zip(&requests) {
            if slot.is_some() {
                continue;
            }
            let result = by_reference.remove(&request.reference).unwrap_or_else(|| {
                Err(ResolveError::batch(
                    self.protocol(),
                    &request.reference,
                    "no result returned by batch",
                ))
            });
            match &result {
                Ok(value) => {
                    self.store(&request.reference, &request.options, value, per_item_cost)
                        .await
                }
                Err(_) => {
                    self.cache
                        .record_failure(&self.cache_key(&request.reference, &request.options))
                        .await;
                }
            }
            *slot = Some(BatchResult {
                reference: request.reference.clone(),
                result,
            });
        }

        results.into_iter().flatten().collect()
    }

    fn supports_cache(&self) -> bool {
        true
    }

    async fn get_cached(&self, reference: &str, options: &ResolverOptions) -> Option<String> {
        let entry = self.cache.get(&self.cache_key(reference, options)).await?;
        entry.value.as_str().map(str::to_string)
    }

    async fn set_cached(&self, reference: &str, options: &ResolverOptions, value: &str) {
        self.store(reference, options, value, Duration::ZERO).await;
    }

    async fn clear_cache(&self) -> usize {
        self.cache
            .clear_by_prefix(&protocol_prefix(self.inner.protocol()))
            .await
    }
}
