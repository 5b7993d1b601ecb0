//! # Resolution Engine
//!
//! Resolves every external reference in a configuration value in three
//! passes over the tree:
//!
//! 1. **Collect**: queue references of batch-capable resolvers, per protocol
//! 2. **Batch**: one `resolve_batch` per protocol, all running concurrently
//! 3. **Assemble**: rebuild the value, taking batch results from the call's
//!    context and resolving anything else individually
//!
//! ```rust
//! use confref::engine::ResolutionEngine;
//! use confref::resolver::{EnvResolver, ResolutionOptions, ResolverRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> confref::Result<()> {
//! let registry = Arc::new(ResolverRegistry::new());
//! registry.register(Arc::new(EnvResolver::new())).await?;
//!
//! let engine = ResolutionEngine::new(registry);
//! let config = json!({"home": "env:HOME", "retries": 3});
//! let resolved = engine.resolve(&config, &ResolutionOptions::default()).await?;
//! println!("{}", resolved);
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod stats;

pub use context::ResolutionContext;
pub use stats::{EngineStats, ProtocolTiming};

use crate::error::{ResolveError, Result};
use crate::reference::extract_protocol;
use crate::resolver::{BatchRequest, ResolutionOptions, ResolverMap, ResolverRegistry};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

/// A configuration value: null, bool, number, string, array or object
pub type ConfigValue = Value;

/// Batch-optimizing resolver of configuration trees
pub struct ResolutionEngine {
    registry: Arc<ResolverRegistry>,
    stats: RwLock<EngineStats>,
}

impl ResolutionEngine {
    pub fn new(registry: Arc<ResolverRegistry>) -> Self {
        Self {
            registry,
            stats: RwLock::new(EngineStats::default()),
        }
    }

    pub fn registry(&self) -> &Arc<ResolverRegistry> {
        &self.registry
    }

    /// Resolve all references in `value`
    ///
    /// The first failing reference reached while rebuilding the tree is
    /// returned as the error. Strings that are not references, and references
    /// without an enabled resolver, pass through unchanged.
    pub async fn resolve(
        &self,
        value: &ConfigValue,
        options: &ResolutionOptions,
    ) -> Result<ConfigValue> {
        if !options.external {
            return Ok(value.clone());
        }

        let call_id = Uuid::new_v4();
        async move {
            let resolvers = self.registry.snapshot().await;
            let mut context = ResolutionContext::new(options.clone());

            collect(value, &resolvers, &mut context);
            debug!(
                "Collected {} batch requests across {} resolvers",
                context.pending_count(),
                resolvers.len()
            );

            self.execute_batches(&resolvers, &mut context).await;
            self.assemble(value, &resolvers, &mut context).await
        }
        .instrument(info_span!("resolve", %call_id))
        .await
    }

    /// Statistics accumulated since creation or the last reset
    pub async fn stats(&self) -> EngineStats {
        self.stats.read().await.clone()
    }

    pub async fn reset_stats(&self) {
        *self.stats.write().await = EngineStats::default();
    }

    async fn execute_batches(&self, resolvers: &ResolverMap, context: &mut ResolutionContext) {
        let pending = context.take_pending();
        if pending.is_empty() {
            return;
        }

        let batches = pending.into_iter().filter_map(|(protocol, requests)| {
            let resolver = resolvers.get(&protocol)?.clone();
            Some(async move {
                let references: Vec<String> =
                    requests.iter().map(|r| r.reference.clone()).collect();
                let started = Instant::now();
                let outcome =
                    tokio::spawn(async move { resolver.resolve_batch(requests).await }).await;
                (protocol, references, outcome, started.elapsed())
            })
        });
        let outcomes = join_all(batches).await;

        let mut stats = self.stats.write().await;
        for (protocol, references, outcome, elapsed) in outcomes {
            stats.record_batch(&protocol, references.len(), elapsed);

            match outcome {
                Ok(results) => {
                    let mut by_reference: HashMap<String, Result<String>> = results
                        .into_iter()
                        .map(|r| (r.reference, r.result))
                        .collect();
                    for reference in references {
                        let result = by_reference.remove(&reference).unwrap_or_else(|| {
                            Err(ResolveError::batch(
                                &protocol,
                                &reference,
                                "no result returned by batch",
                            ))
                        });
                        context.store(reference, result);
                    }
                }
                Err(join_error) => {
                    warn!("Batch resolution for {} failed: {}", protocol, join_error);
                    let message = format!("batch task failed: {}", join_error);
                    for reference in references {
                        let error = ResolveError::batch(&protocol, &reference, &message);
                        context.store(reference, Err(error));
                    }
                }
            }
        }
    }

    fn assemble<'a>(
        &'a self,
        value: &'a ConfigValue,
        resolvers: &'a ResolverMap,
        context: &'a mut ResolutionContext,
    ) -> BoxFuture<'a, Result<ConfigValue>> {
        async move {
            match value {
                Value::String(s) => self.resolve_leaf(s, resolvers, context).await,
                Value::Array(items) => {
                    let mut resolved = Vec::with_capacity(items.len());
                    for item in items {
                        resolved.push(self.assemble(item, resolvers, &mut *context).await?);
                    }
                    Ok(Value::Array(resolved))
                }
                Value::Object(map) => {
                    let mut resolved = Map::with_capacity(map.len());
                    for (key, item) in map {
                        let item = self.assemble(item, resolvers, &mut *context).await?;
                        resolved.insert(key.clone(), item);
                    }
                    Ok(Value::Object(resolved))
                }
                Value::Null | Value::Bool(_) | Value::Number(_) => Ok(value.clone()),
            }
        }
        .boxed()
    }

    async fn resolve_leaf(
        &self,
        reference: &str,
        resolvers: &ResolverMap,
        context: &mut ResolutionContext,
    ) -> Result<ConfigValue> {
        let passthrough = || Ok(Value::String(reference.to_string()));

        let Some(protocol) = extract_protocol(reference) else {
            return passthrough();
        };
        if !context.options().is_enabled(&protocol) {
            return passthrough();
        }
        let Some(resolver) = resolvers.get(&protocol) else {
            return passthrough();
        };

        self.stats.write().await.total_references += 1;

        if !resolver.validate_reference(reference) {
            return Err(ResolveError::InvalidReference(reference.to_string()));
        }

        if let Some(result) = context.lookup(reference) {
            self.stats.write().await.cache_hits += 1;
            return result.clone().map(Value::String);
        }

        let options = context
            .options()
            .options_for(&protocol, &resolver.default_options());
        let started = Instant::now();
        let result = resolver.resolve(reference, &options).await;
        self.stats
            .write()
            .await
            .record_individual(&protocol, started.elapsed());

        let resolved = result?;
        context.store(reference.to_string(), Ok(resolved.clone()));
        Ok(Value::String(resolved))
    }
}

impl std::fmt::Debug for ResolutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionEngine")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Queue every batchable reference in `value`
fn collect(value: &ConfigValue, resolvers: &ResolverMap, context: &mut ResolutionContext) {
    match value {
        Value::String(s) => {
            let Some(protocol) = extract_protocol(s) else {
                return;
            };
            if !context.options().is_enabled(&protocol) {
                return;
            }
            let Some(resolver) = resolvers.get(&protocol) else {
                return;
            };
            if resolver.supports_batch() && resolver.validate_reference(s) {
                let options = context
                    .options()
                    .options_for(&protocol, &resolver.default_options());
                context.add_pending(
                    &protocol,
                    BatchRequest {
                        reference: s.clone(),
                        options,
                    },
                );
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, resolvers, context);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect(item, resolvers, context);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Resolver, ResolverOptions};
    use async_trait::async_trait;
    use serde_json::json;

    struct MapResolver;

    #[async_trait]
    impl Resolver for MapResolver {
        fn protocol(&self) -> &str {
            "map"
        }

        fn validate_reference(&self, reference: &str) -> bool {
            reference.starts_with("map:") && reference.len() > 4
        }

        async fn resolve(&self, reference: &str, _options: &ResolverOptions) -> Result<String> {
            match reference {
                "map:fail" => Err(ResolveError::resolution(reference, "no such key")),
                other => Ok(other.trim_start_matches("map:").to_uppercase()),
            }
        }
    }

    async fn engine() -> ResolutionEngine {
        let registry = Arc::new(ResolverRegistry::new());
        registry.register(Arc::new(MapResolver)).await.unwrap();
        ResolutionEngine::new(registry)
    }

    #[tokio::test]
    async fn test_individual_resolution_and_dedup() {
        let engine = engine().await;
        let value = json!({"a": "map:x", "b": ["map:x", "plain", 7, null]});

        let resolved = engine
            .resolve(&value, &ResolutionOptions::default())
            .await
            .unwrap();

        assert_eq!(resolved, json!({"a": "X", "b": ["X", "plain", 7, null]}));
        let stats = engine.stats().await;
        assert_eq!(stats.total_references, 2);
        assert_eq!(stats.individual_resolutions, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.batch_operations, 0);
    }

    #[tokio::test]
    async fn test_first_error_propagates() {
        let engine = engine().await;
        let err = engine
            .resolve(&json!(["map:fail", "map:ok"]), &ResolutionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::Resolution { .. }));
    }

    #[tokio::test]
    async fn test_invalid_reference_for_registered_protocol() {
        let engine = engine().await;
        let err = engine
            .resolve(&json!("map:"), &ResolutionOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err, ResolveError::InvalidReference("map:".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_protocol_passes_through() {
        let engine = engine().await;
        let value = json!({"url": "https://example.com", "note": "todo: later"});

        let resolved = engine
            .resolve(&value, &ResolutionOptions::default())
            .await
            .unwrap();

        assert_eq!(resolved, value);
        assert_eq!(engine.stats().await.total_references, 0);
    }

    #[tokio::test]
    async fn test_object_key_order_preserved() {
        let engine = engine().await;
        let value = json!({"zeta": "map:z", "alpha": "map:a", "mid": 1});

        let resolved = engine
            .resolve(&value, &ResolutionOptions::default())
            .await
            .unwrap();

        let keys: Vec<&String> = resolved.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn test_reset_stats() {
        let engine = engine().await;
        engine
            .resolve(&json!("map:x"), &ResolutionOptions::default())
            .await
            .unwrap();
        assert_eq!(engine.stats().await.individual_resolutions, 1);

        engine.reset_stats().await;
        assert_eq!(engine.stats().await, EngineStats::default());
    }
}
