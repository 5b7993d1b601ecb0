//! # confref
//!
//! Resolution of external references embedded in configuration trees, backed
//! by a shared, resource-bounded cache.
//!
//! ## Features
//!
//! - Protocol-indexed resolver registry with initialize/cleanup lifecycle
//! - Three-phase resolution engine grouping work into one batch per protocol
//! - Global cache with TTL, priority eviction, a circuit breaker,
//!   memory-pressure relief and eviction-storm damping
//! - Async-first design using tokio
//!
//! ## References
//!
//! Any string starting with a URI-style scheme and a colon is a reference,
//! for example `ssm:/app/db/password`, `s3://bucket/key` or `env:HOME`. The
//! scheme selects the resolver. Strings without a registered resolver are
//! left as they are.
//!
//! ## Example
//!
//! ```no_run
//! use confref::{
//!     CacheConfig, CachingResolver, EnvResolver, GlobalCache, ResolutionEngine,
//!     ResolutionOptions, ResolverRegistry,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = GlobalCache::new(CacheConfig::default());
//!
//!     let registry = Arc::new(ResolverRegistry::new());
//!     registry
//!         .register(Arc::new(CachingResolver::new(EnvResolver::new(), cache.clone())))
//!         .await?;
//!
//!     let engine = ResolutionEngine::new(registry.clone());
//!     let config = json!({
//!         "user": "env:USER",
//!         "paths": ["env:HOME", "/tmp"],
//!     });
//!
//!     let resolved = engine.resolve(&config, &ResolutionOptions::default()).await?;
//!     println!("{}", serde_json::to_string_pretty(&resolved)?);
//!     println!("{}", cache.get_stats().await);
//!
//!     registry.cleanup().await;
//!     cache.cleanup().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod reference;
pub mod resolver;

// Re-export main types for convenience
pub use cache::{
    CacheConfig, CacheConfigBuilder, CacheEntry, CacheKey, CacheKeyBuilder, CacheMetadata,
    CacheStats, CacheValue, CircuitState, Clock, GlobalCache, ManualClock, MemoryPressure,
    Priority, SetOptions, SystemClock,
};
pub use engine::{ConfigValue, EngineStats, ResolutionContext, ResolutionEngine};
pub use error::{ResolveError, Result};
pub use reference::{extract_protocol, is_reference};
pub use resolver::{
    BatchRequest, BatchResult, CachingResolver, EnvResolver, ResolutionOptions, Resolver,
    ResolverOptions, ResolverRegistry, ResolverSetting,
};
