//! # Global Resolution Cache
//!
//! A shared, resource-bounded cache for values produced by external
//! reference resolvers.
//!
//! ## Features
//!
//! - **TTL-Based Expiration**: entries expire `ttl` after creation, checked on
//!   read and by a background sweep
//! - **Priority Eviction**: a score combining priority, use, recency, cost and
//!   failures picks victims; higher-priority entries are never evicted for a
//!   lower-priority insert
//! - **Circuit Breaker**: repeated internal failures short-circuit the cache
//!   until a reset timeout passes
//! - **Memory Pressure**: usage is classified `Low` to `Critical`, proactive
//!   relief sheds entries at `High` and `Critical`
//! - **Storm Damping**: an eviction burst temporarily raises the ceilings
//!
//! ## Example
//!
//! ```rust
//! use confref::cache::{CacheConfig, GlobalCache, Priority, SetOptions};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let config = CacheConfig::builder()
//!     .default_ttl(Duration::from_secs(300))
//!     .max_entries(10_000)
//!     .max_size_bytes(100 * 1024 * 1024) // 100 MB
//!     .build();
//!
//! let cache = GlobalCache::new(config);
//!
//! let options = SetOptions::new("ssm").with_priority(Priority::High);
//! cache.set("ssm:/app/db/password", json!("hunter2"), options).await;
//!
//! if let Some(entry) = cache.get("ssm:/app/db/password").await {
//!     println!("Cache hit: {}", entry.value);
//! }
//!
//! cache.cleanup().await;
//! # }
//! ```

pub mod breaker;
pub mod clock;
pub mod config;
pub mod entry;
pub mod key;
pub mod store;
pub mod types;

pub use breaker::CircuitBreaker;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::{estimate_size, CacheEntry, CacheMetadata};
pub use key::{protocol_prefix, CacheKeyBuilder};
pub use store::{GlobalCache, SetOptions};
pub use types::{
    CacheKey, CacheStats, CacheValue, CircuitState, MemoryPressure, Priority, ProtocolStats,
};
