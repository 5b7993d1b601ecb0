//! Demonstrates end-to-end reference resolution
//!
//! This example shows how to:
//! - Register resolvers, one of them batch-capable and cached
//! - Resolve a nested configuration in one call
//! - Disable a protocol per call
//! - Inspect cache and engine statistics

use async_trait::async_trait;
use confref::{
    BatchRequest, BatchResult, CacheConfig, CachingResolver, EnvResolver, GlobalCache,
    ResolutionEngine, ResolutionOptions, ResolveError, Resolver, ResolverOptions,
    ResolverRegistry,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// In-process parameter store answering `ssm:` references
struct DemoParameterStore {
    parameters: HashMap<&'static str, &'static str>,
}

impl DemoParameterStore {
    fn new() -> Self {
        Self {
            parameters: HashMap::from([
                ("ssm:/demo/db/host", "db.internal"),
                ("ssm:/demo/db/password", "s3cr3t"),
                ("ssm:/demo/api/key", "ak-12345"),
            ]),
        }
    }
}

#[async_trait]
impl Resolver for DemoParameterStore {
    fn protocol(&self) -> &str {
        "ssm"
    }

    fn validate_reference(&self, reference: &str) -> bool {
        reference.starts_with("ssm:/")
    }

    async fn resolve(&self, reference: &str, _options: &ResolverOptions) -> confref::Result<String> {
        // simulated round-trip
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.parameters
            .get(reference)
            .map(|v| v.to_string())
            .ok_or_else(|| ResolveError::resolution(reference, "parameter not found"))
    }

    fn supports_batch(&self) -> bool {
        true
    }

    async fn resolve_batch(&self, requests: Vec<BatchRequest>) -> Vec<BatchResult> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        requests
            .into_iter()
            .map(|request| BatchResult {
                result: self
                    .parameters
                    .get(request.reference.as_str())
                    .map(|v| v.to_string())
                    .ok_or_else(|| {
                        ResolveError::resolution(&request.reference, "parameter not found")
                    }),
                reference: request.reference,
            })
            .collect()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cache = GlobalCache::new(
        CacheConfig::builder()
            .default_ttl(Duration::from_secs(60))
            .max_entries(1_000)
            .build(),
    );

    // 1. Register resolvers
    println!("1. Registering resolvers...");
    let registry = Arc::new(ResolverRegistry::new());
    registry
        .register(Arc::new(CachingResolver::new(
            DemoParameterStore::new(),
            cache.clone(),
        )))
        .await?;
    registry.register(Arc::new(EnvResolver::new())).await?;
    println!("   Protocols: {:?}\n", registry.protocols().await);

    let engine = ResolutionEngine::new(registry.clone());
    let config = json!({
        "database": {
            "host": "ssm:/demo/db/host",
            "password": "ssm:/demo/db/password",
            "port": 5432
        },
        "api": {"key": "ssm:/demo/api/key", "endpoint": "https://api.example.com"},
        "shell": "env:SHELL",
    });

    // 2. Resolve twice, the second call is served from the cache
    println!("2. Resolving configuration...");
    for attempt in 1..=2 {
        let started = std::time::Instant::now();
        let resolved = engine.resolve(&config, &ResolutionOptions::default()).await;
        match resolved {
            Ok(value) => println!(
                "   Attempt {} ({:?}):\n{}",
                attempt,
                started.elapsed(),
                serde_json::to_string_pretty(&value)?
            ),
            // SHELL may be unset in minimal environments
            Err(e) => println!("   Attempt {} failed: {}", attempt, e),
        }
    }
    println!();

    // 3. Disable a protocol for one call
    println!("3. Resolving with env: disabled...");
    let options = ResolutionOptions::default().disable("env");
    let resolved = engine.resolve(&config, &options).await?;
    println!("   shell = {}\n", resolved["shell"]);

    // 4. Statistics
    println!("4. Statistics");
    println!("   {}", cache.get_stats().await);
    println!("   {}", engine.stats().await);

    registry.cleanup().await;
    cache.cleanup().await;
    println!("\n✓ Demo complete");
    Ok(())
}
