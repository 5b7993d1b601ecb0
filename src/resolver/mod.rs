//! # Resolvers
//!
//! A [`Resolver`] turns references of one protocol into concrete values. The
//! [`ResolverRegistry`] owns one resolver per protocol and drives their
//! lifecycle.
//!
//! ## Implementing a resolver
//!
//! ```rust
//! use async_trait::async_trait;
//! use confref::resolver::{Resolver, ResolverOptions};
//! use confref::Result;
//!
//! struct UpperResolver;
//!
//! #[async_trait]
//! impl Resolver for UpperResolver {
//!     fn protocol(&self) -> &str {
//!         "upper"
//!     }
//!
//!     fn validate_reference(&self, reference: &str) -> bool {
//!         reference.starts_with("upper:")
//!     }
//!
//!     async fn resolve(&self, reference: &str, _options: &ResolverOptions) -> Result<String> {
//!         Ok(reference.trim_start_matches("upper:").to_uppercase())
//!     }
//! }
//! ```

pub mod cached;
pub mod env;
pub mod options;
pub mod registry;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use cached::CachingResolver;
pub use env::EnvResolver;
pub use options::{ResolutionOptions, ResolverOptions, ResolverSetting};
pub use registry::{ResolverMap, ResolverRegistry};

/// One reference queued for batch resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub reference: String,
    pub options: ResolverOptions,
}

/// Outcome for one reference of a batch; carries a value or an error, never both
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub reference: String,
    pub result: Result<String>,
}

/// Resolver for a single reference protocol
///
/// Implementors must handle:
/// - Recognizing their own references (`validate_reference`)
/// - Resolving one reference
///
/// Batching, caching and lifecycle hooks are optional.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Protocol handled by this resolver, e.g. `"ssm"`
    fn protocol(&self) -> &str;

    /// Options applied before any per-call overrides
    fn default_options(&self) -> ResolverOptions {
        ResolverOptions::new()
    }

    /// Prepare the resolver before it is registered
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Check whether the reference is well-formed for this protocol
    fn validate_reference(&self, reference: &str) -> bool;

    /// Resolve one reference
    async fn resolve(&self, reference: &str, options: &ResolverOptions) -> Result<String>;

    /// Release resources; called on unregister and registry cleanup
    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }

    fn supports_batch(&self) -> bool {
        false
    }

    /// Resolve many references in one call
    ///
    /// Must return one result per request. The default resolves them one by one.
    async fn resolve_batch(&self, requests: Vec<BatchRequest>) -> Vec<BatchResult> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let result = self.resolve(&request.reference, &request.options).await;
            results.push(BatchResult {
                reference: request.reference,
                result,
            });
        }
        results
    }

    fn supports_cache(&self) -> bool {
        false
    }

    async fn get_cached(&self, _reference: &str, _options: &ResolverOptions) -> Option<String> {
        None
    }

    async fn set_cached(&self, _reference: &str, _options: &ResolverOptions, _value: &str) {}

    /// Drop this resolver's cached values, returning how many were removed
    async fn clear_cache(&self) -> usize {
        0
    }
}
