//! Protocol-indexed resolver registry

use crate::error::{ResolveError, Result};
use crate::reference::extract_protocol;
use crate::resolver::Resolver;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Protocol → resolver view
pub type ResolverMap = HashMap<String, Arc<dyn Resolver>>;

/// Owns one resolver per protocol and runs their lifecycle hooks
#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: RwLock<ResolverMap>,
    /// Held across every lifecycle change
    lifecycle: Mutex<()>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize and activate a resolver, replacing any for the same protocol
    ///
    /// A resolver whose initialization fails is not registered. The
    /// replaced resolver has already been cleaned up by then.
    pub async fn register(&self, resolver: Arc<dyn Resolver>) -> Result<()> {
        let protocol = resolver.protocol().to_ascii_lowercase();
        let _lifecycle = self.lifecycle.lock().await;

        if self.resolvers.read().await.contains_key(&protocol) {
            info!("Replacing resolver for protocol: {}", protocol);
            self.remove(&protocol).await;
        }

        resolver
            .initialize()
            .await
            .map_err(|e| ResolveError::Initialization {
                protocol: protocol.clone(),
                message: e.to_string(),
            })?;

        self.resolvers.write().await.insert(protocol.clone(), resolver);
        info!("Registered resolver for protocol: {}", protocol);
        Ok(())
    }

    /// Clean up and remove the resolver for `protocol`
    pub async fn unregister(&self, protocol: &str) -> bool {
        let _lifecycle = self.lifecycle.lock().await;
        self.remove(&protocol.to_ascii_lowercase()).await
    }

    async fn remove(&self, protocol: &str) -> bool {
        let Some(resolver) = self.get_resolver(protocol).await else {
            return false;
        };

        if let Err(e) = resolver.cleanup().await {
            warn!("Resolver cleanup failed for {}: {}", protocol, e);
        }

        let removed = self.resolvers.write().await.remove(protocol).is_some();
        if removed {
            info!("Unregistered resolver for protocol: {}", protocol);
        }
        removed
    }

    pub async fn get_resolver(&self, protocol: &str) -> Option<Arc<dyn Resolver>> {
        self.resolvers
            .read()
            .await
            .get(&protocol.to_ascii_lowercase())
            .cloned()
    }

    /// Registered protocols, sorted
    pub async fn protocols(&self) -> Vec<String> {
        let mut protocols: Vec<String> = self.resolvers.read().await.keys().cloned().collect();
        protocols.sort();
        protocols
    }

    /// Whether a registered resolver accepts this reference
    pub async fn can_resolve(&self, reference: &str) -> bool {
        let Some(protocol) = extract_protocol(reference) else {
            return false;
        };
        match self.get_resolver(&protocol).await {
            Some(resolver) => resolver.validate_reference(reference),
            None => false,
        }
    }

    /// Consistent view of the registry for one resolve call
    pub async fn snapshot(&self) -> ResolverMap {
        self.resolvers.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.resolvers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.resolvers.read().await.is_empty()
    }

    /// Clean up every resolver concurrently and empty the registry
    pub async fn cleanup(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let drained: Vec<(String, Arc<dyn Resolver>)> =
            self.resolvers.write().await.drain().collect();
        let count = drained.len();

        let outcomes = join_all(drained.into_iter().map(|(protocol, resolver)| async move {
            (protocol, resolver.cleanup().await)
        }))
        .await;

        for (protocol, outcome) in outcomes {
            match outcome {
                Ok(()) => debug!("Cleaned up resolver: {}", protocol),
                Err(e) => warn!("Resolver cleanup failed for {}: {}", protocol, e),
            }
        }
        info!("Resolver registry cleaned up ({} resolvers)", count);
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolverOptions;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct LifecycleResolver {
        protocol: &'static str,
        fail_init: bool,
        init_delay: Duration,
        cleanups: Arc<AtomicUsize>,
    }

    impl LifecycleResolver {
        fn new(protocol: &'static str, cleanups: Arc<AtomicUsize>) -> Self {
            Self {
                protocol,
                fail_init: false,
                init_delay: Duration::ZERO,
                cleanups,
            }
        }
    }

    #[async_trait]
    impl Resolver for LifecycleResolver {
        fn protocol(&self) -> &str {
            self.protocol
        }

        async fn initialize(&self) -> Result<()> {
            if !self.init_delay.is_zero() {
                tokio::time::sleep(self.init_delay).await;
            }
            if self.fail_init {
                return Err(ResolveError::Other("credentials missing".to_string()));
            }
            Ok(())
        }

        fn validate_reference(&self, reference: &str) -> bool {
            reference.len() > self.protocol.len() + 1
        }

        async fn resolve(&self, reference: &str, _options: &ResolverOptions) -> Result<String> {
            Ok(reference.to_string())
        }

        async fn cleanup(&self) -> Result<()> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            Err(ResolveError::Cleanup {
                protocol: self.protocol.to_string(),
                message: "already closed".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = ResolverRegistry::new();
        let cleanups = Arc::new(AtomicUsize::new(0));

        registry
            .register(Arc::new(LifecycleResolver::new("ssm", cleanups.clone())))
            .await
            .unwrap();

        assert!(registry.get_resolver("SSM").await.is_some());
        assert_eq!(registry.protocols().await, vec!["ssm".to_string()]);
        assert!(registry.can_resolve("ssm:/app/key").await);
        assert!(!registry.can_resolve("ssm:").await);
        assert!(!registry.can_resolve("s3://bucket/key").await);
        assert!(!registry.can_resolve("plain").await);
    }

    #[tokio::test]
    async fn test_replacing_cleans_up_previous() {
        let registry = ResolverRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        registry
            .register(Arc::new(LifecycleResolver::new("ssm", first.clone())))
            .await
            .unwrap();
        registry
            .register(Arc::new(LifecycleResolver::new("ssm", second.clone())))
            .await
            .unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_registration_cleans_up_displaced() {
        let registry = ResolverRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let slow = |cleanups| LifecycleResolver {
            init_delay: Duration::from_millis(50),
            ..LifecycleResolver::new("ssm", cleanups)
        };

        let (a, b) = tokio::join!(
            registry.register(Arc::new(slow(first.clone()))),
            registry.register(Arc::new(slow(second.clone()))),
        );
        a.unwrap();
        b.unwrap();

        // whichever registered first was replaced and cleaned up
        assert_eq!(first.load(Ordering::SeqCst) + second.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_not_registered() {
        let registry = ResolverRegistry::new();
        let resolver = LifecycleResolver {
            fail_init: true,
            ..LifecycleResolver::new("s3", Arc::new(AtomicUsize::new(0)))
        };

        let err = registry.register(Arc::new(resolver)).await.unwrap_err();

        assert!(matches!(err, ResolveError::Initialization { ref protocol, .. } if protocol == "s3"));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unregister_tolerates_cleanup_failure() {
        let registry = ResolverRegistry::new();
        let cleanups = Arc::new(AtomicUsize::new(0));
        registry
            .register(Arc::new(LifecycleResolver::new("ssm", cleanups.clone())))
            .await
            .unwrap();

        assert!(registry.unregister("ssm").await);
        assert!(!registry.unregister("ssm").await);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cleanup_runs_every_resolver() {
        let registry = ResolverRegistry::new();
        let cleanups = Arc::new(AtomicUsize::new(0));
        for protocol in ["ssm", "s3", "env"] {
            registry
                .register(Arc::new(LifecycleResolver::new(protocol, cleanups.clone())))
                .await
                .unwrap();
        }

        let snapshot = registry.snapshot().await;
        registry.cleanup().await;

        assert_eq!(cleanups.load(Ordering::SeqCst), 3);
        assert!(registry.is_empty().await);
        // snapshots taken earlier are unaffected
        assert_eq!(snapshot.len(), 3);
    }
}
