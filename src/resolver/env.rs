//! `env:` references backed by the process environment

use crate::error::{ResolveError, Result};
use crate::reference::extract_protocol;
use crate::resolver::{Resolver, ResolverOptions};
use async_trait::async_trait;
use serde_json::Value;

/// Resolves `env:NAME` (also `env:/NAME`, `env://NAME`) to the variable's value
///
/// The `default` option is returned when the variable is unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvResolver;

impl EnvResolver {
    pub const PROTOCOL: &'static str = "env";

    pub fn new() -> Self {
        Self
    }

    fn variable_name(reference: &str) -> Option<&str> {
        let (_, rest) = reference.split_once(':')?;
        let name = rest.trim_start_matches('/');
        (!name.is_empty()).then_some(name)
    }
}

#[async_trait]
impl Resolver for EnvResolver {
    fn protocol(&self) -> &str {
        Self::PROTOCOL
    }

    fn validate_reference(&self, reference: &str) -> bool {
        extract_protocol(reference).as_deref() == Some(Self::PROTOCOL)
            && Self::variable_name(reference).is_some()
    }

    async fn resolve(&self, reference: &str, options: &ResolverOptions) -> Result<String> {
        let name = Self::variable_name(reference)
            .ok_or_else(|| ResolveError::InvalidReference(reference.to_string()))?;

        match std::env::var(name) {
            Ok(value) => Ok(value),
            Err(e) => match options.get("default") {
                Some(Value::String(default)) => Ok(default.clone()),
                Some(Value::Null) | None => Err(ResolveError::resolution(reference, e.to_string())),
                Some(other) => Ok(other.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_reference() {
        let resolver = EnvResolver::new();
        assert!(resolver.validate_reference("env:HOME"));
        assert!(resolver.validate_reference("ENV://HOME"));
        assert!(!resolver.validate_reference("env:"));
        assert!(!resolver.validate_reference("env://"));
        assert!(!resolver.validate_reference("ssm:/HOME"));
    }

    #[tokio::test]
    async fn test_resolve_set_variable() {
        std::env::set_var("CONFREF_TEST_ENV_SET", "from-env");
        let value = EnvResolver
            .resolve("env:/CONFREF_TEST_ENV_SET", &ResolverOptions::new())
            .await
            .unwrap();
        assert_eq!(value, "from-env");
    }

    #[tokio::test]
    async fn test_resolve_missing_variable() {
        let missing = "env:CONFREF_TEST_ENV_DEFINITELY_UNSET";

        let err = EnvResolver
            .resolve(missing, &ResolverOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Resolution { .. }));

        let options = json!({"default": "fallback"}).as_object().cloned().unwrap();
        assert_eq!(EnvResolver.resolve(missing, &options).await.unwrap(), "fallback");

        let options = json!({"default": 8080}).as_object().cloned().unwrap();
        assert_eq!(EnvResolver.resolve(missing, &options).await.unwrap(), "8080");
    }
}
