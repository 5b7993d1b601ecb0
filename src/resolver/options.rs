//! Per-call resolution options

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Resolver-specific options, e.g. `{"withDecryption": true, "ttlMs": 60000}`
pub type ResolverOptions = serde_json::Map<String, serde_json::Value>;

/// Setting for one protocol: either an on/off switch or an option map
///
/// Deserializes from `false` or `{ "ttlMs": 1000 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolverSetting {
    Enabled(bool),
    Options(ResolverOptions),
}

/// Options for a single `resolve` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionOptions {
    /// When false, the value is returned unchanged
    pub external: bool,

    /// Per-protocol settings keyed by lower-case protocol name
    #[serde(deserialize_with = "lowercase_protocols")]
    pub resolvers: HashMap<String, ResolverSetting>,
}

fn lowercase_protocols<'de, D>(deserializer: D) -> Result<HashMap<String, ResolverSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = HashMap::<String, ResolverSetting>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(protocol, setting)| (protocol.to_ascii_lowercase(), setting))
        .collect())
}

impl Default for ResolutionOptions {
    fn default() -> Self {
        Self {
            external: true,
            resolvers: HashMap::new(),
        }
    }
}

impl ResolutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that leave every reference untouched
    pub fn without_external() -> Self {
        Self {
            external: false,
            ..Self::default()
        }
    }

    /// Disable one protocol for this call
    pub fn disable(mut self, protocol: &str) -> Self {
        self.resolvers
            .insert(protocol.to_ascii_lowercase(), ResolverSetting::Enabled(false));
        self
    }

    /// Pass options to one protocol's resolver
    pub fn with_resolver_options(mut self, protocol: &str, options: ResolverOptions) -> Self {
        self.resolvers
            .insert(protocol.to_ascii_lowercase(), ResolverSetting::Options(options));
        self
    }

    /// A protocol is enabled unless explicitly switched off
    pub fn is_enabled(&self, protocol: &str) -> bool {
        !matches!(
            self.setting(protocol),
            Some(ResolverSetting::Enabled(false))
        )
    }

    /// Resolver defaults overlaid with this call's options for `protocol`
    pub fn options_for(&self, protocol: &str, defaults: &ResolverOptions) -> ResolverOptions {
        let mut merged = defaults.clone();
        if let Some(ResolverSetting::Options(overrides)) = self.setting(protocol) {
            for (key, value) in overrides {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    fn setting(&self, protocol: &str) -> Option<&ResolverSetting> {
        self.resolvers.get(&protocol.to_ascii_lowercase())
    }
}
