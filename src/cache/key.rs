//! Cache key construction
//!
//! A key identifies one `(reference, resolver options)` pair. The protocol
//! prefix is lower-cased so every key of a protocol shares the prefix
//! `"<protocol>:"`. Any `?` or `\` in the rest of the reference is escaped
//! with `\`. Options follow an unescaped `?` as a JSON object with sorted
//! keys, so distinct pairs never share a key and option order is irrelevant.

use crate::cache::types::CacheKey;
use crate::reference::extract_protocol;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Cache key builder for resolved references
pub struct CacheKeyBuilder {
    reference: String,
    params: BTreeMap<String, Value>,
}

impl CacheKeyBuilder {
    /// Create a new cache key builder for a reference
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add an option that changes what the reference resolves to
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Build the cache key
    pub fn build(self) -> CacheKey {
        let mut key = match extract_protocol(&self.reference) {
            Some(protocol) => {
                let rest = &self.reference[protocol.len() + 1..];
                format!("{}{}", protocol_prefix(&protocol), escape(rest))
            }
            None => escape(&self.reference),
        };

        if !self.params.is_empty() {
            let params: Map<String, Value> = self
                .params
                .into_iter()
                .map(|(k, v)| (k, canonical(v)))
                .collect();
            key.push('?');
            key.push_str(&Value::Object(params).to_string());
        }

        key
    }
}

/// Prefix shared by every key of a protocol
pub fn protocol_prefix(protocol: &str) -> String {
    format!("{}:", protocol.to_ascii_lowercase())
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '?' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Re-insert object members in key order, recursively
fn canonical(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonical(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical).collect()),
        other => other,
    }
}
