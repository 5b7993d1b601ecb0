//! Per-call resolution state

use crate::error::Result;
use crate::resolver::{BatchRequest, ResolutionOptions};
use std::collections::{HashMap, HashSet};

/// State owned by one `resolve` call
///
/// Holds the resolved value or error for each reference seen so far, the
/// batch requests still pending per protocol, and the options of the call.
/// Never shared between calls.
#[derive(Debug)]
pub struct ResolutionContext {
    options: ResolutionOptions,
    resolved: HashMap<String, Result<String>>,
    pending: HashMap<String, Vec<BatchRequest>>,
    queued: HashSet<String>,
}

impl ResolutionContext {
    pub fn new(options: ResolutionOptions) -> Self {
        Self {
            options,
            resolved: HashMap::new(),
            pending: HashMap::new(),
            queued: HashSet::new(),
        }
    }

    pub fn options(&self) -> &ResolutionOptions {
        &self.options
    }

    /// Queue a batch request; returns false if the reference is already queued
    pub fn add_pending(&mut self, protocol: &str, request: BatchRequest) -> bool {
        if !self.queued.insert(request.reference.clone()) {
            return false;
        }
        self.pending
            .entry(protocol.to_string())
            .or_default()
            .push(request);
        true
    }

    /// Take every pending request, grouped by protocol
    pub fn take_pending(&mut self) -> HashMap<String, Vec<BatchRequest>> {
        self.queued.clear();
        std::mem::take(&mut self.pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn store(&mut self, reference: String, result: Result<String>) {
        self.resolved.insert(reference, result);
    }

    pub fn lookup(&self, reference: &str) -> Option<&Result<String>> {
        self.resolved.get(reference)
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::resolver::ResolverOptions;

    fn request(reference: &str) -> BatchRequest {
        BatchRequest {
            reference: reference.to_string(),
            options: ResolverOptions::new(),
        }
    }

    #[test]
    fn test_pending_is_deduplicated() {
        let mut context = ResolutionContext::new(ResolutionOptions::default());

        assert!(context.add_pending("ssm", request("ssm:/a")));
        assert!(!context.add_pending("ssm", request("ssm:/a")));
        assert!(context.add_pending("ssm", request("ssm:/b")));
        assert!(context.add_pending("s3", request("s3://x/y")));
        assert_eq!(context.pending_count(), 3);

        let pending = context.take_pending();
        assert_eq!(pending["ssm"].len(), 2);
        assert_eq!(context.pending_count(), 0);
    }

    #[test]
    fn test_store_keeps_errors() {
        let mut context = ResolutionContext::new(ResolutionOptions::default());
        context.store("ssm:/a".to_string(), Ok("v".to_string()));
        context.store(
            "ssm:/b".to_string(),
            Err(ResolveError::batch("ssm", "ssm:/b", "throttled")),
        );

        assert_eq!(context.lookup("ssm:/a"), Some(&Ok("v".to_string())));
        assert!(context.lookup("ssm:/b").is_some_and(|r| r.is_err()));
        assert!(context.lookup("ssm:/c").is_none());
        assert_eq!(context.resolved_count(), 2);
    }
}
