//! Engine statistics accumulated across resolve calls

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Work done for one protocol
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolTiming {
    /// References resolved, batched or individually
    pub count: u64,
    pub time_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Reference leaves handed to a registered resolver
    pub total_references: u64,

    /// References answered from the per-call context
    pub cache_hits: u64,

    /// `resolve_batch` calls issued
    pub batch_operations: u64,

    /// `resolve` calls issued for references not covered by a batch
    pub individual_resolutions: u64,

    pub by_protocol: HashMap<String, ProtocolTiming>,
}

impl EngineStats {
    pub(crate) fn record_batch(&mut self, protocol: &str, references: usize, elapsed: Duration) {
        self.batch_operations += 1;
        self.record_protocol(protocol, references as u64, elapsed);
    }

    pub(crate) fn record_individual(&mut self, protocol: &str, elapsed: Duration) {
        self.individual_resolutions += 1;
        self.record_protocol(protocol, 1, elapsed);
    }

    fn record_protocol(&mut self, protocol: &str, count: u64, elapsed: Duration) {
        let timing = self.by_protocol.entry(protocol.to_string()).or_default();
        timing.count += count;
        timing.time_ms += elapsed.as_millis() as u64;
    }
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EngineStats {{ references: {}, context_hits: {}, batches: {}, individual: {} }}",
            self.total_references, self.cache_hits, self.batch_operations, self.individual_resolutions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates_per_protocol() {
        let mut stats = EngineStats::default();
        stats.record_batch("ssm", 3, Duration::from_millis(40));
        stats.record_individual("ssm", Duration::from_millis(5));
        stats.record_individual("env", Duration::ZERO);

        assert_eq!(stats.batch_operations, 1);
        assert_eq!(stats.individual_resolutions, 2);
        assert_eq!(
            stats.by_protocol["ssm"],
            ProtocolTiming {
                count: 4,
                time_ms: 45
            }
        );
        assert_eq!(stats.by_protocol["env"].count, 1);
    }
}
