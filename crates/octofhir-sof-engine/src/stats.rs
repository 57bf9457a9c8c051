//! Call statistics for the batch and serving layers

use serde::Serialize;
use std::time::Duration;

/// Aggregate execution statistics of a runner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionStatistics {
    /// Statements executed (cache hits excluded)
    pub calls: u64,
    /// Statements that failed
    pub errors: u64,
    /// Total execution time in milliseconds
    pub total_millis: u64,
}

impl ExecutionStatistics {
    /// Record a successful execution
    pub fn record(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.total_millis += elapsed.as_millis() as u64;
    }

    /// Record a failed execution
    pub fn record_error(&mut self) {
        self.calls += 1;
        self.errors += 1;
    }

    /// Average execution time in milliseconds, zero when idle
    pub fn average_millis(&self) -> u64 {
        if self.calls == 0 {
            0
        } else {
            self.total_millis / self.calls
        }
    }
}

/// Result-cache statistics of the batch layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatistics {
    /// Requests answered from the cache
    pub hits: u64,
    /// Requests that had to execute
    pub misses: u64,
    /// Live entries at snapshot time
    pub entries: usize,
}

/// Per-layer call counters of the serving layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServingStatistics {
    /// Queries answered by the batch layer
    pub batch_calls: u64,
    /// Queries that also consulted the speed layer
    pub speed_calls: u64,
    /// Queries whose results contained speed-layer rows
    pub merged_calls: u64,
    /// Queries where the speed layer was enabled but unreachable
    pub speed_skipped: u64,
}
