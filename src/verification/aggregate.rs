// ABOUTME: Shared collector for per-table checksums written by concurrent workers
// ABOUTME: Freezes into a plain map once every worker has finished

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Table name to checksum for one server
pub type SchemaChecksumMap = HashMap<String, i64>;

/// A table whose checksum could not be obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFailure {
    pub table: String,
    pub reason: String,
}

#[derive(Debug, Default)]
struct AggregateState {
    checksums: SchemaChecksumMap,
    failures: Vec<TableFailure>,
}

/// Cloneable handle workers use to publish results
///
/// Each table belongs to exactly one work unit, so inserts never compete for
/// the same key. The lock only serializes access to the map itself.
#[derive(Debug, Clone, Default)]
pub struct ChecksumAggregator {
    state: Arc<Mutex<AggregateState>>,
}

impl ChecksumAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AggregateState> {
        // Poisoned only if a worker panicked while holding the lock; the map is intact
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, table: impl Into<String>, checksum: i64) {
        self.lock().checksums.insert(table.into(), checksum);
    }

    pub fn record_failure(&self, table: impl Into<String>, reason: impl Into<String>) {
        self.lock().failures.push(TableFailure {
            table: table.into(),
            reason: reason.into(),
        });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().checksums.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the collected results; call only after all workers have been joined
    pub fn into_parts(self) -> (SchemaChecksumMap, Vec<TableFailure>) {
        let state = match Arc::try_unwrap(self.state) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => {
                std::mem::take(&mut *shared.lock().unwrap_or_else(PoisonError::into_inner))
            }
        };
        (state.checksums, state.failures)
    }
}

/// Frozen outcome of one server's pipeline
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    pub checksums: SchemaChecksumMap,
    pub failures: Vec<TableFailure>,
}

impl From<ChecksumAggregator> for PipelineResult {
    fn from(aggregator: ChecksumAggregator) -> Self {
        let (checksums, failures) = aggregator.into_parts();
        Self {
            checksums,
            failures,
        }
    }
}
