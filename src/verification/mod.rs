// ABOUTME: Checksum acquisition and comparison engine
// ABOUTME: Catalog reading, partitioning, the worker pool, aggregation, and comparison

pub mod aggregate;
pub mod catalog;
pub mod compare;
pub mod partition;
pub mod pipeline;
pub mod pool;

use crate::config::ServerEndpoint;
use crate::error::{Result, VerifyError};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use aggregate::{ChecksumAggregator, PipelineResult, SchemaChecksumMap, TableFailure};
pub use catalog::read_catalog;
pub use compare::{compare_checksums, ComparisonMode, Mismatch, MismatchReport};
pub use partition::{partition, sort_by_row_count, WorkUnit};
pub use pipeline::checksum_schema;
pub use pool::{run_workers, PoolContext};

/// A table found in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    /// Planner estimate; only used to balance work across workers
    pub approximate_row_count: i64,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, approximate_row_count: i64) -> Self {
        Self {
            name: name.into(),
            approximate_row_count,
        }
    }
}

/// Result row of a server-side checksum command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChecksum {
    pub table: String,
    pub checksum: i64,
}

/// Opens sessions against a server endpoint
///
/// The pipeline opens one session for the catalog query and one per worker
/// that has tables to process.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: Session;

    async fn open(&self, endpoint: &ServerEndpoint) -> Result<Self::Session>;
}

/// A live connection to one server
///
/// Dropping the session closes the connection.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// List every table of `schema` with its approximate row count
    async fn list_tables(&self, schema: &str) -> Result<Vec<TableDescriptor>>;

    /// Ask the server to checksum one table
    async fn table_checksum(&self, schema: &str, table: &str) -> Result<TableChecksum>;

    /// Stop the statement still running on the server after its client-side
    /// future was abandoned
    ///
    /// Queries on one connection run in order, so the next request would
    /// otherwise queue behind the abandoned one.
    async fn cancel_in_flight(&self) -> Result<()> {
        Ok(())
    }
}

/// Await `future` unless the run is cancelled or the optional deadline passes
pub(crate) async fn bounded<T, F>(
    future: F,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
    operation: impl FnOnce() -> String,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let deadline = async move {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, future).await {
                Ok(result) => result,
                Err(_) => Err(VerifyError::Timeout {
                    operation: operation(),
                    timeout: limit,
                }),
            },
            None => future.await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(VerifyError::Cancelled),
        result = deadline => result,
    }
}
