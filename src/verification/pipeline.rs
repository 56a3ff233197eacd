// ABOUTME: Per-server checksum pipeline
// ABOUTME: Catalog read, partitioning, and the worker pool for a single endpoint

use super::{partition, read_catalog, run_workers, Connector, PipelineResult, PoolContext};
use crate::config::{ServerEndpoint, VerifyOptions};
use crate::error::Result;
use crate::utils::sanitize_identifier;
use indicatif::ProgressBar;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Compute the checksum map of one endpoint's schema
pub async fn checksum_schema<C: Connector>(
    connector: Arc<C>,
    endpoint: &ServerEndpoint,
    options: &VerifyOptions,
    cancel: &CancellationToken,
    progress: ProgressBar,
) -> Result<PipelineResult> {
    let span = tracing::info_span!("server", name = endpoint.label());

    async move {
        let mut tables =
            read_catalog(connector.as_ref(), endpoint, options.query_timeout, cancel).await?;

        let units = partition(&mut tables, options.parallelism);
        tracing::info!(
            "Checksumming {} table(s) of schema {} with {} worker(s)",
            tables.len(),
            sanitize_identifier(endpoint.schema()),
            options.parallelism
        );
        progress.inc_length(tables.len() as u64);

        let ctx = PoolContext {
            endpoint: endpoint.clone(),
            query_timeout: options.query_timeout,
            cancel: cancel.clone(),
            progress,
        };
        let result = run_workers(connector, &ctx, tables.into(), units).await?;

        if !result.failures.is_empty() {
            tracing::warn!(
                "{} table(s) could not be checksummed on {} server",
                result.failures.len(),
                endpoint.label()
            );
        }
        Ok(result)
    }
    .instrument(span)
    .await
}
