// ABOUTME: Worker pool that fetches table checksums from one server
// ABOUTME: Each worker owns a connection and one work unit; results go to the shared aggregator

use super::{
    bounded, ChecksumAggregator, Connector, PipelineResult, Session, TableDescriptor, WorkUnit,
};
use crate::config::ServerEndpoint;
use crate::error::{Result, VerifyError};
use crate::utils::sanitize_identifier;
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Per-server settings shared by every worker in the pool
#[derive(Clone)]
pub struct PoolContext {
    pub endpoint: ServerEndpoint,
    pub query_timeout: Option<Duration>,
    pub cancel: CancellationToken,
    pub progress: ProgressBar,
}

struct Worker<C: Connector> {
    id: usize,
    unit: WorkUnit,
    tables: Arc<[TableDescriptor]>,
    connector: Arc<C>,
    aggregator: ChecksumAggregator,
    endpoint: ServerEndpoint,
    query_timeout: Option<Duration>,
    cancel: CancellationToken,
    progress: ProgressBar,
}

impl<C: Connector> Worker<C> {
    async fn run(self) -> Result<()> {
        let endpoint = &self.endpoint;
        let session = bounded(
            self.connector.open(endpoint),
            self.query_timeout,
            &self.cancel,
            || format!("connecting to {} server", endpoint.label()),
        )
        .await?;

        tracing::debug!(
            "Worker {} processing {} table(s) [{}..{})",
            self.id,
            self.unit.len(),
            self.unit.start,
            self.unit.end
        );

        for table in &self.tables[self.unit.range()] {
            let display_name = sanitize_identifier(&table.name);
            tracing::info!("Getting checksum for table {}", display_name);

            let result = bounded(
                session.table_checksum(endpoint.schema(), &table.name),
                self.query_timeout,
                &self.cancel,
                || format!("checksum of table {}", display_name),
            )
            .await;

            match result {
                Ok(row) => {
                    tracing::debug!("Checksum for {}: {}", display_name, row.checksum);
                    self.aggregator.insert(table.name.clone(), row.checksum);
                }
                Err(e) if e.is_table_local() => {
                    tracing::error!("Error getting checksum for table {}: {}", display_name, e);
                    if matches!(e, VerifyError::Timeout { .. }) {
                        self.cancel_abandoned(&session, &display_name).await;
                    }
                    self.aggregator.record_failure(table.name.clone(), e.to_string());
                }
                Err(e) => return Err(e),
            }

            self.progress.inc(1);
            self.progress
                .set_message(format!("{}: {}", endpoint.label(), display_name));
        }

        Ok(())
    }

    /// Stop a timed-out checksum on the server so the next table is not queued behind it
    async fn cancel_abandoned(&self, session: &C::Session, display_name: &str) {
        let cancelled = bounded(
            session.cancel_in_flight(),
            self.query_timeout,
            &self.cancel,
            || format!("cancelling checksum of table {}", display_name),
        )
        .await;

        if let Err(e) = cancelled {
            tracing::warn!(
                "Could not cancel checksum of table {} on the server: {}",
                display_name,
                e
            );
        }
    }
}

/// Run one worker per non-empty unit and wait for all of them
///
/// A table whose checksum fails is logged and left out of the result. A
/// worker that cannot connect aborts the pool: the remaining workers are
/// cancelled and drained before the error is returned.
pub async fn run_workers<C: Connector>(
    connector: Arc<C>,
    ctx: &PoolContext,
    tables: Arc<[TableDescriptor]>,
    units: Vec<WorkUnit>,
) -> Result<PipelineResult> {
    let aggregator = ChecksumAggregator::new();
    let pool_cancel = ctx.cancel.child_token();
    let mut workers = JoinSet::new();

    for (id, unit) in units.into_iter().enumerate() {
        if unit.is_empty() {
            tracing::debug!("Worker {} has no tables assigned", id);
            continue;
        }

        let worker = Worker {
            id,
            unit,
            tables: Arc::clone(&tables),
            connector: Arc::clone(&connector),
            aggregator: aggregator.clone(),
            endpoint: ctx.endpoint.clone(),
            query_timeout: ctx.query_timeout,
            cancel: pool_cancel.clone(),
            progress: ctx.progress.clone(),
        };
        workers.spawn(worker.run().instrument(tracing::info_span!("worker", id)));
    }

    let mut fatal: Option<VerifyError> = None;
    while let Some(joined) = workers.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(VerifyError::Cancelled),
        };

        if let Err(e) = outcome {
            pool_cancel.cancel();
            // Keep the root cause rather than the cancellations it triggered
            if fatal.as_ref().map_or(true, VerifyError::is_cancelled) {
                fatal = Some(e);
            }
        }
    }

    match fatal {
        Some(e) => Err(e),
        None => Ok(PipelineResult::from(aggregator)),
    }
}
