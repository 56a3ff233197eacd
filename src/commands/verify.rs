// ABOUTME: Verify command implementation - compare schema checksums of two servers
// ABOUTME: Runs the checksum pipeline per server, sequentially or concurrently, then diffs the maps

use crate::config::{PipelineMode, VerifySettings};
use crate::error::Result;
use crate::postgres::PostgresConnector;
use crate::verification::{
    checksum_schema, compare_checksums, Connector, MismatchReport, PipelineResult,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything produced by a verification run
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub source: PipelineResult,
    pub target: PipelineResult,
    pub report: MismatchReport,
}

impl VerifyOutcome {
    /// True only when every table was checksummed on both servers and matched
    pub fn all_match(&self) -> bool {
        self.report.is_empty() && self.unverified_tables().is_empty()
    }

    /// Tables whose checksum could not be obtained on at least one server
    pub fn unverified_tables(&self) -> BTreeSet<&str> {
        self.source
            .failures
            .iter()
            .chain(&self.target.failures)
            .map(|failure| failure.table.as_str())
            .collect()
    }

    /// Mismatched or unverified tables, each counted once
    pub fn failed_tables(&self) -> BTreeSet<&str> {
        let mut failed = self.unverified_tables();
        failed.extend(self.report.tables());
        failed
    }
}

/// Verify that the source and target servers hold identical data
///
/// Connects to both PostgreSQL servers, checksums every table of the selected
/// schema(s), and compares the results.
///
/// # Errors
///
/// This function will return an error if:
/// - Cannot connect to source or target database
/// - Cannot list the tables of a schema (missing schema, insufficient privileges)
/// - The run is cancelled through `cancel`
///
/// A table whose checksum fails is not an error; it is left out of that
/// server's map and listed as unverified, so the outcome never counts as a
/// full match.
///
/// # Examples
///
/// ```no_run
/// # use postgres_schema_verifier::commands::verify;
/// # use postgres_schema_verifier::config::{
/// #     SchemaSelection, ServersConfig, VerifyOptions, VerifySettings,
/// # };
/// # use tokio_util::sync::CancellationToken;
/// # async fn example() -> postgres_schema_verifier::error::Result<()> {
/// let servers = ServersConfig::load("servers.yaml".as_ref())?;
/// let schemas = SchemaSelection::resolve(Some("public".into()), None, None)?;
/// let settings = VerifySettings::new(servers, &schemas, VerifyOptions::default());
///
/// let outcome = verify(&settings, CancellationToken::new()).await?;
/// println!("{}", outcome.report.len());
/// # Ok(())
/// # }
/// ```
pub async fn verify(settings: &VerifySettings, cancel: CancellationToken) -> Result<VerifyOutcome> {
    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .map(|style| style.progress_chars("##-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let outcome =
        verify_with(Arc::new(PostgresConnector), settings, cancel, progress.clone()).await;
    progress.finish_and_clear();
    outcome
}

/// Run both pipelines through `connector` and compare the results
pub async fn verify_with<C: Connector>(
    connector: Arc<C>,
    settings: &VerifySettings,
    cancel: CancellationToken,
    progress: ProgressBar,
) -> Result<VerifyOutcome> {
    let options = &settings.options;
    tracing::info!("Starting schema checksum verification...");
    tracing::info!(
        "Source schema: {}, target schema: {}",
        settings.source.schema(),
        settings.target.schema()
    );

    let (source, target) = match options.mode {
        PipelineMode::Sequential => {
            let source = checksum_schema(
                Arc::clone(&connector),
                &settings.source,
                options,
                &cancel,
                progress.clone(),
            )
            .await?;
            let target =
                checksum_schema(connector, &settings.target, options, &cancel, progress).await?;
            (source, target)
        }
        PipelineMode::Concurrent => {
            let run_cancel = cancel.child_token();
            let source_run = cancel_on_error(
                checksum_schema(
                    Arc::clone(&connector),
                    &settings.source,
                    options,
                    &run_cancel,
                    progress.clone(),
                ),
                &run_cancel,
            );
            let target_run = cancel_on_error(
                checksum_schema(connector, &settings.target, options, &run_cancel, progress),
                &run_cancel,
            );

            let (source, target) = tokio::join!(source_run, target_run);
            first_fatal(source, target)?
        }
    };

    let report = compare_checksums(&source.checksums, &target.checksums, options.comparison);
    tracing::info!(
        "Compared {} source and {} target checksum(s): {} mismatch(es)",
        source.checksums.len(),
        target.checksums.len(),
        report.len()
    );

    Ok(VerifyOutcome {
        source,
        target,
        report,
    })
}

/// Cancel the sibling pipeline as soon as this one fails
async fn cancel_on_error<T>(
    run: impl Future<Output = Result<T>>,
    cancel: &CancellationToken,
) -> Result<T> {
    let result = run.await;
    if let Err(e) = &result {
        if !e.is_cancelled() {
            tracing::error!("Pipeline failed, cancelling the other server: {}", e);
        }
        cancel.cancel();
    }
    result
}

/// Join two pipeline results, reporting the failure that caused any cancellation
fn first_fatal<A, B>(source: Result<A>, target: Result<B>) -> Result<(A, B)> {
    match (source, target) {
        (Ok(source), Ok(target)) => Ok((source, target)),
        (Err(source_err), Err(target_err)) if source_err.is_cancelled() => Err(target_err),
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

/// Human-readable report printed at the end of a run
pub fn render_report(outcome: &VerifyOutcome) -> String {
    let mut out = String::new();

    if outcome.all_match() {
        out.push_str("All table checksums match.");
    } else if outcome.report.is_empty() {
        let _ = write!(
            out,
            "{} table(s) could not be verified.",
            outcome.unverified_tables().len()
        );
    } else {
        out.push_str("Mismatched tables:");
        for (table, mismatch) in outcome.report.iter() {
            let _ = write!(out, "\n  - {}: {}", table, mismatch);
        }
    }

    for (label, result) in [("source", &outcome.source), ("target", &outcome.target)] {
        if result.failures.is_empty() {
            continue;
        }
        let mut tables: Vec<&str> = result.failures.iter().map(|f| f.table.as_str()).collect();
        tables.sort_unstable();
        let _ = write!(
            out,
            "\nChecksum unavailable on {}: {}",
            label,
            tables.join(", ")
        );
    }

    out
}
