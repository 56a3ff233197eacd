// ABOUTME: CLI entry point for postgres-schema-verifier
// ABOUTME: Parses flags, loads the servers file, runs verification, and prints the report

use clap::Parser;
use postgres_schema_verifier::commands;
use postgres_schema_verifier::config::{
    SchemaSelection, ServersConfig, VerifyOptions, VerifySettings,
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "postgres-schema-verifier")]
#[command(
    about = "Verify two PostgreSQL servers hold identical data by comparing per-table checksums",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration file (server1.dsn and server2.dsn)
    #[arg(short = 'f', long = "config")]
    config: PathBuf,
    /// Number of parallel checksum workers per server
    #[arg(short = 'p', long, default_value_t = 1)]
    parallelism: usize,
    /// Schema name, applied to both servers
    #[arg(short = 's', long)]
    schema: Option<String>,
    /// Schema to inspect on server1 (overrides --schema)
    #[arg(long)]
    source_schema: Option<String>,
    /// Schema to inspect on server2 (overrides --schema)
    #[arg(long)]
    target_schema: Option<String>,
    /// Checksum both servers at the same time instead of one after the other
    #[arg(long)]
    concurrent: bool,
    /// Deadline in seconds for each catalog and checksum query (0 waits indefinitely)
    #[arg(long, default_value_t = 0)]
    query_timeout: u64,
    /// Only report source tables that are missing or different on the target
    #[arg(long)]
    source_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let schemas = SchemaSelection::resolve(cli.schema, cli.source_schema, cli.target_schema)?;
    let options = VerifyOptions::from_args(
        cli.parallelism,
        cli.concurrent,
        cli.source_only,
        cli.query_timeout,
    )?;
    let servers = ServersConfig::load(&cli.config)?;
    let settings = VerifySettings::new(servers, &schemas, options);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling verification...");
            on_interrupt.cancel();
        }
    });

    let outcome = commands::verify(&settings, cancel).await?;
    println!("{}", commands::render_report(&outcome));

    if !outcome.all_match() {
        anyhow::bail!("{} table(s) failed verification", outcome.failed_tables().len());
    }

    Ok(())
}
