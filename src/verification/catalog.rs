// ABOUTME: Table catalog reader
// ABOUTME: Lists the tables of a schema with approximate row counts over a short-lived session

use super::{bounded, Connector, Session, TableDescriptor};
use crate::config::ServerEndpoint;
use crate::error::Result;
use crate::utils::sanitize_identifier;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// List every table in the endpoint's schema
///
/// Opens a dedicated session for the catalog query; the session is closed
/// when this function returns, whether or not the query succeeded.
pub async fn read_catalog<C: Connector>(
    connector: &C,
    endpoint: &ServerEndpoint,
    query_timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<Vec<TableDescriptor>> {
    let session = bounded(connector.open(endpoint), query_timeout, cancel, || {
        format!("connecting to {} server", endpoint.label())
    })
    .await?;
    tracing::info!("Connected to {} server", endpoint.label());

    let schema = sanitize_identifier(endpoint.schema());
    let tables = bounded(
        session.list_tables(endpoint.schema()),
        query_timeout,
        cancel,
        || format!("listing tables of schema {}", schema),
    )
    .await?;

    tracing::info!("Found {} table(s) in schema {}", tables.len(), schema);
    Ok(tables)
}
