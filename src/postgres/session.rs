// ABOUTME: PostgreSQL implementation of the checksum connector
// ABOUTME: Catalog query over pg_class and an MD5-based 64-bit table checksum

use super::connection::{connect, describe_query_error, make_tls};
use crate::config::ServerEndpoint;
use crate::error::{Result, VerifyError};
use crate::utils::{quote_identifier, sanitize_identifier};
use crate::verification::{Connector, Session, TableChecksum, TableDescriptor};
use async_trait::async_trait;
use tokio_postgres::Client;

/// Opens TLS connections using the endpoint's connection string
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnector;

#[async_trait]
impl Connector for PostgresConnector {
    type Session = PostgresSession;

    async fn open(&self, endpoint: &ServerEndpoint) -> Result<PostgresSession> {
        let client = connect(endpoint.label(), endpoint.dsn()).await?;
        Ok(PostgresSession {
            server: endpoint.label().to_string(),
            client,
        })
    }
}

pub struct PostgresSession {
    server: String,
    client: Client,
}

impl PostgresSession {
    fn query_error(&self, e: &tokio_postgres::Error) -> VerifyError {
        VerifyError::Query {
            server: self.server.clone(),
            message: describe_query_error(e),
        }
    }
}

/// Ordinary and partitioned tables of a schema; partitions are covered by their parent
const LIST_TABLES_QUERY: &str = "
    SELECT c.relname, GREATEST(c.reltuples, 0)::bigint
    FROM pg_catalog.pg_class c
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1
      AND c.relkind IN ('r', 'p')
      AND NOT c.relispartition
    ORDER BY c.relname
";

/// Build the checksum query for one table
///
/// Rows are rendered as text, sorted, concatenated and hashed with MD5. The
/// first 64 bits of the digest become the checksum; an empty table yields 0.
pub fn checksum_query(schema: &str, table: &str) -> String {
    format!(
        "SELECT
            $1::text AS table_name,
            COALESCE(
                ('x' || substr(md5(string_agg(t::text, E'\\n' ORDER BY t::text)), 1, 16))::bit(64)::bigint,
                0
            ) AS checksum
        FROM {}.{} AS t",
        quote_identifier(schema),
        quote_identifier(table)
    )
}

#[async_trait]
impl Session for PostgresSession {
    async fn list_tables(&self, schema: &str) -> Result<Vec<TableDescriptor>> {
        let exists = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_namespace WHERE nspname = $1)",
                &[&schema],
            )
            .await
            .map_err(|e| self.query_error(&e))?;

        if !exists.get::<_, bool>(0) {
            return Err(VerifyError::Query {
                server: self.server.clone(),
                message: format!("Schema {} does not exist", sanitize_identifier(schema)),
            });
        }

        let rows = self
            .client
            .query(LIST_TABLES_QUERY, &[&schema])
            .await
            .map_err(|e| self.query_error(&e))?;

        Ok(rows
            .iter()
            .map(|row| TableDescriptor {
                name: row.get(0),
                approximate_row_count: row.get(1),
            })
            .collect())
    }

    async fn table_checksum(&self, schema: &str, table: &str) -> Result<TableChecksum> {
        let row = self
            .client
            .query_one(&checksum_query(schema, table), &[&table])
            .await
            .map_err(|e| VerifyError::ChecksumFailure {
                table: sanitize_identifier(table),
                message: describe_query_error(&e),
            })?;

        Ok(TableChecksum {
            table: row.get(0),
            checksum: row.get(1),
        })
    }

    async fn cancel_in_flight(&self) -> Result<()> {
        let tls = make_tls().map_err(|message| VerifyError::Connection {
            server: self.server.clone(),
            message,
        })?;

        self.client
            .cancel_token()
            .cancel_query(tls)
            .await
            .map_err(|e| self.query_error(&e))
    }
}
