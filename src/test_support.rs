// ABOUTME: In-memory connector used by unit tests
// ABOUTME: Simulates catalog queries, checksum results, and failures without a server

use crate::config::ServerEndpoint;
use crate::error::{Result, VerifyError};
use crate::verification::{Connector, Session, TableChecksum, TableDescriptor};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, Default)]
pub struct MockServer {
    pub tables: Vec<TableDescriptor>,
    pub checksums: HashMap<String, i64>,
    pub failing: HashSet<String>,
    pub hanging: HashSet<String>,
    pub refuse_connections: bool,
    pub catalog_fails: bool,
}

impl MockServer {
    /// Tables as `(name, approximate rows, checksum)` in catalog order
    pub fn new(tables: &[(&str, i64, i64)]) -> Self {
        Self {
            tables: tables
                .iter()
                .map(|(name, rows, _)| TableDescriptor::new(*name, *rows))
                .collect(),
            checksums: tables
                .iter()
                .map(|(name, _, checksum)| (name.to_string(), *checksum))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing(mut self, table: &str) -> Self {
        self.failing.insert(table.to_string());
        self
    }

    pub fn hanging(mut self, table: &str) -> Self {
        self.hanging.insert(table.to_string());
        self
    }

    pub fn refusing_connections(mut self) -> Self {
        self.refuse_connections = true;
        self
    }

    pub fn catalog_failure(mut self) -> Self {
        self.catalog_fails = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MockConnector {
    servers: Arc<HashMap<String, MockServer>>,
    sessions: Arc<AtomicUsize>,
    server_cancels: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    pub fn new(source: MockServer, target: MockServer) -> Self {
        let servers = HashMap::from([
            ("source".to_string(), source),
            ("target".to_string(), target),
        ]);
        Self {
            servers: Arc::new(servers),
            sessions: Arc::new(AtomicUsize::new(0)),
            server_cancels: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn server(&self, label: &str) -> &MockServer {
        &self.servers[label]
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// Number of server-side cancel requests sent by workers
    pub fn server_cancels(&self) -> usize {
        self.server_cancels.load(Ordering::SeqCst)
    }

    /// Tables whose checksum was requested, in request order
    pub fn checksum_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

/// Statements on one session run in order, like a real connection: a hung
/// statement keeps `busy` locked until `cancel_in_flight` is called, even after
/// the caller stops waiting for it.
pub struct MockSession {
    label: String,
    server: MockServer,
    calls: Arc<Mutex<Vec<String>>>,
    busy: Arc<tokio::sync::Mutex<()>>,
    abort: Arc<Notify>,
    server_cancels: Arc<AtomicUsize>,
}

#[async_trait]
impl Connector for MockConnector {
    type Session = MockSession;

    async fn open(&self, endpoint: &ServerEndpoint) -> Result<MockSession> {
        let server = self.server(endpoint.label()).clone();
        if server.refuse_connections {
            return Err(VerifyError::Connection {
                server: endpoint.label().to_string(),
                message: "Connection refused".to_string(),
            });
        }
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            label: endpoint.label().to_string(),
            server,
            calls: Arc::clone(&self.calls),
            busy: Arc::new(tokio::sync::Mutex::new(())),
            abort: Arc::new(Notify::new()),
            server_cancels: Arc::clone(&self.server_cancels),
        })
    }
}

#[async_trait]
impl Session for MockSession {
    async fn list_tables(&self, schema: &str) -> Result<Vec<TableDescriptor>> {
        if self.server.catalog_fails {
            return Err(VerifyError::Query {
                server: self.label.clone(),
                message: format!("schema \"{}\" does not exist", schema),
            });
        }
        Ok(self.server.tables.clone())
    }

    async fn table_checksum(&self, _schema: &str, table: &str) -> Result<TableChecksum> {
        self.calls.lock().unwrap().push(table.to_string());
        let connection = Arc::clone(&self.busy).lock_owned().await;

        if self.server.hanging.contains(table) {
            // The statement keeps running server-side until it is cancelled
            let abort = Arc::clone(&self.abort);
            tokio::spawn(async move {
                abort.notified().await;
                drop(connection);
            });
            return std::future::pending().await;
        }
        drop(connection);

        if self.server.failing.contains(table) {
            return Err(VerifyError::ChecksumFailure {
                table: table.to_string(),
                message: "permission denied".to_string(),
            });
        }
        match self.server.checksums.get(table) {
            Some(checksum) => Ok(TableChecksum {
                table: table.to_string(),
                checksum: *checksum,
            }),
            None => Err(VerifyError::ChecksumFailure {
                table: table.to_string(),
                message: format!("relation \"{}\" does not exist", table),
            }),
        }
    }

    async fn cancel_in_flight(&self) -> Result<()> {
        self.server_cancels.fetch_add(1, Ordering::SeqCst);
        self.abort.notify_one();
        Ok(())
    }
}
