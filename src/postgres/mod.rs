// ABOUTME: PostgreSQL backend for the checksum engine
// ABOUTME: Exports connection management and the connector implementation

pub mod connection;
pub mod session;

pub use connection::connect;
pub use session::{checksum_query, PostgresConnector, PostgresSession};
