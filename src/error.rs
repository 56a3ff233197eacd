// ABOUTME: Error taxonomy for schema verification
// ABOUTME: Separates fatal per-endpoint errors from per-table failures recovered by workers

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VerifyError>;

#[derive(Debug, Error)]
pub enum VerifyError {
    /// Invalid command-line input or configuration document
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A server endpoint could not be reached or authenticated
    #[error("connection error ({server}): {message}")]
    Connection { server: String, message: String },

    /// The catalog (metadata) query failed
    #[error("query error ({server}): {message}")]
    Query { server: String, message: String },

    /// A single table's checksum command failed
    #[error("checksum failed for table {table}: {message}")]
    ChecksumFailure { table: String, message: String },

    /// A query did not finish before its deadline
    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("verification cancelled")]
    Cancelled,
}

impl VerifyError {
    pub fn configuration(message: impl Into<String>) -> Self {
        VerifyError::Configuration(message.into())
    }

    /// Per-table failures are logged and skipped instead of aborting the pipeline
    pub fn is_table_local(&self) -> bool {
        matches!(
            self,
            VerifyError::ChecksumFailure { .. } | VerifyError::Timeout { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, VerifyError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_local_errors() {
        let failure = VerifyError::ChecksumFailure {
            table: "orders".to_string(),
            message: "relation does not exist".to_string(),
        };
        assert!(failure.is_table_local());

        let timeout = VerifyError::Timeout {
            operation: "checksum of orders".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(timeout.is_table_local());

        assert!(!VerifyError::configuration("missing schema").is_table_local());
        assert!(!VerifyError::Cancelled.is_table_local());
    }

    #[test]
    fn test_error_messages_name_the_server() {
        let err = VerifyError::Connection {
            server: "target".to_string(),
            message: "Connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "connection error (target): Connection refused"
        );
    }
}
