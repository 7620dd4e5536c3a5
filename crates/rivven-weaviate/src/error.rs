//! Error types for rivven-weaviate
//!
//! [`ConnectorError`] covers configuration, connection, per-record decode and
//! store failures. [`BatchError`] ties the first failing record of a batch to
//! the number of records written before it.

use crate::traits::Operation;
use thiserror::Error;

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Errors that can occur in connector operations
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Configuration is malformed or contradictory
    #[error("configuration error: {0}")]
    Config(String),

    /// Store could not be reached
    #[error("connection error: {0}")]
    Connection(String),

    /// Store rejected the credentials
    #[error("authentication error: {0}")]
    Auth(String),

    /// `write` was called before `open`
    #[error("destination is not open")]
    NotOpen,

    /// Record payload missing or not a JSON object
    #[error("payload decode error: {0}")]
    PayloadDecode(String),

    /// Embedding metadata recognized but malformed
    #[error("vector decode error: {0}")]
    VectorDecode(String),

    /// Embedding metadata in neither base64 nor CSV form
    #[error("unsupported vector format: {0:?}")]
    UnsupportedVectorFormat(String),

    /// Store rejected or failed a write
    #[error("error {action} object: {message}")]
    StoreOperation {
        /// What the adapter was doing (`creating`, `updating`, `deleting`)
        action: &'static str,
        /// HTTP status returned by the store, if a response arrived
        status: Option<u16>,
        /// Error detail reported by the store
        message: String,
    },

    /// Record carries an operation the sink cannot handle
    #[error("unsupported operation {0:?}")]
    Routing(String),

    /// Request deadline elapsed
    #[error("timeout: {0}")]
    Timeout(String),

    /// The write was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,
}

impl ConnectorError {
    /// Check if redelivering the record may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::Cancelled => true,
            Self::StoreOperation { status, .. } => match status {
                None => true,
                Some(code) => *code == 429 || *code >= 500,
            },
            _ => false,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a store operation error
    pub fn store(action: &'static str, status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::StoreOperation {
            action,
            status,
            message: msg.into(),
        }
    }

    /// HTTP status attached to a store error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::StoreOperation { status, .. } => *status,
            _ => None,
        }
    }
}

/// First failure of a batch write.
///
/// `written` is the number of records stored before the failing one, which is
/// also the failing record's zero-based index.
#[derive(Debug, Error)]
#[error("error routing {operation}: {source}")]
pub struct BatchError {
    /// Records written before the failure
    pub written: usize,
    /// Operation of the failing record
    pub operation: Operation,
    /// Underlying failure
    #[source]
    pub source: ConnectorError,
}

impl BatchError {
    /// Wrap a record failure at `index`
    pub fn new(index: usize, operation: Operation, source: ConnectorError) -> Self {
        Self {
            written: index,
            operation,
            source,
        }
    }
}
