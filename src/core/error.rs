use thiserror::Error;
use crate::backend::ExecutionMode;

/// Top-level error of the warehouse gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Missing required connection parameters: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Query failed ({mode}): {message}")]
    Backend { mode: ExecutionMode, message: String },
    #[error("Execution mode '{0}' is not available")]
    Unavailable(ExecutionMode),
}

impl QueryError {
    pub fn backend(mode: ExecutionMode, err: impl std::fmt::Display) -> Self {
        Self::Backend {
            mode,
            message: err.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Data has duplicate column names: {}", .0.join(", "))]
    DuplicateColumns(Vec<String>),
    #[error("Data has no columns")]
    NoColumns,
    #[error("Column '{column}' has {found} values, expected {expected}")]
    RaggedColumn { column: String, expected: usize, found: usize },
    #[error("Row {row} has {found} values, expected {expected}")]
    RaggedRow { row: usize, expected: usize, found: usize },
    #[error("Unsupported tabular structure: {0}")]
    Unsupported(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("Failed to write to {table}: {message}")]
    Backend { table: String, message: String },
    #[error("Failed to create table {table}: {message}")]
    Create { table: String, message: String },
    #[error("Failed to grant access on {table}: {message}")]
    Grant { table: String, message: String },
    #[error("Execution mode '{0}' cannot write data")]
    Unavailable(ExecutionMode),
}

/// Failure reported by a backend capability (driver, compute engine,
/// columnar engine). The message is kept verbatim for diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("{0}")]
    Execution(String),
    #[error("{0} is closed")]
    Closed(&'static str),
}
