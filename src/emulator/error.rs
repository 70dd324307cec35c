use thiserror::Error;

use crate::core::BackendError;

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("SQL compilation error: {0}")]
    Parse(String),
    #[error("Table '{0}' does not exist or not authorized")]
    TableNotFound(String),
    #[error("Object '{0}' already exists")]
    TableAlreadyExists(String),
    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),
    #[error("Bind variable {0} not set")]
    MissingBind(String),
    #[error("Incorrect username or password was specified")]
    AuthenticationFailed,
    #[error("Account '{0}' not found")]
    UnknownAccount(String),
    #[error("Numeric value or type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Insert value list does not match column list expecting {expected} but got {found}")]
    ColumnCountMismatch { expected: usize, found: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Binary Serialization error: {0}")]
    BinarySerialization(String),
    #[error("{0} is closed")]
    Closed(&'static str),
}

impl From<WarehouseError> for BackendError {
    fn from(err: WarehouseError) -> Self {
        match err {
            WarehouseError::AuthenticationFailed | WarehouseError::UnknownAccount(_) => {
                Self::Handshake(err.to_string())
            }
            WarehouseError::Closed(what) => Self::Closed(what),
            other => Self::Execution(other.to_string()),
        }
    }
}
