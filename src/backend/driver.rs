use crate::config::ConnectionConfig;
use crate::core::{BackendError, Params, TabularResult};
use crate::frame::LocalFrame;
use crate::schema::TableRef;
use super::WriteMode;

/// Native warehouse driver: performs the connection handshake.
pub trait Driver: Send + Sync {
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, BackendError>;
}

/// One open native connection.
pub trait DriverConnection: Send {
    /// Opens a new cursor on this connection.
    fn cursor(&mut self) -> Result<Box<dyn Cursor>, BackendError>;

    /// Bulk-loads a local frame into `table` (the driver's pandas-style
    /// upload path). Column identifiers are sent unquoted.
    fn write_frame(
        &mut self,
        frame: &LocalFrame,
        table: &TableRef,
        mode: WriteMode,
    ) -> Result<WriteSummary, BackendError>;

    fn close(&mut self) -> Result<(), BackendError>;
}

/// Statement cursor. `execute` binds `params` server-side.
pub trait Cursor: Send {
    fn execute(&mut self, query: &str, params: &Params) -> Result<(), BackendError>;

    /// All rows of the last executed statement.
    fn fetch_all(&mut self) -> Result<TabularResult, BackendError>;

    fn close(&mut self) -> Result<(), BackendError>;
}

/// Outcome of a bulk load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub rows_written: usize,
    pub chunks: usize,
    /// True when an ignore-if-exists write found the table and did nothing
    pub skipped: bool,
}
