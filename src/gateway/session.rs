use std::sync::Arc;

use tracing::{error, info, warn};

use crate::backend::{Cursor, Driver, DriverConnection};
use crate::config::ConnectionConfig;
use crate::core::{BackendError, GatewayError};

/// One native connection plus at most one open cursor.
///
/// The connection is opened lazily by the first caller that needs it and
/// kept until [`ConnectionManager::close`].
pub struct ConnectionManager {
    driver: Arc<dyn Driver>,
    connection: Option<Box<dyn DriverConnection>>,
    cursor: Option<Box<dyn Cursor>>,
}

impl ConnectionManager {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            connection: None,
            cursor: None,
        }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Performs the handshake unless a connection is already open. A failed
    /// handshake leaves the manager closed.
    pub fn open(&mut self, config: &ConnectionConfig) -> Result<(), GatewayError> {
        if self.connection.is_some() {
            return Ok(());
        }
        match self.driver.connect(config) {
            Ok(connection) => {
                self.connection = Some(connection);
                info!("Successfully connected to warehouse account '{}'", config.account());
                Ok(())
            }
            Err(e) => {
                error!("Error connecting to warehouse: {}", e);
                Err(GatewayError::Connection(e.to_string()))
            }
        }
    }

    /// The open connection, connecting first if needed.
    pub fn connection(
        &mut self,
        config: &ConnectionConfig,
    ) -> Result<&mut Box<dyn DriverConnection>, GatewayError> {
        self.open(config)?;
        self.connection
            .as_mut()
            .ok_or_else(|| GatewayError::Connection(BackendError::Closed("connection").to_string()))
    }

    /// Replaces the current cursor with a new one.
    pub fn fresh_cursor(&mut self, config: &ConnectionConfig) -> Result<&mut Box<dyn Cursor>, GatewayError> {
        self.close_cursor();
        self.cursor(config)
    }

    /// The current cursor, opening one if there is none.
    pub fn cursor(&mut self, config: &ConnectionConfig) -> Result<&mut Box<dyn Cursor>, GatewayError> {
        if self.cursor.is_none() {
            let cursor = self
                .connection(config)?
                .cursor()
                .map_err(|e| GatewayError::Connection(e.to_string()))?;
            self.cursor = Some(cursor);
        }
        self.cursor
            .as_mut()
            .ok_or_else(|| GatewayError::Connection(BackendError::Closed("cursor").to_string()))
    }

    fn close_cursor(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            if let Err(e) = cursor.close() {
                warn!("Error closing cursor: {}", e);
            }
        }
    }

    /// Releases the cursor, then the connection. Calling it with nothing
    /// open is a no-op.
    pub fn close(&mut self) {
        self.close_cursor();
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                warn!("Error closing warehouse connection: {}", e);
            }
            info!("Warehouse connection closed");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}
