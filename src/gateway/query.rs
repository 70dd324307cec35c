use std::sync::Arc;

use tracing::{error, info};

use crate::backend::{ExecutionMode, WarehouseOptions};
use crate::core::{GatewayError, Params, QueryError, TabularResult};
use crate::frame::DistributedFrame;
use crate::schema::TableRef;
use super::{truncate_query, WarehouseGateway};

impl WarehouseGateway {
    /// Runs `query` on the requested backend. Result columns are always
    /// lowercased. `params` are bound server-side.
    ///
    /// An unavailable mode runs on the driver instead unless the gateway's
    /// fallback policy is strict. Failures are not retried and leave the
    /// connection as it was.
    pub fn execute(
        &mut self,
        query: &str,
        mode: ExecutionMode,
        params: &Params,
    ) -> Result<TabularResult, GatewayError> {
        let resolved = self.resolve_mode(mode).ok_or(QueryError::Unavailable(mode))?;
        info!("Executing query ({}): {}", resolved, truncate_query(query));

        let result = match resolved {
            ExecutionMode::Driver => self.execute_driver(query, params),
            ExecutionMode::Distributed => self
                .read_distributed(query, params)
                .map(DistributedFrame::into_result),
            ExecutionMode::Columnar => self.execute_columnar(query, params),
        };

        match result {
            Ok(result) => Ok(result.with_lowercase_columns()),
            Err(e) => {
                error!("Error executing {} query: {}", resolved, e);
                Err(e)
            }
        }
    }

    /// Loads a query result as a distributed frame on the gateway's compute
    /// session, with lowercased column names.
    pub fn read_distributed(&mut self, query: &str, params: &Params) -> Result<DistributedFrame, GatewayError> {
        let session = self
            .compute
            .active_session()
            .map(Arc::clone)
            .ok_or(QueryError::Unavailable(ExecutionMode::Distributed))?;
        let options = WarehouseOptions::from_config(&self.config);
        let frame = session
            .read_query(&options, query, params)
            .map_err(|e| QueryError::backend(ExecutionMode::Distributed, e))?;
        Ok(frame.with_lowercase_columns())
    }

    fn execute_driver(&mut self, query: &str, params: &Params) -> Result<TabularResult, GatewayError> {
        let cursor = self.session.fresh_cursor(&self.config)?;
        cursor
            .execute(query, params)
            .map_err(|e| QueryError::backend(ExecutionMode::Driver, e))?;
        let result = cursor
            .fetch_all()
            .map_err(|e| QueryError::backend(ExecutionMode::Driver, e))?;
        Ok(result)
    }

    fn execute_columnar(&self, query: &str, params: &Params) -> Result<TabularResult, GatewayError> {
        let engine = self
            .backends
            .columnar()
            .ok_or(QueryError::Unavailable(ExecutionMode::Columnar))?;
        let result = engine
            .read_database(&self.config, query, params)
            .map_err(|e| QueryError::backend(ExecutionMode::Columnar, e))?;
        Ok(result)
    }

    /// Runs a statement on a new cursor and discards any result.
    pub fn execute_statement(&mut self, query: &str) -> Result<(), GatewayError> {
        let cursor = self.session.fresh_cursor(&self.config)?;
        cursor.execute(query, &Params::new()).map_err(|e| {
            error!("Error executing query: {}", e);
            QueryError::backend(ExecutionMode::Driver, e)
        })?;
        Ok(())
    }

    /// Driver fetch that reuses the open cursor when there is one.
    pub fn fetch(&mut self, query: &str, params: &Params) -> Result<TabularResult, GatewayError> {
        let cursor = self.session.cursor(&self.config)?;
        cursor
            .execute(query, params)
            .map_err(|e| QueryError::backend(ExecutionMode::Driver, e))?;
        let result = cursor
            .fetch_all()
            .map_err(|e| QueryError::backend(ExecutionMode::Driver, e))?;
        Ok(result.with_lowercase_columns())
    }

    /// `DROP TABLE IF EXISTS` on the table, qualified with the gateway's
    /// database and schema when not given.
    pub fn drop_table(&mut self, table: &str) -> Result<(), GatewayError> {
        let table = TableRef::resolve(table, None, None, &self.config);
        self.execute_statement(&format!("DROP TABLE IF EXISTS {table}"))?;
        info!("Successfully dropped table {}", table);
        Ok(())
    }
}
