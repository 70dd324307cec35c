use std::sync::Arc;

use tracing::{error, info, warn};

use crate::backend::{ExecutionMode, FallbackPolicy, WarehouseOptions, WriteMode, WriteSummary};
use crate::core::{GatewayError, WriteError};
use crate::frame::{Frame, FrameKind};
use crate::schema::{DdlSpec, SchemaInferencer, TableRef};
use super::WarehouseGateway;

/// Role granted read access on every table the gateway writes.
pub const READ_ONLY_ROLE: &str = "read_only_users";
/// Role granted full access on every table the gateway writes.
pub const ADMIN_ROLE: &str = "sysadmin";

impl WarehouseGateway {
    /// Writes `data` to `table` (qualified with the gateway's database and
    /// schema) and grants access on it.
    pub fn write(
        &mut self,
        table: &str,
        data: &Frame,
        mode_hint: Option<ExecutionMode>,
        write_mode: WriteMode,
    ) -> Result<bool, GatewayError> {
        let table = TableRef::resolve(table, None, None, &self.config);
        self.write_to(&table, data, mode_hint, write_mode)
    }

    /// Writes `data` to a fully qualified table.
    ///
    /// Without a hint the strategy follows the frame: distributed frames go
    /// through the compute session, everything else through the driver.
    /// Grants run only after the write succeeded.
    pub fn write_to(
        &mut self,
        table: &TableRef,
        data: &Frame,
        mode_hint: Option<ExecutionMode>,
        write_mode: WriteMode,
    ) -> Result<bool, GatewayError> {
        let requested = mode_hint.unwrap_or(match data.kind() {
            FrameKind::Distributed => ExecutionMode::Distributed,
            FrameKind::Local => ExecutionMode::Driver,
        });
        let mode = self.resolve_write_mode(requested)?;
        info!("Writing frame to table {} using {} ({})", table, mode, write_mode);

        let written = match mode {
            ExecutionMode::Distributed => self.write_distributed(table, data, write_mode),
            _ => self.write_driver(table, data, write_mode),
        };

        let summary = written.map_err(|e| {
            error!("Error writing frame to {} using {}: {}", table, mode, e);
            e
        })?;

        self.grant_access(table)?;
        if summary.skipped {
            info!("Table {} already exists, write skipped", table);
        } else {
            info!("Successfully wrote {} rows to {}", summary.rows_written, table);
        }
        Ok(true)
    }

    fn resolve_write_mode(&self, requested: ExecutionMode) -> Result<ExecutionMode, WriteError> {
        if requested != ExecutionMode::Columnar {
            return self
                .resolve_mode(requested)
                .ok_or(WriteError::Unavailable(requested));
        }
        match self.fallback {
            FallbackPolicy::Driver => {
                warn!(
                    "Execution mode '{}' cannot write data, using {} instead",
                    requested,
                    ExecutionMode::Driver
                );
                Ok(ExecutionMode::Driver)
            }
            FallbackPolicy::Strict => Err(WriteError::Unavailable(requested)),
        }
    }

    fn write_driver(
        &mut self,
        table: &TableRef,
        data: &Frame,
        write_mode: WriteMode,
    ) -> Result<WriteSummary, GatewayError> {
        let local = data.to_local()?;
        let connection = self.session.connection(&self.config)?;
        let summary = connection
            .write_frame(&local, table, write_mode)
            .map_err(|e| WriteError::Backend {
                table: table.qualified(),
                message: e.to_string(),
            })?;
        Ok(summary)
    }

    fn write_distributed(
        &mut self,
        table: &TableRef,
        data: &Frame,
        write_mode: WriteMode,
    ) -> Result<WriteSummary, GatewayError> {
        let session = self
            .compute
            .active_session()
            .map(Arc::clone)
            .ok_or(WriteError::Unavailable(ExecutionMode::Distributed))?;
        let backend_error = |e: crate::core::BackendError| WriteError::Backend {
            table: table.qualified(),
            message: e.to_string(),
        };

        let frame = match data {
            Frame::Distributed(frame) => frame.clone(),
            Frame::Local(frame) => session.create_frame(frame).map_err(backend_error)?,
        };
        let options = WarehouseOptions::from_config(&self.config);
        let summary = session
            .write_table(&frame, &options, table, write_mode)
            .map_err(backend_error)?;
        Ok(summary)
    }

    /// Grants `SELECT` to the read-only role and `ALL` to the admin role.
    pub fn grant_access(&mut self, table: &TableRef) -> Result<(), GatewayError> {
        for statement in [
            format!("GRANT SELECT ON {table} TO ROLE {READ_ONLY_ROLE}"),
            format!("GRANT ALL ON {table} TO ROLE {ADMIN_ROLE}"),
        ] {
            self.execute_statement(&statement).map_err(|e| WriteError::Grant {
                table: table.qualified(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Infers the DDL for `data`, schema and database defaulting to the
    /// gateway's.
    pub fn infer(
        &self,
        data: &Frame,
        table: &str,
        schema: Option<&str>,
        database: Option<&str>,
    ) -> Result<DdlSpec, GatewayError> {
        let table = TableRef::resolve(table, schema, database, &self.config);
        Ok(SchemaInferencer::infer(data, table)?)
    }

    /// Creates (or replaces) the table from the inferred schema and appends
    /// `data` to it.
    ///
    /// `CREATE OR REPLACE` drops any existing table of that name, rows
    /// included.
    pub fn create_and_populate(
        &mut self,
        data: &Frame,
        table: &str,
        schema: Option<&str>,
        database: Option<&str>,
        mode_hint: Option<ExecutionMode>,
    ) -> Result<bool, GatewayError> {
        let ddl = self.infer(data, table, schema, database)?;

        self.execute_statement(&ddl.statement).map_err(|e| {
            error!("Error creating and populating table {}: {}", ddl.table, e);
            WriteError::Create {
                table: ddl.table.qualified(),
                message: e.to_string(),
            }
        })?;
        info!("Successfully created table {}", ddl.table);

        self.write_to(&ddl.table, &ddl.prepared, mode_hint, WriteMode::Append)
    }
}
