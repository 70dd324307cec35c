//! In-process reference warehouse.
//!
//! [`MemoryWarehouse`] stores tables in a [`Catalog`] and exposes it through
//! all three backend seams: a native driver, a distributed-compute engine
//! and a columnar engine. Catalogs persist as bincode snapshots.

mod error;
pub mod parser;
pub mod catalog;
mod conditions;
mod executor;
mod storage;

pub use catalog::{Catalog, Grant, StoredColumn, StoredTable};
pub use error::WarehouseError;
pub use executor::{SessionContext, StatementExecutor};

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{
    BackendRegistry, ColumnarEngine, ComputeEngine, ComputeSession, ComputeSessionConfig, Cursor,
    Driver, DriverConnection, WarehouseOptions, WriteMode, WriteSummary,
};
use crate::config::{ConnectionConfig, DEFAULT_DATABASE, DEFAULT_SCHEMA};
use crate::core::{BackendError, Params, TabularResult, Value, WarehouseType};
use crate::frame::{DistributedFrame, LocalFrame, TabularSource};
use crate::schema::{warehouse_type, TableRef};

#[derive(Debug, Default)]
struct Stats {
    connections_opened: AtomicUsize,
    connections_closed: AtomicUsize,
    cursors_opened: AtomicUsize,
    sessions_created: AtomicUsize,
    sessions_stopped: AtomicUsize,
    statements_executed: AtomicUsize,
}

impl Stats {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Point-in-time copy of the warehouse's activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connections_opened: usize,
    pub connections_closed: usize,
    pub cursors_opened: usize,
    pub sessions_created: usize,
    pub sessions_stopped: usize,
    pub statements_executed: usize,
}

impl StatsSnapshot {
    #[must_use]
    pub const fn open_connections(&self) -> usize {
        self.connections_opened.saturating_sub(self.connections_closed)
    }
}

#[derive(Debug)]
struct Shared {
    catalog: RwLock<Catalog>,
    stats: Stats,
    compute_offline: AtomicBool,
}

impl Shared {
    fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn catalog_mut(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn authenticate(&self, account: &str, user: &str, password: &str) -> Result<(), BackendError> {
        self.catalog()
            .authenticate(account, user, password)
            .map_err(BackendError::from)
    }

    fn run(&self, ctx: &SessionContext, query: &str, params: &Params) -> Result<TabularResult, BackendError> {
        let stmt = parser::parse_statement(query)?.bind(params)?;
        let result = StatementExecutor::execute(&mut self.catalog_mut(), ctx, stmt)?;
        Stats::bump(&self.stats.statements_executed);
        Ok(result)
    }

    fn load(
        &self,
        table: &TableRef,
        columns: &[(String, WarehouseType)],
        rows: Vec<Vec<Value>>,
        mode: WriteMode,
    ) -> Result<WriteSummary, BackendError> {
        let key = table.qualified().to_uppercase();
        let summary = self.catalog_mut().write_frame(&key, columns, rows, mode)?;
        debug!(
            "Loaded {} rows into {} in {} chunks",
            summary.rows_written, key, summary.chunks
        );
        Ok(summary)
    }
}

/// Unquoted identifiers are upper-cased on the way in; untyped columns land
/// as STRING.
fn load_columns<'a>(columns: impl Iterator<Item = (&'a str, Option<WarehouseType>)>) -> Vec<(String, WarehouseType)> {
    columns
        .map(|(name, ty)| (name.to_uppercase(), ty.unwrap_or(WarehouseType::String)))
        .collect()
}

/// Shared handle to one reference warehouse. Clones see the same data.
#[derive(Debug, Clone)]
pub struct MemoryWarehouse {
    shared: Arc<Shared>,
}

impl MemoryWarehouse {
    pub fn new(account: &str) -> Self {
        Self::from_catalog(Catalog::new(account))
    }

    fn from_catalog(catalog: Catalog) -> Self {
        Self {
            shared: Arc::new(Shared {
                catalog: RwLock::new(catalog),
                stats: Stats::default(),
                compute_offline: AtomicBool::new(false),
            }),
        }
    }

    pub fn create_user(&self, name: &str, password: &str) {
        self.shared.catalog_mut().add_user(name, password);
    }

    #[must_use]
    pub fn driver(&self) -> MemoryDriver {
        MemoryDriver {
            shared: Arc::clone(&self.shared),
        }
    }

    #[must_use]
    pub fn compute_engine(&self) -> MemoryComputeEngine {
        MemoryComputeEngine {
            shared: Arc::clone(&self.shared),
        }
    }

    #[must_use]
    pub fn columnar_engine(&self) -> MemoryColumnarEngine {
        MemoryColumnarEngine { driver: self.driver() }
    }

    /// Registry with all three backends linked.
    #[must_use]
    pub fn registry(&self) -> BackendRegistry {
        BackendRegistry::new(Arc::new(self.driver()))
            .with_compute(Arc::new(self.compute_engine()))
            .with_columnar(Arc::new(self.columnar_engine()))
    }

    /// While offline, the compute engine refuses to create sessions.
    pub fn set_compute_offline(&self, offline: bool) {
        self.shared.compute_offline.store(offline, Ordering::SeqCst);
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        let s = &self.shared.stats;
        StatsSnapshot {
            connections_opened: s.connections_opened.load(Ordering::SeqCst),
            connections_closed: s.connections_closed.load(Ordering::SeqCst),
            cursors_opened: s.cursors_opened.load(Ordering::SeqCst),
            sessions_created: s.sessions_created.load(Ordering::SeqCst),
            sessions_stopped: s.sessions_stopped.load(Ordering::SeqCst),
            statements_executed: s.statements_executed.load(Ordering::SeqCst),
        }
    }

    /// Runs one statement directly against the catalog, resolving
    /// unqualified names against the default database and schema.
    pub fn execute(&self, sql: &str) -> Result<TabularResult, WarehouseError> {
        let ctx = SessionContext::new(DEFAULT_DATABASE, DEFAULT_SCHEMA);
        let stmt = parser::parse_statement(sql)?;
        StatementExecutor::execute(&mut self.shared.catalog_mut(), &ctx, stmt)
    }

    #[must_use]
    pub fn account(&self) -> String {
        self.shared.catalog().account.clone()
    }

    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.shared.catalog().table_names()
    }

    /// Copy of a stored table; `name` is `db.schema.table`, any case.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<StoredTable> {
        self.shared.catalog().table(&name.to_uppercase()).ok().cloned()
    }

    #[must_use]
    pub fn row_count(&self, name: &str) -> Option<usize> {
        self.table(name).map(|t| t.rows.len())
    }

    #[must_use]
    pub fn grants_on(&self, name: &str) -> Vec<Grant> {
        self.shared.catalog().grants_on(&name.to_uppercase())
    }

    pub fn save(&self, path: &Path) -> Result<(), WarehouseError> {
        storage::save_snapshot(&self.shared.catalog(), path)
    }

    pub fn load(path: &Path) -> Result<Self, WarehouseError> {
        let catalog = storage::load_snapshot(path)?.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no snapshot at {}", path.display()),
            )
        })?;
        Ok(Self::from_catalog(catalog))
    }

    /// Loads the snapshot at `path`, or starts an empty warehouse for
    /// `account` when there is none.
    pub fn open_or_init(path: &Path, account: &str) -> Result<Self, WarehouseError> {
        match storage::load_snapshot(path)? {
            Some(catalog) => {
                info!("Loaded warehouse snapshot from {}", path.display());
                Ok(Self::from_catalog(catalog))
            }
            None => {
                info!("No snapshot at {}, starting empty warehouse", path.display());
                Ok(Self::new(account))
            }
        }
    }
}

pub struct MemoryDriver {
    shared: Arc<Shared>,
}

impl Driver for MemoryDriver {
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, BackendError> {
        self.shared
            .authenticate(config.account(), config.user(), config.password())?;
        Stats::bump(&self.shared.stats.connections_opened);
        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
            ctx: SessionContext::new(config.database(), config.schema()),
            open: true,
        }))
    }
}

pub struct MemoryConnection {
    shared: Arc<Shared>,
    ctx: SessionContext,
    open: bool,
}

impl MemoryConnection {
    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.open {
            Ok(())
        } else {
            Err(BackendError::Closed("connection"))
        }
    }
}

impl DriverConnection for MemoryConnection {
    fn cursor(&mut self) -> Result<Box<dyn Cursor>, BackendError> {
        self.ensure_open()?;
        Stats::bump(&self.shared.stats.cursors_opened);
        Ok(Box::new(MemoryCursor {
            shared: Arc::clone(&self.shared),
            ctx: self.ctx.clone(),
            result: None,
            open: true,
        }))
    }

    fn write_frame(
        &mut self,
        frame: &LocalFrame,
        table: &TableRef,
        mode: WriteMode,
    ) -> Result<WriteSummary, BackendError> {
        self.ensure_open()?;
        let specs = frame.column_specs();
        let columns = load_columns(
            specs
                .iter()
                .map(|spec| (spec.name.as_str(), warehouse_type(&spec.source_type))),
        );
        self.shared.load(table, &columns, frame.to_rows(), mode)
    }

    fn close(&mut self) -> Result<(), BackendError> {
        if self.open {
            self.open = false;
            Stats::bump(&self.shared.stats.connections_closed);
        }
        Ok(())
    }
}

pub struct MemoryCursor {
    shared: Arc<Shared>,
    ctx: SessionContext,
    result: Option<TabularResult>,
    open: bool,
}

impl Cursor for MemoryCursor {
    fn execute(&mut self, query: &str, params: &Params) -> Result<(), BackendError> {
        if !self.open {
            return Err(BackendError::Closed("cursor"));
        }
        self.result = Some(self.shared.run(&self.ctx, query, params)?);
        Ok(())
    }

    fn fetch_all(&mut self) -> Result<TabularResult, BackendError> {
        self.result
            .take()
            .ok_or_else(|| BackendError::Execution("no result set to fetch".to_string()))
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.open = false;
        self.result = None;
        Ok(())
    }
}

pub struct MemoryComputeEngine {
    shared: Arc<Shared>,
}

impl ComputeEngine for MemoryComputeEngine {
    fn create_session(&self, config: &ComputeSessionConfig) -> Result<Arc<dyn ComputeSession>, BackendError> {
        if self.shared.compute_offline.load(Ordering::SeqCst) {
            return Err(BackendError::Handshake(
                "compute cluster is not reachable".to_string(),
            ));
        }
        Stats::bump(&self.shared.stats.sessions_created);
        let session = MemoryComputeSession {
            id: Uuid::new_v4(),
            app_name: config.app_name.clone(),
            options: config.to_options(),
            active: AtomicBool::new(true),
            shared: Arc::clone(&self.shared),
        };
        debug!("Started compute session {} ({})", session.id, session.app_name);
        Ok(Arc::new(session))
    }
}

pub struct MemoryComputeSession {
    id: Uuid,
    app_name: String,
    options: BTreeMap<String, String>,
    active: AtomicBool,
    shared: Arc<Shared>,
}

impl MemoryComputeSession {
    #[must_use]
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    fn ensure_active(&self) -> Result<(), BackendError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(BackendError::Closed("compute session"))
        }
    }
}

impl fmt::Debug for MemoryComputeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryComputeSession")
            .field("id", &self.id)
            .field("app_name", &self.app_name)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl ComputeSession for MemoryComputeSession {
    fn id(&self) -> Uuid {
        self.id
    }

    fn app_name(&self) -> &str {
        &self.app_name
    }

    fn read_query(
        &self,
        options: &WarehouseOptions,
        query: &str,
        params: &Params,
    ) -> Result<DistributedFrame, BackendError> {
        self.ensure_active()?;
        self.shared
            .authenticate(&options.account, &options.user, &options.password)?;
        let ctx = SessionContext::new(&options.database, &options.schema);
        let result = self.shared.run(&ctx, query, params)?;
        Ok(DistributedFrame::from_result(result, Some(self.id)))
    }

    fn create_frame(&self, frame: &LocalFrame) -> Result<DistributedFrame, BackendError> {
        self.ensure_active()?;
        Ok(DistributedFrame::from_local(frame, Some(self.id)))
    }

    fn write_table(
        &self,
        frame: &DistributedFrame,
        options: &WarehouseOptions,
        table: &TableRef,
        mode: WriteMode,
    ) -> Result<WriteSummary, BackendError> {
        self.ensure_active()?;
        if let Some(owner) = frame.session_id() {
            if owner != self.id {
                return Err(BackendError::Execution(format!(
                    "frame belongs to compute session {owner}"
                )));
            }
        }
        self.shared
            .authenticate(&options.account, &options.user, &options.password)?;
        let columns = load_columns(
            frame
                .schema()
                .iter()
                .map(|field| (field.name.as_str(), warehouse_type(&field.data_type.source_type()))),
        );
        self.shared.load(table, &columns, frame.rows().to_vec(), mode)
    }

    fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            Stats::bump(&self.shared.stats.sessions_stopped);
            debug!("Stopped compute session {}", self.id);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Reads through a short-lived connection of its own per call.
pub struct MemoryColumnarEngine {
    driver: MemoryDriver,
}

impl ColumnarEngine for MemoryColumnarEngine {
    fn read_database(
        &self,
        config: &ConnectionConfig,
        query: &str,
        params: &Params,
    ) -> Result<TabularResult, BackendError> {
        let mut connection = self.driver.connect(config)?;
        let outcome = connection.cursor().and_then(|mut cursor| {
            cursor.execute(query, params)?;
            let result = cursor.fetch_all();
            cursor.close()?;
            result
        });
        connection.close()?;
        outcome
    }
}
