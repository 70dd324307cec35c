//! The warehouse access gateway: connection management, query execution
//! across the linked backends, bulk writes and schema inference.
//!
//! A gateway is single-caller: every operation takes `&mut self` and runs on
//! the gateway's one connection/cursor pair. Run several gateways to get
//! concurrency; they only share the persistent compute session registry.

mod compute;
mod query;
mod session;
mod write;

pub use compute::{ComputePolicy, ComputeSessionRegistry};
pub use session::ConnectionManager;
pub use write::{ADMIN_ROLE, READ_ONLY_ROLE};

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{BackendRegistry, ComputeSession, ExecutionMode, FallbackPolicy};
use crate::config::{ConfigLoader, ConnectionConfig, ConnectionOverrides};
use crate::core::GatewayError;
use compute::ComputeHandle;

/// Collects everything a gateway needs before any resource is acquired.
pub struct GatewayBuilder {
    backends: BackendRegistry,
    overrides: ConnectionOverrides,
    loader: ConfigLoader,
    config: Option<ConnectionConfig>,
    compute_policy: ComputePolicy,
    sessions: Option<Arc<ComputeSessionRegistry>>,
    fallback: FallbackPolicy,
}

impl GatewayBuilder {
    pub fn new(backends: BackendRegistry) -> Self {
        Self {
            backends,
            overrides: ConnectionOverrides::default(),
            loader: ConfigLoader::new(),
            config: None,
            compute_policy: ComputePolicy::default(),
            sessions: None,
            fallback: FallbackPolicy::default(),
        }
    }

    /// Explicit connection arguments; they win over environment and files.
    #[must_use]
    pub fn overrides(mut self, overrides: ConnectionOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    #[must_use]
    pub fn config_loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Uses an already resolved config and skips loading entirely.
    #[must_use]
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn compute_policy(mut self, policy: ComputePolicy) -> Self {
        self.compute_policy = policy;
        self
    }

    /// Registry for persistent compute sessions. Defaults to
    /// [`ComputeSessionRegistry::global`].
    #[must_use]
    pub fn session_registry(mut self, registry: Arc<ComputeSessionRegistry>) -> Self {
        self.sessions = Some(registry);
        self
    }

    #[must_use]
    pub fn fallback_policy(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Resolves the configuration and sets up the compute session. The
    /// native connection is opened lazily.
    pub fn build(self) -> Result<WarehouseGateway, GatewayError> {
        let config = match self.config {
            Some(config) => config,
            None => self.loader.load(&self.overrides)?,
        };
        let sessions = self.sessions.unwrap_or_else(ComputeSessionRegistry::global);
        let compute = ComputeHandle::acquire(
            self.compute_policy,
            self.backends.compute(),
            &sessions,
            config.compute(),
        )?;
        debug!("Gateway modes available: {:?}", self.backends.available_modes());

        Ok(WarehouseGateway {
            session: ConnectionManager::new(Arc::clone(self.backends.driver())),
            config,
            backends: self.backends,
            fallback: self.fallback,
            compute,
        })
    }

    /// Like [`GatewayBuilder::build`], then connects immediately.
    pub fn open(self) -> Result<WarehouseGateway, GatewayError> {
        let mut gateway = self.build()?;
        gateway.connect()?;
        Ok(gateway)
    }
}

pub struct WarehouseGateway {
    config: ConnectionConfig,
    backends: BackendRegistry,
    fallback: FallbackPolicy,
    session: ConnectionManager,
    compute: ComputeHandle,
}

impl WarehouseGateway {
    pub fn builder(backends: BackendRegistry) -> GatewayBuilder {
        GatewayBuilder::new(backends)
    }

    /// Opens a gateway, runs `body` with it and always closes it before
    /// returning the body's result, error or not.
    pub fn scoped<T, F>(builder: GatewayBuilder, body: F) -> Result<T, GatewayError>
    where
        F: FnOnce(&mut Self) -> Result<T, GatewayError>,
    {
        let mut gateway = builder.open()?;
        let result = body(&mut gateway);
        gateway.close();
        result
    }

    /// Opens the native connection now instead of on first use.
    pub fn connect(&mut self) -> Result<&mut Self, GatewayError> {
        self.session.open(&self.config)?;
        Ok(self)
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_open()
    }

    /// Releases the cursor, the connection and an owned compute session.
    /// Idempotent.
    pub fn close(&mut self) {
        self.session.close();
        self.compute.release();
    }

    #[must_use]
    pub const fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    #[must_use]
    pub fn compute_session(&self) -> Option<&Arc<dyn ComputeSession>> {
        self.compute.session()
    }

    /// Whether `mode` can run on this gateway right now.
    #[must_use]
    pub fn is_available(&self, mode: ExecutionMode) -> bool {
        match mode {
            ExecutionMode::Driver => true,
            ExecutionMode::Distributed => self.compute.active_session().is_some(),
            ExecutionMode::Columnar => self.backends.is_linked(ExecutionMode::Columnar),
        }
    }

    #[must_use]
    pub fn available_modes(&self) -> Vec<ExecutionMode> {
        [ExecutionMode::Driver, ExecutionMode::Distributed, ExecutionMode::Columnar]
            .into_iter()
            .filter(|mode| self.is_available(*mode))
            .collect()
    }

    /// The mode that will actually run for `requested`, or `None` when it
    /// is unavailable and the fallback policy is strict.
    fn resolve_mode(&self, requested: ExecutionMode) -> Option<ExecutionMode> {
        if self.is_available(requested) {
            return Some(requested);
        }
        match self.fallback {
            FallbackPolicy::Driver => {
                warn!(
                    "Execution mode '{}' not available, using {} instead",
                    requested,
                    ExecutionMode::Driver
                );
                Some(ExecutionMode::Driver)
            }
            FallbackPolicy::Strict => None,
        }
    }
}

impl Drop for WarehouseGateway {
    fn drop(&mut self) {
        self.close();
    }
}

/// First 100 characters of a query, for log lines.
pub(crate) fn truncate_query(query: &str) -> String {
    let query = query.trim();
    match query.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &query[..idx]),
        None => query.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_query() {
        assert_eq!(truncate_query("  SELECT 1  "), "SELECT 1");
        let long = "x".repeat(150);
        let truncated = truncate_query(&long);
        assert_eq!(truncated.len(), 103);
        assert!(truncated.ends_with("..."));
    }
}
