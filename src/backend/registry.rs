use std::sync::Arc;

use tracing::debug;

use super::{ColumnarEngine, ComputeEngine, Driver, ExecutionMode};

/// What happens when a caller asks for a backend that is not linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Run on the driver instead and log a warning.
    #[default]
    Driver,
    /// Fail with an "unavailable" error.
    Strict,
}

/// Backends linked into a gateway, probed once when the registry is built.
/// The driver is mandatory; the other two are optional.
#[derive(Clone)]
pub struct BackendRegistry {
    driver: Arc<dyn Driver>,
    compute: Option<Arc<dyn ComputeEngine>>,
    columnar: Option<Arc<dyn ColumnarEngine>>,
}

impl BackendRegistry {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            compute: None,
            columnar: None,
        }
    }

    #[must_use]
    pub fn with_compute(mut self, engine: Arc<dyn ComputeEngine>) -> Self {
        self.compute = Some(engine);
        self
    }

    #[must_use]
    pub fn with_columnar(mut self, engine: Arc<dyn ColumnarEngine>) -> Self {
        self.columnar = Some(engine);
        self
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn compute(&self) -> Option<&Arc<dyn ComputeEngine>> {
        self.compute.as_ref()
    }

    pub fn columnar(&self) -> Option<&Arc<dyn ColumnarEngine>> {
        self.columnar.as_ref()
    }

    #[must_use]
    pub fn is_linked(&self, mode: ExecutionMode) -> bool {
        match mode {
            ExecutionMode::Driver => true,
            ExecutionMode::Distributed => self.compute.is_some(),
            ExecutionMode::Columnar => self.columnar.is_some(),
        }
    }

    #[must_use]
    pub fn available_modes(&self) -> Vec<ExecutionMode> {
        let modes: Vec<ExecutionMode> = [
            ExecutionMode::Driver,
            ExecutionMode::Distributed,
            ExecutionMode::Columnar,
        ]
        .into_iter()
        .filter(|mode| self.is_linked(*mode))
        .collect();
        debug!("Linked execution modes: {:?}", modes);
        modes
    }
}
