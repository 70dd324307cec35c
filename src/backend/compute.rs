use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::{ComputeSettings, ConnectionConfig};
use crate::core::{BackendError, Params};
use crate::frame::{DistributedFrame, LocalFrame};
use crate::schema::TableRef;
use super::{WriteMode, WriteSummary};

/// Connector package the distributed engine loads to reach the warehouse.
pub const WAREHOUSE_CONNECTOR_PACKAGE: &str = "net.snowflake:spark-snowflake_2.12:2.11.0-spark_3.3";

/// Distributed-compute engine: creates sessions.
pub trait ComputeEngine: Send + Sync {
    fn create_session(&self, config: &ComputeSessionConfig) -> Result<Arc<dyn ComputeSession>, BackendError>;
}

/// A running distributed-compute session. Sessions manage their own
/// internal concurrency and may be shared between gateways.
pub trait ComputeSession: Send + Sync + fmt::Debug {
    fn id(&self) -> Uuid;

    fn app_name(&self) -> &str;

    /// Loads the result of `query` as a distributed frame.
    fn read_query(
        &self,
        options: &WarehouseOptions,
        query: &str,
        params: &Params,
    ) -> Result<DistributedFrame, BackendError>;

    /// Distributes a local frame.
    fn create_frame(&self, frame: &LocalFrame) -> Result<DistributedFrame, BackendError>;

    fn write_table(
        &self,
        frame: &DistributedFrame,
        options: &WarehouseOptions,
        table: &TableRef,
        mode: WriteMode,
    ) -> Result<WriteSummary, BackendError>;

    fn stop(&self);

    fn is_active(&self) -> bool;
}

/// Everything needed to create a session: application name plus the
/// tuning knobs from [`ComputeSettings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeSessionConfig {
    pub app_name: String,
    pub settings: ComputeSettings,
}

impl ComputeSessionConfig {
    #[must_use]
    pub fn from_settings(settings: &ComputeSettings) -> Self {
        Self {
            app_name: settings.app_name.clone(),
            settings: settings.clone(),
        }
    }

    /// Engine options in the engine's own key space. Extra options from the
    /// settings are applied last and win over the defaults.
    #[must_use]
    pub fn to_options(&self) -> BTreeMap<String, String> {
        let s = &self.settings;
        let mut options = BTreeMap::new();
        let mut set = |key: &str, value: String| {
            options.insert(key.to_string(), value);
        };

        set("spark.app.name", self.app_name.clone());
        set("spark.jars.packages", WAREHOUSE_CONNECTOR_PACKAGE.to_string());
        set("spark.sql.execution.arrow.pyspark.enabled", "true".to_string());

        // Network settings for flaky connections
        set("spark.network.timeout", s.network_timeout.clone());
        set("spark.executor.heartbeatInterval", s.heartbeat_interval.clone());
        set("spark.executor.instances", s.executor_instances.to_string());
        set("spark.task.maxFailures", s.task_max_failures.to_string());

        if s.local_mode {
            set("spark.master", "local[*]".to_string());
            set("spark.driver.bindAddress", s.bind_address.clone());
            set("spark.driver.host", s.bind_address.clone());
        }

        for (key, value) in &s.extra {
            set(key, value.clone());
        }
        options
    }
}

/// Warehouse connection options handed to the distributed engine's
/// warehouse connector.
#[derive(Clone, PartialEq, Eq)]
pub struct WarehouseOptions {
    pub url: String,
    pub account: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub schema: String,
    pub warehouse: String,
    pub role: String,
}

impl WarehouseOptions {
    #[must_use]
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            url: format!("{}.snowflakecomputing.com", config.account()),
            account: config.account().to_string(),
            user: config.user().to_string(),
            password: config.password().to_string(),
            database: config.database().to_string(),
            schema: config.schema().to_string(),
            warehouse: config.warehouse().to_string(),
            role: config.role().to_string(),
        }
    }
}

impl fmt::Debug for WarehouseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseOptions")
            .field("url", &self.url)
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &"********")
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .finish()
    }
}
