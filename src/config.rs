//! Connection configuration.
//!
//! Every field resolves with the priority: explicit argument > environment
//! (`SNOWFLAKE_*`) > config file > built-in default. Explicit arguments that
//! are empty strings count as absent; an environment variable that is set
//! but empty is kept as-is and then rejected by validation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::debug;

use crate::core::ConfigurationError;

pub const ENV_PREFIX: &str = "SNOWFLAKE";

pub const DEFAULT_DATABASE: &str = "proddb";
pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_WAREHOUSE: &str = "ADHOC";
pub const DEFAULT_ROLE: &str = "read_only_users";
pub const DEFAULT_APP_NAME: &str = "SnowflakeHook";

/// Config files consulted by [`ConfigLoader::new`]; later files win.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = [
    "/etc/spiritfood/warehouse.toml",
    "./config/warehouse.toml",
];

/// Caller-supplied values that take priority over every other source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOverrides {
    pub account: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    pub insecure_mode: Option<bool>,
}

impl ConnectionOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn account(mut self, value: impl Into<String>) -> Self {
        self.account = Some(value.into());
        self
    }

    #[must_use]
    pub fn user(mut self, value: impl Into<String>) -> Self {
        self.user = Some(value.into());
        self
    }

    #[must_use]
    pub fn password(mut self, value: impl Into<String>) -> Self {
        self.password = Some(value.into());
        self
    }

    #[must_use]
    pub fn database(mut self, value: impl Into<String>) -> Self {
        self.database = Some(value.into());
        self
    }

    #[must_use]
    pub fn schema(mut self, value: impl Into<String>) -> Self {
        self.schema = Some(value.into());
        self
    }

    #[must_use]
    pub fn warehouse(mut self, value: impl Into<String>) -> Self {
        self.warehouse = Some(value.into());
        self
    }

    #[must_use]
    pub fn role(mut self, value: impl Into<String>) -> Self {
        self.role = Some(value.into());
        self
    }
}

/// Tuning knobs applied only when the gateway creates a distributed-compute
/// session itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeSettings {
    pub app_name: String,
    pub network_timeout: String,
    pub heartbeat_interval: String,
    pub executor_instances: u32,
    pub task_max_failures: u32,
    /// Run in-process with networking bound to `bind_address`
    pub local_mode: bool,
    pub bind_address: String,
    pub extra: BTreeMap<String, String>,
}

impl Default for ComputeSettings {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            network_timeout: "800s".to_string(),
            heartbeat_interval: "120s".to_string(),
            executor_instances: 1,
            task_max_failures: 10,
            local_mode: true,
            bind_address: "127.0.0.1".to_string(),
            extra: BTreeMap::new(),
        }
    }
}

/// Fully resolved, validated connection parameters. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    account: String,
    user: String,
    password: String,
    database: String,
    schema: String,
    warehouse: String,
    role: String,
    insecure_mode: bool,
    compute: ComputeSettings,
}

impl ConnectionConfig {
    /// Resolves from the process environment and the default config files.
    pub fn from_env(overrides: &ConnectionOverrides) -> Result<Self, ConfigurationError> {
        ConfigLoader::new().load(overrides)
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn warehouse(&self) -> &str {
        &self.warehouse
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// Relaxed certificate validation
    pub const fn insecure_mode(&self) -> bool {
        self.insecure_mode
    }

    pub const fn compute(&self) -> &ComputeSettings {
        &self.compute
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        let required = [
            ("account", &self.account),
            ("user", &self.user),
            ("password", &self.password),
            ("database", &self.database),
            ("schema", &self.schema),
            ("warehouse", &self.warehouse),
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::MissingFields(missing))
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &"********")
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .field("insecure_mode", &self.insecure_mode)
            .field("compute", &self.compute)
            .finish()
    }
}

/// Shape of the merged file + environment sources before defaults apply.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    account: Option<String>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    warehouse: Option<String>,
    role: Option<String>,
    insecure_mode: Option<bool>,
    compute_app_name: Option<String>,
    compute_network_timeout: Option<String>,
    compute_heartbeat_interval: Option<String>,
    compute_executor_instances: Option<u32>,
    compute_task_max_failures: Option<u32>,
    compute_local_mode: Option<bool>,
    compute_bind_address: Option<String>,
    #[serde(default)]
    compute_options: BTreeMap<String, String>,
}

/// Loads [`ConnectionConfig`] from config files and the environment.
///
/// Tests use [`ConfigLoader::isolated`] plus [`ConfigLoader::with_env`] so the
/// real process environment never leaks in.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    files: Vec<PathBuf>,
    env: Option<config::Map<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from).collect(),
            env: None,
        }
    }

    /// No config files and an empty environment.
    #[must_use]
    pub fn isolated() -> Self {
        Self {
            files: Vec::new(),
            env: Some(config::Map::new()),
        }
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Replaces the process environment with `vars` (full names, prefix
    /// included, e.g. `SNOWFLAKE_USER`).
    #[must_use]
    pub fn with_env<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    pub fn load(&self, overrides: &ConnectionOverrides) -> Result<ConnectionConfig, ConfigurationError> {
        let raw = self.load_raw()?;
        let config = Self::resolve(raw, overrides);
        config.validate()?;
        debug!("Resolved connection config: {:?}", config);
        Ok(config)
    }

    fn load_raw(&self) -> Result<RawConfig, ConfigurationError> {
        let mut builder = Config::builder();

        for path in &self.files {
            builder = builder.add_source(File::from(path.as_path()).required(false));
        }

        let mut env = Environment::with_prefix(ENV_PREFIX);
        if let Some(vars) = &self.env {
            env = env.source(Some(vars.clone()));
        }
        builder = builder.add_source(env);

        builder
            .build()
            .and_then(Config::try_deserialize::<RawConfig>)
            .map_err(|e| ConfigurationError::Invalid(e.to_string()))
    }

    fn resolve(raw: RawConfig, overrides: &ConnectionOverrides) -> ConnectionConfig {
        fn pick(explicit: Option<&String>, sourced: Option<String>, default: &str) -> String {
            explicit
                .filter(|v| !v.is_empty())
                .cloned()
                .or(sourced)
                .unwrap_or_else(|| default.to_string())
        }

        let defaults = ComputeSettings::default();
        let compute = ComputeSettings {
            app_name: raw.compute_app_name.unwrap_or(defaults.app_name),
            network_timeout: raw.compute_network_timeout.unwrap_or(defaults.network_timeout),
            heartbeat_interval: raw
                .compute_heartbeat_interval
                .unwrap_or(defaults.heartbeat_interval),
            executor_instances: raw
                .compute_executor_instances
                .unwrap_or(defaults.executor_instances),
            task_max_failures: raw
                .compute_task_max_failures
                .unwrap_or(defaults.task_max_failures),
            local_mode: raw.compute_local_mode.unwrap_or(defaults.local_mode),
            bind_address: raw.compute_bind_address.unwrap_or(defaults.bind_address),
            extra: raw.compute_options,
        };

        ConnectionConfig {
            account: pick(overrides.account.as_ref(), raw.account, ""),
            user: pick(overrides.user.as_ref(), raw.user, ""),
            password: pick(overrides.password.as_ref(), raw.password, ""),
            database: pick(overrides.database.as_ref(), raw.database, DEFAULT_DATABASE),
            schema: pick(overrides.schema.as_ref(), raw.schema, DEFAULT_SCHEMA),
            warehouse: pick(overrides.warehouse.as_ref(), raw.warehouse, DEFAULT_WAREHOUSE),
            role: pick(overrides.role.as_ref(), raw.role, DEFAULT_ROLE),
            insecure_mode: overrides.insecure_mode.or(raw.insecure_mode).unwrap_or(true),
            compute,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn credentials() -> ConnectionOverrides {
        ConnectionOverrides::new()
            .account("acme")
            .user("fiona")
            .password("secret")
    }

    #[test]
    fn test_defaults_fill_optional_fields() {
        let config = ConfigLoader::isolated().load(&credentials()).unwrap();
        assert_eq!(config.database(), "proddb");
        assert_eq!(config.schema(), "public");
        assert_eq!(config.warehouse(), "ADHOC");
        assert_eq!(config.role(), "read_only_users");
        assert!(config.insecure_mode());
        assert_eq!(config.compute().app_name, "SnowflakeHook");
    }

    #[test]
    fn test_environment_fills_missing_arguments() {
        let config = ConfigLoader::isolated()
            .with_env([
                ("SNOWFLAKE_ACCOUNT", "acme"),
                ("SNOWFLAKE_USER", "env_user"),
                ("SNOWFLAKE_PASSWORD", "env_pw"),
                ("SNOWFLAKE_WAREHOUSE", "ETL"),
                ("SNOWFLAKE_COMPUTE_EXECUTOR_INSTANCES", "3"),
            ])
            .load(&ConnectionOverrides::new())
            .unwrap();
        assert_eq!(config.user(), "env_user");
        assert_eq!(config.password(), "env_pw");
        assert_eq!(config.warehouse(), "ETL");
        assert_eq!(config.compute().executor_instances, 3);
    }

    #[test]
    fn test_explicit_arguments_beat_environment() {
        let config = ConfigLoader::isolated()
            .with_env([("SNOWFLAKE_USER", "env_user"), ("SNOWFLAKE_SCHEMA", "staging")])
            .load(&credentials().schema("analytics"))
            .unwrap();
        assert_eq!(config.user(), "fiona");
        assert_eq!(config.schema(), "analytics");
    }

    #[test]
    fn test_empty_argument_falls_through_to_environment() {
        let config = ConfigLoader::isolated()
            .with_env([("SNOWFLAKE_USER", "env_user")])
            .load(&credentials().user(""))
            .unwrap();
        assert_eq!(config.user(), "env_user");
    }

    #[test]
    fn test_missing_password_is_reported() {
        let overrides = ConnectionOverrides::new().account("acme").user("fiona");
        let err = ConfigLoader::isolated().load(&overrides).unwrap_err();
        assert_eq!(err, ConfigurationError::MissingFields(vec!["password"]));
    }

    #[test]
    fn test_each_empty_required_field_is_named() {
        let fields = ["ACCOUNT", "USER", "PASSWORD", "DATABASE", "SCHEMA", "WAREHOUSE"];
        for field in fields {
            let mut env: Vec<(String, String)> = vec![
                ("SNOWFLAKE_ACCOUNT".into(), "acme".into()),
                ("SNOWFLAKE_USER".into(), "fiona".into()),
                ("SNOWFLAKE_PASSWORD".into(), "secret".into()),
            ];
            env.retain(|(k, _)| k != &format!("SNOWFLAKE_{field}"));
            env.push((format!("SNOWFLAKE_{field}"), String::new()));

            let err = ConfigLoader::isolated()
                .with_env(env)
                .load(&ConnectionOverrides::new())
                .unwrap_err();
            let expected = field.to_lowercase();
            match err {
                ConfigurationError::MissingFields(missing) => {
                    assert_eq!(missing.len(), 1, "{field}");
                    assert_eq!(missing[0], expected);
                }
                other => panic!("Expected MissingFields, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_config_file_is_lowest_priority() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warehouse.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "account = \"file_acct\"").unwrap();
        writeln!(file, "warehouse = \"FILE_WH\"").unwrap();
        writeln!(file, "role = \"file_role\"").unwrap();
        writeln!(file, "compute_local_mode = false").unwrap();
        writeln!(file, "[compute_options]").unwrap();
        writeln!(file, "\"spark.sql.shuffle.partitions\" = \"8\"").unwrap();
        drop(file);

        let config = ConfigLoader::isolated()
            .with_file(&path)
            .with_env([("SNOWFLAKE_ROLE", "env_role")])
            .load(&ConnectionOverrides::new().user("fiona").password("pw"))
            .unwrap();
        assert_eq!(config.account(), "file_acct");
        assert_eq!(config.warehouse(), "FILE_WH");
        assert_eq!(config.role(), "env_role");
        assert!(!config.compute().local_mode);
        assert_eq!(
            config.compute().extra.get("spark.sql.shuffle.partitions").map(String::as_str),
            Some("8")
        );
    }

    #[test]
    fn test_debug_masks_password() {
        let config = ConfigLoader::isolated().load(&credentials()).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("secret"));
        assert!(printed.contains("********"));
    }
}
