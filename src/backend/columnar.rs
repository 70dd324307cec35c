use crate::config::ConnectionConfig;
use crate::core::{BackendError, Params, TabularResult};

/// Columnar dataframe engine reading over a SQL-toolkit connection.
///
/// Each call opens its own connection and releases it before returning;
/// nothing is shared with the gateway's native session.
pub trait ColumnarEngine: Send + Sync {
    fn read_database(
        &self,
        config: &ConnectionConfig,
        query: &str,
        params: &Params,
    ) -> Result<TabularResult, BackendError>;
}
