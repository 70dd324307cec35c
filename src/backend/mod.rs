//! Capability traits for the three execution backends and the registry
//! that records which of them are linked into a gateway.
//!
//! * [`Driver`]: native connection + cursor, small interactive results.
//! * [`ComputeEngine`]: distributed sessions for large reads and writes.
//! * [`ColumnarEngine`]: vectorized local reads over a short-lived
//!   SQL-toolkit connection.

pub mod driver;
pub mod compute;
pub mod columnar;
pub mod registry;

pub use driver::{Cursor, Driver, DriverConnection, WriteSummary};
pub use compute::{ComputeEngine, ComputeSession, ComputeSessionConfig, WarehouseOptions};
pub use columnar::ColumnarEngine;
pub use registry::{BackendRegistry, FallbackPolicy};

use std::fmt;
use std::str::FromStr;

/// Execution strategy requested for a query or a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// Driver fetch into a local frame
    Driver,
    /// Distributed-compute read/write
    Distributed,
    /// Columnar dataframe engine (reads only)
    Columnar,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver => write!(f, "driver"),
            Self::Distributed => write!(f, "distributed"),
            Self::Columnar => write!(f, "columnar"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "driver" | "pandas" => Ok(Self::Driver),
            "distributed" | "spark" => Ok(Self::Distributed),
            "columnar" | "polars" => Ok(Self::Columnar),
            other => Err(format!("unknown execution mode '{other}'")),
        }
    }
}

/// What a write does when the destination table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WriteMode {
    #[default]
    Append,
    Overwrite,
    ErrorIfExists,
    Ignore,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => write!(f, "append"),
            Self::Overwrite => write!(f, "overwrite"),
            Self::ErrorIfExists => write!(f, "errorifexists"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "append" => Ok(Self::Append),
            "overwrite" => Ok(Self::Overwrite),
            "error" | "errorifexists" | "error-if-exists" => Ok(Self::ErrorIfExists),
            "ignore" | "ignore-if-exists" => Ok(Self::Ignore),
            other => Err(format!("unknown write mode '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_mode_aliases() {
        assert_eq!("pandas".parse::<ExecutionMode>().unwrap(), ExecutionMode::Driver);
        assert_eq!("Spark".parse::<ExecutionMode>().unwrap(), ExecutionMode::Distributed);
        assert_eq!("polars".parse::<ExecutionMode>().unwrap(), ExecutionMode::Columnar);
        assert!("duckdb".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn test_write_mode_parse_and_display() {
        assert_eq!("error".parse::<WriteMode>().unwrap(), WriteMode::ErrorIfExists);
        assert_eq!("IGNORE".parse::<WriteMode>().unwrap(), WriteMode::Ignore);
        assert_eq!(WriteMode::Overwrite.to_string(), "overwrite");
        assert_eq!(WriteMode::default(), WriteMode::Append);
    }
}
