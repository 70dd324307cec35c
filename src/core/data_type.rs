use serde::{Deserialize, Serialize};
use std::fmt;

/// Column types of the destination warehouse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WarehouseType {
    String,
    Integer,
    Float,
    Number { precision: u8, scale: u8 }, // NUMBER(p, s)
    Boolean,
    // Date/Time types
    Date,
    Time,
    TimestampNtz,
    // Semi-structured types
    Binary,
    Array,
    Object,
}

impl WarehouseType {
    /// Precision and scale used when NUMBER is declared without arguments.
    pub const DEFAULT_NUMBER: Self = Self::Number {
        precision: 38,
        scale: 0,
    };
}

impl fmt::Display for WarehouseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "STRING"),
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Number { precision, scale } => write!(f, "NUMBER({precision},{scale})"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Date => write!(f, "DATE"),
            Self::Time => write!(f, "TIME"),
            Self::TimestampNtz => write!(f, "TIMESTAMP_NTZ"),
            Self::Binary => write!(f, "BINARY"),
            Self::Array => write!(f, "ARRAY"),
            Self::Object => write!(f, "OBJECT"),
        }
    }
}
