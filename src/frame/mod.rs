//! Tabular data handed to the bulk writer and the schema inferencer.
//!
//! Two structurally different representations exist: [`LocalFrame`]
//! (column-major, one dtype per column) and [`DistributedFrame`] (struct
//! schema plus rows, bound to a compute session). Both describe their
//! columns through [`TabularSource`] so schema inference never needs to know
//! which one it is looking at.

pub mod distributed;
pub mod local;

pub use distributed::{DistributedFrame, SparkType, StructField};
pub use local::{LocalColumn, LocalDtype, LocalFrame};

use std::fmt;

use crate::core::{SchemaError, Value};

/// Source-side type category of a column, independent of representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceType {
    Text,
    Integer,
    Float,
    Boolean,
    /// Date plus time; `timezone` is set when values carry an offset
    DateTime { timezone: Option<String> },
    Duration,
    Decimal { precision: u8, scale: u8 },
    Date,
    Binary,
    List,
    Map,
    Struct,
    /// Column with no values at all to infer from
    Null,
    Unrecognized(String),
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
            Self::DateTime { timezone: Some(tz) } => write!(f, "datetime[{tz}]"),
            Self::DateTime { timezone: None } => write!(f, "datetime"),
            Self::Duration => write!(f, "duration"),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            Self::Date => write!(f, "date"),
            Self::Binary => write!(f, "binary"),
            Self::List => write!(f, "list"),
            Self::Map => write!(f, "map"),
            Self::Struct => write!(f, "struct"),
            Self::Null => write!(f, "null"),
            Self::Unrecognized(name) => write!(f, "{name}"),
        }
    }
}

/// Name and source type of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub source_type: SourceType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            name: name.into(),
            source_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Local,
    Distributed,
}

/// Column metadata every tabular representation exposes.
pub trait TabularSource {
    fn kind(&self) -> FrameKind;

    fn column_specs(&self) -> Vec<ColumnSpec>;

    fn column_names(&self) -> Vec<String> {
        self.column_specs().into_iter().map(|c| c.name).collect()
    }

    fn row_count(&self) -> usize;

    /// Row-major copy of the data.
    fn to_rows(&self) -> Vec<Vec<Value>>;
}

/// Data accepted by the bulk writer.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Local(LocalFrame),
    Distributed(DistributedFrame),
}

impl Frame {
    #[must_use]
    pub fn source(&self) -> &dyn TabularSource {
        match self {
            Self::Local(frame) => frame,
            Self::Distributed(frame) => frame,
        }
    }

    #[must_use]
    pub fn kind(&self) -> FrameKind {
        self.source().kind()
    }

    /// Copy with every timezone-aware datetime column converted to naive
    /// local time.
    #[must_use]
    pub fn strip_timezones(&self) -> Self {
        match self {
            Self::Local(frame) => Self::Local(frame.strip_timezones()),
            Self::Distributed(frame) => Self::Distributed(frame.strip_timezones()),
        }
    }

    /// Collects the data into a local frame.
    pub fn to_local(&self) -> Result<LocalFrame, SchemaError> {
        match self {
            Self::Local(frame) => Ok(frame.clone()),
            Self::Distributed(frame) => frame.to_local(),
        }
    }
}

impl From<LocalFrame> for Frame {
    fn from(frame: LocalFrame) -> Self {
        Self::Local(frame)
    }
}

impl From<DistributedFrame> for Frame {
    fn from(frame: DistributedFrame) -> Self {
        Self::Distributed(frame)
    }
}

/// Finds names that occur more than once, ignoring case, in first-seen
/// order. Unquoted DDL folds case, so `id` and `ID` collide.
#[must_use]
pub fn duplicate_names(names: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut reported = std::collections::HashSet::new();
    let mut duplicates = Vec::new();
    for name in names {
        let folded = name.to_lowercase();
        if !seen.insert(folded.clone()) && reported.insert(folded) {
            duplicates.push(name.clone());
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    fn frame_with_tz() -> LocalFrame {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let ts = offset.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        LocalFrame::from_columns(vec![
            LocalColumn::infer("id", vec![Value::Integer(1)]),
            LocalColumn::infer("seen_at", vec![Value::TimestampTz(ts)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_frame_kind() {
        let local = Frame::from(frame_with_tz());
        assert_eq!(local.kind(), FrameKind::Local);

        let distributed = Frame::from(DistributedFrame::from_local(&frame_with_tz(), None));
        assert_eq!(distributed.kind(), FrameKind::Distributed);
    }

    #[test]
    fn test_strip_timezones_keeps_local_wall_time() {
        let stripped = Frame::from(frame_with_tz()).strip_timezones();
        let local = stripped.to_local().unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(local.column("seen_at").unwrap().values[0], Value::Timestamp(expected));
        assert_eq!(
            stripped.source().column_specs()[1].source_type,
            SourceType::DateTime { timezone: None }
        );
    }

    #[test]
    fn test_duplicate_names() {
        let names = vec!["a".to_string(), "b".to_string(), "a".to_string(), "a".to_string()];
        assert_eq!(duplicate_names(&names), vec!["a".to_string()]);
        assert!(duplicate_names(&["x".to_string()]).is_empty());

        let mixed = vec!["id".to_string(), "ID".to_string(), "Id".to_string()];
        assert_eq!(duplicate_names(&mixed), vec!["ID".to_string()]);
    }
}
