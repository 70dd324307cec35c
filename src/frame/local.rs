use std::fmt;

use crate::core::{SchemaError, TabularResult, Value};
use super::{ColumnSpec, FrameKind, SourceType, TabularSource};

/// Per-column storage dtype of a local frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalDtype {
    /// Python-object style column: strings, decimals, dates, bytes, nested data
    Object,
    Int64,
    Int32,
    Float64,
    Float32,
    Bool,
    DatetimeNs { tz: Option<String> },
    TimedeltaNs,
    Category,
    Other(String),
}

impl LocalDtype {
    /// Dtype a column holding `value` would get.
    #[must_use]
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Integer(_) => Self::Int64,
            Value::Float(_) => Self::Float64,
            Value::Boolean(_) => Self::Bool,
            Value::Timestamp(_) => Self::DatetimeNs { tz: None },
            Value::TimestampTz(t) => Self::DatetimeNs {
                tz: Some(t.offset().to_string()),
            },
            Value::Duration(_) => Self::TimedeltaNs,
            _ => Self::Object,
        }
    }
}

impl fmt::Display for LocalDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "object"),
            Self::Int64 => write!(f, "int64"),
            Self::Int32 => write!(f, "int32"),
            Self::Float64 => write!(f, "float64"),
            Self::Float32 => write!(f, "float32"),
            Self::Bool => write!(f, "bool"),
            Self::DatetimeNs { tz: Some(tz) } => write!(f, "datetime64[ns, {tz}]"),
            Self::DatetimeNs { tz: None } => write!(f, "datetime64[ns]"),
            Self::TimedeltaNs => write!(f, "timedelta64[ns]"),
            Self::Category => write!(f, "category"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalColumn {
    pub name: String,
    pub dtype: LocalDtype,
    pub values: Vec<Value>,
}

impl LocalColumn {
    pub fn new(name: impl Into<String>, dtype: LocalDtype, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    /// Builds a column whose dtype is derived from its values. Integers mixed
    /// with floats widen to float64; any other mix falls back to object.
    pub fn infer(name: impl Into<String>, values: Vec<Value>) -> Self {
        let mut dtype: Option<LocalDtype> = None;
        for value in values.iter().filter(|v| !v.is_null()) {
            let next = LocalDtype::of_value(value);
            dtype = Some(match dtype {
                None => next,
                Some(current) if current == next => current,
                Some(LocalDtype::Int64 | LocalDtype::Float64)
                    if matches!(next, LocalDtype::Int64 | LocalDtype::Float64) =>
                {
                    LocalDtype::Float64
                }
                Some(_) => LocalDtype::Object,
            });
        }
        Self::new(name, dtype.unwrap_or(LocalDtype::Object), values)
    }

    #[must_use]
    pub fn source_type(&self) -> SourceType {
        match &self.dtype {
            LocalDtype::Object if self.values.iter().all(Value::is_null) => SourceType::Null,
            LocalDtype::Object => SourceType::Text,
            LocalDtype::Int64 | LocalDtype::Int32 => SourceType::Integer,
            LocalDtype::Float64 | LocalDtype::Float32 => SourceType::Float,
            LocalDtype::Bool => SourceType::Boolean,
            LocalDtype::DatetimeNs { tz } => SourceType::DateTime { timezone: tz.clone() },
            LocalDtype::TimedeltaNs => SourceType::Duration,
            LocalDtype::Category => SourceType::Unrecognized("category".to_string()),
            LocalDtype::Other(name) => SourceType::Unrecognized(name.clone()),
        }
    }
}

/// Column-major in-memory frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalFrame {
    columns: Vec<LocalColumn>,
}

impl LocalFrame {
    /// All columns must hold the same number of values.
    pub fn from_columns(columns: Vec<LocalColumn>) -> Result<Self, SchemaError> {
        if let Some(first) = columns.first() {
            let expected = first.values.len();
            for column in &columns {
                if column.values.len() != expected {
                    return Err(SchemaError::RaggedColumn {
                        column: column.name.clone(),
                        expected,
                        found: column.values.len(),
                    });
                }
            }
        }
        Ok(Self { columns })
    }

    /// Builds a frame from JSON records (an array of objects). Columns appear
    /// in first-seen key order; keys missing from a record become nulls.
    pub fn from_records(records: &[serde_json::Value]) -> Result<Self, SchemaError> {
        let mut names: Vec<String> = Vec::new();
        for record in records {
            let object = record
                .as_object()
                .ok_or_else(|| SchemaError::Unsupported(format!("record is not an object: {record}")))?;
            for key in object.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let values = records
                    .iter()
                    .map(|record| record.get(&name).map_or(Value::Null, Value::from))
                    .collect();
                LocalColumn::infer(name, values)
            })
            .collect();
        Self::from_columns(columns)
    }

    /// Transposes a query result into a frame.
    pub fn from_result(result: &TabularResult) -> Result<Self, SchemaError> {
        let columns = result
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let values = result
                    .rows()
                    .iter()
                    .map(|row| row.get(idx).cloned().unwrap_or(Value::Null))
                    .collect();
                LocalColumn::infer(column.name.clone(), values)
            })
            .collect();
        Self::from_columns(columns)
    }

    #[must_use]
    pub fn columns(&self) -> &[LocalColumn] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&LocalColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Copy with timezone-aware datetime columns converted to naive local time.
    #[must_use]
    pub fn strip_timezones(&self) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|column| match &column.dtype {
                LocalDtype::DatetimeNs { tz: Some(_) } => LocalColumn::new(
                    column.name.clone(),
                    LocalDtype::DatetimeNs { tz: None },
                    column.values.iter().cloned().map(Value::without_timezone).collect(),
                ),
                _ => column.clone(),
            })
            .collect();
        Self { columns }
    }
}

impl TabularSource for LocalFrame {
    fn kind(&self) -> FrameKind {
        FrameKind::Local
    }

    fn column_specs(&self) -> Vec<ColumnSpec> {
        self.columns
            .iter()
            .map(|c| ColumnSpec::new(c.name.clone(), c.source_type()))
            .collect()
    }

    fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    fn to_rows(&self) -> Vec<Vec<Value>> {
        (0..self.row_count())
            .map(|row| self.columns.iter().map(|c| c.values[row].clone()).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_dtypes() {
        assert_eq!(LocalColumn::infer("a", vec![Value::Integer(1), Value::Null]).dtype, LocalDtype::Int64);
        assert_eq!(
            LocalColumn::infer("b", vec![Value::Integer(1), Value::Float(2.5)]).dtype,
            LocalDtype::Float64
        );
        assert_eq!(
            LocalColumn::infer("c", vec![Value::Integer(1), Value::Text("x".into())]).dtype,
            LocalDtype::Object
        );
        assert_eq!(LocalColumn::infer("d", vec![Value::Null]).dtype, LocalDtype::Object);
    }

    #[test]
    fn test_source_types() {
        assert_eq!(LocalColumn::infer("n", vec![Value::Null]).source_type(), SourceType::Null);
        assert_eq!(
            LocalColumn::infer("t", vec![Value::Text("x".into())]).source_type(),
            SourceType::Text
        );
        let cat = LocalColumn::new("c", LocalDtype::Category, vec![Value::Text("x".into())]);
        assert_eq!(cat.source_type(), SourceType::Unrecognized("category".into()));
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let err = LocalFrame::from_columns(vec![
            LocalColumn::infer("a", vec![Value::Integer(1), Value::Integer(2)]),
            LocalColumn::infer("b", vec![Value::Integer(1)]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::RaggedColumn {
                column: "b".into(),
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_from_records() {
        let records = vec![
            json!({"name": "Alice", "score": 3}),
            json!({"name": "Bob", "city": "Oslo"}),
        ];
        let frame = LocalFrame::from_records(&records).unwrap();
        assert_eq!(frame.column_names(), vec!["name", "score", "city"]);
        assert_eq!(frame.row_count(), 2);
        assert_eq!(frame.column("score").unwrap().values[1], Value::Null);
        assert_eq!(frame.column("score").unwrap().dtype, LocalDtype::Int64);
        assert_eq!(frame.to_rows()[1][2], Value::Text("Oslo".into()));
    }

    #[test]
    fn test_from_records_rejects_scalars() {
        assert!(matches!(
            LocalFrame::from_records(&[json!(1)]),
            Err(SchemaError::Unsupported(_))
        ));
    }
}
