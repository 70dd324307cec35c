use std::fmt;

use uuid::Uuid;

use crate::core::{ResultColumn, SchemaError, TabularResult, Value, WarehouseType};
use super::{ColumnSpec, FrameKind, LocalColumn, LocalDtype, LocalFrame, SourceType, TabularSource};

/// Column types of the distributed engine's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparkType {
    String,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },
    Boolean,
    /// Session-timezone timestamp
    Timestamp,
    TimestampNtz,
    Date,
    Binary,
    DayTimeInterval,
    Array,
    Map,
    Struct,
    Null,
    CalendarInterval,
}

impl SparkType {
    /// Type the engine would infer for a column holding `value`.
    #[must_use]
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Integer(_) => Self::Long,
            Value::Float(_) => Self::Double,
            Value::Decimal(d) => Self::Decimal {
                precision: 38,
                scale: u8::try_from(d.scale()).unwrap_or(u8::MAX),
            },
            Value::Text(_) => Self::String,
            Value::Boolean(_) => Self::Boolean,
            Value::Date(_) => Self::Date,
            Value::Timestamp(_) => Self::TimestampNtz,
            Value::TimestampTz(_) => Self::Timestamp,
            Value::Duration(_) => Self::DayTimeInterval,
            Value::Binary(_) => Self::Binary,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Map,
        }
    }

    /// First non-null value decides; all-null columns stay `Null`.
    fn infer(values: impl Iterator<Item = Value>) -> Self {
        values
            .filter(|v| !v.is_null())
            .map(|v| Self::of_value(&v))
            .next()
            .unwrap_or(Self::Null)
    }

    #[must_use]
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::String => SourceType::Text,
            Self::Byte | Self::Short | Self::Integer | Self::Long => SourceType::Integer,
            Self::Float | Self::Double => SourceType::Float,
            Self::Decimal { precision, scale } => SourceType::Decimal {
                precision: *precision,
                scale: *scale,
            },
            Self::Boolean => SourceType::Boolean,
            Self::Timestamp => SourceType::DateTime {
                timezone: Some("session".to_string()),
            },
            Self::TimestampNtz => SourceType::DateTime { timezone: None },
            Self::Date => SourceType::Date,
            Self::Binary => SourceType::Binary,
            Self::DayTimeInterval => SourceType::Duration,
            Self::Array => SourceType::List,
            Self::Map => SourceType::Map,
            Self::Struct => SourceType::Struct,
            Self::Null => SourceType::Null,
            Self::CalendarInterval => SourceType::Unrecognized(self.to_string()),
        }
    }

    fn from_warehouse(ty: WarehouseType) -> Self {
        match ty {
            WarehouseType::String => Self::String,
            WarehouseType::Integer => Self::Long,
            WarehouseType::Float => Self::Double,
            WarehouseType::Number { precision, scale } => Self::Decimal { precision, scale },
            WarehouseType::Boolean => Self::Boolean,
            WarehouseType::Date => Self::Date,
            WarehouseType::Time => Self::DayTimeInterval,
            WarehouseType::TimestampNtz => Self::TimestampNtz,
            WarehouseType::Binary => Self::Binary,
            WarehouseType::Array => Self::Array,
            WarehouseType::Object => Self::Map,
        }
    }

    fn to_local_dtype(self, values: &[Value]) -> LocalDtype {
        match self {
            Self::Byte | Self::Short | Self::Integer | Self::Long => LocalDtype::Int64,
            Self::Float | Self::Double => LocalDtype::Float64,
            Self::Boolean => LocalDtype::Bool,
            Self::Timestamp => LocalColumn::infer("", values.to_vec()).dtype,
            Self::TimestampNtz => LocalDtype::DatetimeNs { tz: None },
            Self::DayTimeInterval => LocalDtype::TimedeltaNs,
            _ => LocalDtype::Object,
        }
    }
}

impl fmt::Display for SparkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Byte => write!(f, "tinyint"),
            Self::Short => write!(f, "smallint"),
            Self::Integer => write!(f, "int"),
            Self::Long => write!(f, "bigint"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            Self::Boolean => write!(f, "boolean"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::TimestampNtz => write!(f, "timestamp_ntz"),
            Self::Date => write!(f, "date"),
            Self::Binary => write!(f, "binary"),
            Self::DayTimeInterval => write!(f, "interval day to second"),
            Self::Array => write!(f, "array"),
            Self::Map => write!(f, "map"),
            Self::Struct => write!(f, "struct"),
            Self::Null => write!(f, "void"),
            Self::CalendarInterval => write!(f, "interval"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub name: String,
    pub data_type: SparkType,
    pub nullable: bool,
}

impl StructField {
    pub fn new(name: impl Into<String>, data_type: SparkType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }
}

/// Row-major frame produced by (and bound to) a compute session.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributedFrame {
    schema: Vec<StructField>,
    rows: Vec<Vec<Value>>,
    session_id: Option<Uuid>,
}

impl DistributedFrame {
    /// Every row must have one value per schema field.
    pub fn new(
        schema: Vec<StructField>,
        rows: Vec<Vec<Value>>,
        session_id: Option<Uuid>,
    ) -> Result<Self, SchemaError> {
        let expected = schema.len();
        if let Some((row, values)) = rows.iter().enumerate().find(|(_, r)| r.len() != expected) {
            return Err(SchemaError::RaggedRow {
                row,
                expected,
                found: values.len(),
            });
        }
        Ok(Self {
            schema,
            rows,
            session_id,
        })
    }

    /// Distributes a local frame. Object columns get the type of their
    /// first non-null value.
    #[must_use]
    pub fn from_local(frame: &LocalFrame, session_id: Option<Uuid>) -> Self {
        let schema = frame
            .columns()
            .iter()
            .map(|column| {
                let data_type = match &column.dtype {
                    LocalDtype::Int64 => SparkType::Long,
                    LocalDtype::Int32 => SparkType::Integer,
                    LocalDtype::Float64 => SparkType::Double,
                    LocalDtype::Float32 => SparkType::Float,
                    LocalDtype::Bool => SparkType::Boolean,
                    LocalDtype::DatetimeNs { tz: Some(_) } => SparkType::Timestamp,
                    LocalDtype::DatetimeNs { tz: None } => SparkType::TimestampNtz,
                    LocalDtype::TimedeltaNs => SparkType::DayTimeInterval,
                    LocalDtype::Object | LocalDtype::Category | LocalDtype::Other(_) => {
                        match SparkType::infer(column.values.iter().cloned()) {
                            SparkType::Null => SparkType::String,
                            inferred => inferred,
                        }
                    }
                };
                StructField::new(column.name.clone(), data_type)
            })
            .collect();

        Self {
            schema,
            rows: frame.to_rows(),
            session_id,
        }
    }

    /// Wraps a query result; typed result columns keep their type, untyped
    /// ones are inferred from the data.
    #[must_use]
    pub fn from_result(result: TabularResult, session_id: Option<Uuid>) -> Self {
        let schema: Vec<StructField> = result
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let data_type = column.data_type.map_or_else(
                    || SparkType::infer(result.rows().iter().filter_map(|r| r.get(idx).cloned())),
                    SparkType::from_warehouse,
                );
                StructField::new(column.name.clone(), data_type)
            })
            .collect();

        Self {
            schema,
            rows: result.into_rows(),
            session_id,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &[StructField] {
        &self.schema
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Session that produced this frame, if any.
    #[must_use]
    pub const fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    #[must_use]
    pub fn with_lowercase_columns(mut self) -> Self {
        for field in &mut self.schema {
            field.name = field.name.to_lowercase();
        }
        self
    }

    #[must_use]
    pub fn strip_timezones(&self) -> Self {
        let mut stripped = self.clone();
        let tz_columns: Vec<usize> = stripped
            .schema
            .iter()
            .enumerate()
            .filter(|(_, f)| f.data_type == SparkType::Timestamp)
            .map(|(idx, _)| idx)
            .collect();

        for idx in &tz_columns {
            stripped.schema[*idx].data_type = SparkType::TimestampNtz;
        }
        for row in &mut stripped.rows {
            for idx in &tz_columns {
                let value = std::mem::replace(&mut row[*idx], Value::Null);
                row[*idx] = value.without_timezone();
            }
        }
        stripped
    }

    /// Collects the frame into a local frame.
    pub fn to_local(&self) -> Result<LocalFrame, SchemaError> {
        let columns = self
            .schema
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                let values: Vec<Value> = self.rows.iter().map(|r| r[idx].clone()).collect();
                let dtype = field.data_type.to_local_dtype(&values);
                LocalColumn::new(field.name.clone(), dtype, values)
            })
            .collect();
        LocalFrame::from_columns(columns)
    }

    /// Converts to a query result, carrying over the schema as warehouse
    /// types where one applies.
    #[must_use]
    pub fn into_result(self) -> TabularResult {
        let columns = self
            .schema
            .iter()
            .map(|field| {
                ResultColumn::new(
                    field.name.clone(),
                    crate::schema::warehouse_type(&field.data_type.source_type()),
                )
            })
            .collect();
        TabularResult::new(columns, self.rows)
    }
}

impl TabularSource for DistributedFrame {
    fn kind(&self) -> FrameKind {
        FrameKind::Distributed
    }

    fn column_specs(&self) -> Vec<ColumnSpec> {
        self.schema
            .iter()
            .map(|f| ColumnSpec::new(f.name.clone(), f.data_type.source_type()))
            .collect()
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn to_rows(&self) -> Vec<Vec<Value>> {
        self.rows.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_ragged_rows_rejected() {
        let err = DistributedFrame::new(
            vec![StructField::new("a", SparkType::Long), StructField::new("b", SparkType::String)],
            vec![vec![Value::Integer(1), Value::Text("x".into())], vec![Value::Integer(2)]],
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::RaggedRow {
                row: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_from_local_infers_object_columns() {
        let local = LocalFrame::from_columns(vec![
            LocalColumn::infer("price", vec![Value::Decimal(Decimal::from_str("9.95").unwrap())]),
            LocalColumn::infer("note", vec![Value::Null]),
            LocalColumn::infer("qty", vec![Value::Integer(3)]),
        ])
        .unwrap();
        let frame = DistributedFrame::from_local(&local, None);
        let types: Vec<SparkType> = frame.schema().iter().map(|f| f.data_type).collect();
        assert_eq!(
            types,
            vec![
                SparkType::Decimal { precision: 38, scale: 2 },
                SparkType::String,
                SparkType::Long
            ]
        );
    }

    #[test]
    fn test_round_trip_through_local() {
        let frame = DistributedFrame::new(
            vec![StructField::new("ID", SparkType::Long), StructField::new("Name", SparkType::String)],
            vec![vec![Value::Integer(1), Value::Text("a".into())]],
            None,
        )
        .unwrap()
        .with_lowercase_columns();
        let local = frame.to_local().unwrap();
        assert_eq!(local.column_names(), vec!["id", "name"]);
        assert_eq!(local.column("id").unwrap().dtype, LocalDtype::Int64);
        assert_eq!(local.column("name").unwrap().dtype, LocalDtype::Object);
    }

    #[test]
    fn test_into_result_keeps_types() {
        let frame = DistributedFrame::new(
            vec![StructField::new("n", SparkType::Integer), StructField::new("v", SparkType::Null)],
            vec![vec![Value::Integer(1), Value::Null]],
            None,
        )
        .unwrap();
        let result = frame.into_result();
        assert_eq!(result.columns()[0].data_type, Some(WarehouseType::Integer));
        assert_eq!(result.columns()[1].data_type, None);
    }
}
