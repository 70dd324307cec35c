//! Table naming and schema inference for automated table creation.

use std::fmt;

use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::core::{SchemaError, WarehouseType};
use crate::frame::{duplicate_names, Frame, SourceType, TabularSource};

/// Fully qualified destination table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(database: impl Into<String>, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Qualifies a bare table name. A name that already carries a schema
    /// (`schema.table`) or database (`db.schema.table`) keeps those parts;
    /// anything left unspecified comes from the arguments, then the config.
    #[must_use]
    pub fn resolve(
        name: &str,
        schema: Option<&str>,
        database: Option<&str>,
        config: &ConnectionConfig,
    ) -> Self {
        let parts: Vec<&str> = name.split('.').collect();
        let schema = schema.filter(|s| !s.is_empty()).unwrap_or_else(|| config.schema());
        let database = database.filter(|d| !d.is_empty()).unwrap_or_else(|| config.database());

        match parts.as_slice() {
            [db, sch, table] => Self::new(*db, *sch, *table),
            [sch, table] => Self::new(database, *sch, *table),
            _ => Self::new(database, schema, name),
        }
    }

    /// `database.schema.table`
    #[must_use]
    pub fn qualified(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.table)
    }
}

/// Result of schema inference: the DDL plus the copy of the data that
/// should be uploaded (timezones stripped).
#[derive(Debug, Clone, PartialEq)]
pub struct DdlSpec {
    pub statement: String,
    pub table: TableRef,
    pub columns: Vec<(String, WarehouseType)>,
    pub prepared: Frame,
}

/// Maps a source column type to its warehouse type. `None` means there is
/// no dedicated mapping and the column should fall back to STRING.
#[must_use]
pub fn warehouse_type(source: &SourceType) -> Option<WarehouseType> {
    let mapped = match source {
        SourceType::Text => WarehouseType::String,
        SourceType::Integer => WarehouseType::Integer,
        SourceType::Float => WarehouseType::Float,
        SourceType::Boolean => WarehouseType::Boolean,
        SourceType::DateTime { .. } => WarehouseType::TimestampNtz,
        SourceType::Duration => WarehouseType::Time,
        SourceType::Decimal { precision, scale } => WarehouseType::Number {
            precision: *precision,
            scale: *scale,
        },
        SourceType::Date => WarehouseType::Date,
        SourceType::Binary => WarehouseType::Binary,
        SourceType::List => WarehouseType::Array,
        SourceType::Map | SourceType::Struct => WarehouseType::Object,
        SourceType::Null | SourceType::Unrecognized(_) => return None,
    };
    Some(mapped)
}

pub struct SchemaInferencer;

impl SchemaInferencer {
    /// Warehouse type of every column, in column order.
    pub fn column_types(source: &dyn TabularSource) -> Result<Vec<(String, WarehouseType)>, SchemaError> {
        let specs = source.column_specs();
        if specs.is_empty() {
            return Err(SchemaError::NoColumns);
        }

        let names: Vec<String> = specs.iter().map(|s| s.name.clone()).collect();
        let duplicates = duplicate_names(&names);
        if !duplicates.is_empty() {
            return Err(SchemaError::DuplicateColumns(duplicates));
        }

        Ok(specs
            .into_iter()
            .map(|spec| {
                let ty = warehouse_type(&spec.source_type).unwrap_or_else(|| {
                    warn!(
                        "Column '{}' has unrecognized type {}, using STRING",
                        spec.name, spec.source_type
                    );
                    WarehouseType::String
                });
                (spec.name, ty)
            })
            .collect())
    }

    /// Builds the `CREATE OR REPLACE TABLE` statement for `data` and the
    /// prepared copy to upload.
    pub fn infer(data: &Frame, table: TableRef) -> Result<DdlSpec, SchemaError> {
        let prepared = data.strip_timezones();
        let columns = Self::column_types(prepared.source())?;
        let statement = Self::create_table_sql(&table, &columns);
        debug!("Inferred DDL: {}", statement);

        Ok(DdlSpec {
            statement,
            table,
            columns,
            prepared,
        })
    }

    /// Column identifiers are emitted unquoted so the warehouse folds
    /// their case.
    #[must_use]
    pub fn create_table_sql(table: &TableRef, columns: &[(String, WarehouseType)]) -> String {
        let definitions: Vec<String> = columns
            .iter()
            .map(|(name, ty)| format!("{name} {ty}"))
            .collect();
        format!(
            "CREATE OR REPLACE TABLE {} ({})",
            table.qualified(),
            definitions.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigLoader, ConnectionOverrides};
    use crate::core::Value;
    use crate::frame::{DistributedFrame, LocalColumn, LocalDtype, LocalFrame, SparkType, StructField};
    use chrono::{FixedOffset, TimeZone};

    fn config() -> ConnectionConfig {
        ConfigLoader::isolated()
            .load(&ConnectionOverrides::new().account("acme").user("u").password("p"))
            .unwrap()
    }

    #[test]
    fn test_resolve_table_names() {
        let config = config();
        assert_eq!(
            TableRef::resolve("events", None, None, &config).qualified(),
            "proddb.public.events"
        );
        assert_eq!(
            TableRef::resolve("events", Some("staging"), Some("analytics"), &config).qualified(),
            "analytics.staging.events"
        );
        assert_eq!(
            TableRef::resolve("raw.events", None, None, &config).qualified(),
            "proddb.raw.events"
        );
        assert_eq!(
            TableRef::resolve("db.raw.events", Some("x"), None, &config).qualified(),
            "db.raw.events"
        );
    }

    #[test]
    fn test_local_frame_ddl() {
        let ts = FixedOffset::east_opt(3600).unwrap().with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let frame = LocalFrame::from_columns(vec![
            LocalColumn::infer("name", vec![Value::Text("a".into())]),
            LocalColumn::infer("qty", vec![Value::Integer(2)]),
            LocalColumn::infer("price", vec![Value::Float(1.5)]),
            LocalColumn::infer("active", vec![Value::Boolean(true)]),
            LocalColumn::infer("seen_at", vec![Value::TimestampTz(ts)]),
            LocalColumn::infer("wait", vec![Value::Duration(std::time::Duration::from_secs(5))]),
        ])
        .unwrap();

        let ddl = SchemaInferencer::infer(&frame.into(), TableRef::new("db", "s", "t")).unwrap();
        assert_eq!(
            ddl.statement,
            "CREATE OR REPLACE TABLE db.s.t (name STRING, qty INTEGER, price FLOAT, \
             active BOOLEAN, seen_at TIMESTAMP_NTZ, wait TIME)"
        );
        let prepared = ddl.prepared.to_local().unwrap();
        assert_eq!(prepared.column("seen_at").unwrap().dtype, LocalDtype::DatetimeNs { tz: None });
        assert!(matches!(prepared.column("seen_at").unwrap().values[0], Value::Timestamp(_)));
    }

    #[test]
    fn test_distributed_frame_ddl() {
        let frame = DistributedFrame::new(
            vec![
                StructField::new("b", SparkType::Byte),
                StructField::new("amount", SparkType::Decimal { precision: 10, scale: 2 }),
                StructField::new("day", SparkType::Date),
                StructField::new("blob", SparkType::Binary),
                StructField::new("tags", SparkType::Array),
                StructField::new("attrs", SparkType::Map),
                StructField::new("nested", SparkType::Struct),
                StructField::new("nothing", SparkType::Null),
                StructField::new("span", SparkType::CalendarInterval),
            ],
            Vec::new(),
            None,
        )
        .unwrap();

        let ddl = SchemaInferencer::infer(&frame.into(), TableRef::new("db", "s", "t")).unwrap();
        let types: Vec<String> = ddl.columns.iter().map(|(_, t)| t.to_string()).collect();
        assert_eq!(
            types,
            vec![
                "INTEGER", "NUMBER(10,2)", "DATE", "BINARY", "ARRAY", "OBJECT", "OBJECT", "STRING",
                "STRING"
            ]
        );
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let frame = LocalFrame::from_columns(vec![
            LocalColumn::infer("a", vec![Value::Integer(1)]),
            LocalColumn::infer("a", vec![Value::Integer(2)]),
        ])
        .unwrap();
        let err = SchemaInferencer::infer(&frame.into(), TableRef::new("db", "s", "t")).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateColumns(vec!["a".into()]));
    }

    #[test]
    fn test_no_columns_rejected() {
        let frame = LocalFrame::from_columns(Vec::new()).unwrap();
        let err = SchemaInferencer::infer(&frame.into(), TableRef::new("db", "s", "t")).unwrap_err();
        assert_eq!(err, SchemaError::NoColumns);
    }

    #[test]
    fn test_unrecognized_dtype_maps_to_string() {
        let frame = LocalFrame::from_columns(vec![LocalColumn::new(
            "c",
            LocalDtype::Category,
            vec![Value::Text("x".into())],
        )])
        .unwrap();
        let ddl = SchemaInferencer::infer(&frame.into(), TableRef::new("db", "s", "t")).unwrap();
        assert_eq!(ddl.columns, vec![("c".to_string(), WarehouseType::String)]);
    }
}
