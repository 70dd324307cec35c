// Module declarations
pub mod error;
pub mod value;
pub mod data_type;
pub mod column;
pub mod params;
pub mod tabular;

// Re-exports for convenience
pub use error::{BackendError, ConfigurationError, GatewayError, QueryError, SchemaError, WriteError};
pub use value::Value;
pub use data_type::WarehouseType;
pub use column::ResultColumn;
pub use params::Params;
pub use tabular::TabularResult;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, FixedOffset};

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Float(3.5).to_string(), "3.5");
        assert_eq!(Value::Text("hello".to_string()).to_string(), "hello");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Binary(vec![0xde, 0xad]).to_string(), "dead");
        assert_eq!(
            Value::Array(vec![Value::Integer(1), Value::Text("a".into())]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn test_value_as_f64() {
        assert_eq!(Value::Integer(2).as_f64(), Some(2.0));
        assert_eq!(Value::Text(" 0.75 ".into()).as_f64(), Some(0.75));
        assert_eq!(Value::Text("high".into()).as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn test_value_without_timezone_keeps_wall_clock() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let zoned = offset.with_ymd_and_hms(2024, 5, 1, 18, 30, 0).unwrap();
        let naive = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap();
        assert_eq!(Value::TimestampTz(zoned).without_timezone(), Value::Timestamp(naive));
        assert_eq!(Value::Integer(1).without_timezone(), Value::Integer(1));
    }

    #[test]
    fn test_value_from_json() {
        let json: serde_json::Value = serde_json::json!({"spicy": 0.9, "tags": ["pho", 3]});
        let value = Value::from(&json);
        match value {
            Value::Object(fields) => {
                assert_eq!(fields.get("spicy"), Some(&Value::Float(0.9)));
                assert_eq!(
                    fields.get("tags"),
                    Some(&Value::Array(vec![Value::Text("pho".into()), Value::Integer(3)]))
                );
            }
            other => panic!("Expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_warehouse_type_display() {
        assert_eq!(WarehouseType::String.to_string(), "STRING");
        assert_eq!(WarehouseType::TimestampNtz.to_string(), "TIMESTAMP_NTZ");
        assert_eq!(
            WarehouseType::Number { precision: 10, scale: 2 }.to_string(),
            "NUMBER(10,2)"
        );
    }

    #[test]
    fn test_result_lowercase_columns() {
        let result = TabularResult::empty(vec![
            ResultColumn::new("Consumer_ID", None),
            ResultColumn::new("TOP_CUISINES", Some(WarehouseType::String)),
        ])
        .with_lowercase_columns();
        assert_eq!(result.column_names(), vec!["consumer_id", "top_cuisines"]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_result_get_by_name() {
        let result = TabularResult::new(
            vec![ResultColumn::new("id", None), ResultColumn::new("name", None)],
            vec![vec![Value::Integer(1), Value::Text("Alice".into())]],
        );
        assert_eq!(result.get(0, "name"), Some(&Value::Text("Alice".into())));
        assert_eq!(result.get(0, "missing"), None);
        assert_eq!(result.get(3, "id"), None);
    }

    #[test]
    fn test_params_named_lookup_is_case_insensitive() {
        let params = Params::new().bind("UserName", "fiona").push(7);
        assert_eq!(params.get_named("username"), Some(&Value::Text("fiona".into())));
        assert_eq!(params.get_positional(0), Some(&Value::Integer(7)));
        assert_eq!(params.len(), 2);
        assert!(Params::new().is_empty());
    }

    #[test]
    fn test_configuration_error_names_fields() {
        let err = ConfigurationError::MissingFields(vec!["user", "password"]);
        assert_eq!(err.to_string(), "Missing required connection parameters: user, password");
    }
}
