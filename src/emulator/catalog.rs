use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::backend::{WriteMode, WriteSummary};
use crate::core::{Value, WarehouseType};
use super::parser::Privilege;
use super::WarehouseError;

/// Rows per upload chunk reported by bulk loads.
pub const CHUNK_SIZE: usize = 16_384;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredColumn {
    pub name: String,
    pub data_type: WarehouseType,
}

impl StoredColumn {
    pub fn new(name: impl Into<String>, data_type: WarehouseType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoredTable {
    pub columns: Vec<StoredColumn>,
    pub rows: Vec<Vec<Value>>,
}

impl StoredTable {
    #[must_use]
    pub const fn new(columns: Vec<StoredColumn>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Column names must stay distinct once case is folded.
fn ensure_unique_columns(columns: &[StoredColumn]) -> Result<(), WarehouseError> {
    for (idx, column) in columns.iter().enumerate() {
        if columns[..idx]
            .iter()
            .any(|earlier| earlier.name.eq_ignore_ascii_case(&column.name))
        {
            return Err(WarehouseError::DuplicateColumn(column.name.clone()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Grant {
    pub table: String,
    pub privilege: Privilege,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    /// SHA-256 of the password (hex)
    pub password_hash: String,
}

impl User {
    #[must_use]
    pub fn new(name: &str, password: &str) -> Self {
        Self {
            name: name.to_uppercase(),
            password_hash: Self::hash_password(password),
        }
    }

    #[must_use]
    pub fn hash_password(password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        self.password_hash == Self::hash_password(password)
    }
}

/// Everything the reference warehouse stores. Table keys are fully
/// qualified, normalized names (`DB.SCHEMA.TABLE`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub account: String,
    tables: BTreeMap<String, StoredTable>,
    grants: Vec<Grant>,
    users: BTreeMap<String, User>,
}

impl Catalog {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            ..Self::default()
        }
    }

    pub fn add_user(&mut self, name: &str, password: &str) {
        let user = User::new(name, password);
        self.users.insert(user.name.clone(), user);
    }

    /// Checks a login. Account and user names are case-insensitive.
    pub fn authenticate(&self, account: &str, user: &str, password: &str) -> Result<(), WarehouseError> {
        if !self.account.eq_ignore_ascii_case(account) {
            return Err(WarehouseError::UnknownAccount(account.to_string()));
        }
        match self.users.get(&user.to_uppercase()) {
            Some(u) if u.verify_password(password) => Ok(()),
            _ => Err(WarehouseError::AuthenticationFailed),
        }
    }

    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    #[must_use]
    pub fn contains_table(&self, key: &str) -> bool {
        self.tables.contains_key(key)
    }

    pub fn table(&self, key: &str) -> Result<&StoredTable, WarehouseError> {
        self.tables
            .get(key)
            .ok_or_else(|| WarehouseError::TableNotFound(key.to_string()))
    }

    /// Returns whether a table was created (false when `if_not_exists`
    /// found one already).
    pub fn create_table(
        &mut self,
        key: &str,
        columns: Vec<StoredColumn>,
        or_replace: bool,
        if_not_exists: bool,
    ) -> Result<bool, WarehouseError> {
        ensure_unique_columns(&columns)?;
        if self.tables.contains_key(key) {
            if if_not_exists {
                return Ok(false);
            }
            if !or_replace {
                return Err(WarehouseError::TableAlreadyExists(key.to_string()));
            }
            self.grants.retain(|g| g.table != key);
        }
        self.tables.insert(key.to_string(), StoredTable::new(columns));
        Ok(true)
    }

    pub fn drop_table(&mut self, key: &str, if_exists: bool) -> Result<bool, WarehouseError> {
        if self.tables.remove(key).is_some() {
            self.grants.retain(|g| g.table != key);
            Ok(true)
        } else if if_exists {
            Ok(false)
        } else {
            Err(WarehouseError::TableNotFound(key.to_string()))
        }
    }

    /// Appends rows. `columns` names the target columns of each row value
    /// (normalized); `None` means all columns in table order.
    pub fn insert_rows(
        &mut self,
        key: &str,
        columns: Option<&[String]>,
        rows: Vec<Vec<Value>>,
    ) -> Result<usize, WarehouseError> {
        let table = self
            .tables
            .get_mut(key)
            .ok_or_else(|| WarehouseError::TableNotFound(key.to_string()))?;

        let targets: Vec<usize> = match columns {
            Some(names) => names
                .iter()
                .map(|name| {
                    table
                        .column_index(name)
                        .ok_or_else(|| WarehouseError::InvalidIdentifier(name.clone()))
                })
                .collect::<Result<_, _>>()?,
            None => (0..table.columns.len()).collect(),
        };

        let mut prepared = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != targets.len() {
                return Err(WarehouseError::ColumnCountMismatch {
                    expected: targets.len(),
                    found: row.len(),
                });
            }
            let mut stored = vec![Value::Null; table.columns.len()];
            for (value, &idx) in row.into_iter().zip(&targets) {
                stored[idx] = coerce_value(value, table.columns[idx].data_type)?;
            }
            prepared.push(stored);
        }

        let count = prepared.len();
        table.rows.extend(prepared);
        Ok(count)
    }

    pub fn grant(&mut self, key: &str, privilege: Privilege, role: &str) -> Result<(), WarehouseError> {
        if !self.tables.contains_key(key) {
            return Err(WarehouseError::TableNotFound(key.to_string()));
        }
        let grant = Grant {
            table: key.to_string(),
            privilege,
            role: role.to_string(),
        };
        if !self.grants.contains(&grant) {
            self.grants.push(grant);
        }
        Ok(())
    }

    #[must_use]
    pub fn grants_on(&self, key: &str) -> Vec<Grant> {
        self.grants.iter().filter(|g| g.table == key).cloned().collect()
    }

    /// Bulk load used by both the driver and the compute session.
    ///
    /// Append and overwrite create a missing table from `columns`; overwrite
    /// also replaces an existing one. Error-if-exists fails on an existing
    /// table and ignore leaves it untouched.
    pub fn write_frame(
        &mut self,
        key: &str,
        columns: &[(String, WarehouseType)],
        rows: Vec<Vec<Value>>,
        mode: WriteMode,
    ) -> Result<WriteSummary, WarehouseError> {
        let stored: Vec<StoredColumn> = columns
            .iter()
            .map(|(name, ty)| StoredColumn::new(name.clone(), *ty))
            .collect();
        ensure_unique_columns(&stored)?;

        let exists = self.tables.contains_key(key);
        match mode {
            WriteMode::ErrorIfExists if exists => {
                return Err(WarehouseError::TableAlreadyExists(key.to_string()));
            }
            WriteMode::Ignore if exists => {
                return Ok(WriteSummary {
                    skipped: true,
                    ..WriteSummary::default()
                });
            }
            WriteMode::Overwrite => {
                self.tables.remove(key);
            }
            _ => {}
        }

        if !self.tables.contains_key(key) {
            self.tables.insert(key.to_string(), StoredTable::new(stored));
        }

        let names: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
        let rows_written = self.insert_rows(key, Some(names.as_slice()), rows)?;
        Ok(WriteSummary {
            rows_written,
            chunks: rows_written.div_ceil(CHUNK_SIZE),
            skipped: false,
        })
    }
}

fn mismatch(value: &Value, ty: WarehouseType) -> WarehouseError {
    WarehouseError::TypeMismatch(format!(
        "cannot store {} value '{}' in a {} column",
        value.type_name(),
        value,
        ty
    ))
}

/// Converts `value` to the storage representation of a `ty` column.
pub fn coerce_value(value: Value, ty: WarehouseType) -> Result<Value, WarehouseError> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    let coerced = match (ty, &value) {
        (WarehouseType::String, Value::Text(_)) => Some(value.clone()),
        (WarehouseType::String, other) => Some(Value::Text(other.to_string())),

        (WarehouseType::Integer, Value::Integer(_)) => Some(value.clone()),
        (WarehouseType::Integer, Value::Float(f)) => Some(Value::Integer(f.round() as i64)),
        (WarehouseType::Integer, Value::Decimal(d)) => d.round().to_i64().map(Value::Integer),
        (WarehouseType::Integer, Value::Boolean(b)) => Some(Value::Integer(i64::from(*b))),
        (WarehouseType::Integer, Value::Text(s)) => s.trim().parse().ok().map(Value::Integer),

        (WarehouseType::Float, Value::Float(_)) => Some(value.clone()),
        (WarehouseType::Float, Value::Integer(_) | Value::Decimal(_) | Value::Text(_)) => {
            value.as_f64().map(Value::Float)
        }

        (WarehouseType::Number { scale, .. }, _) => {
            let decimal = match &value {
                Value::Decimal(d) => Some(*d),
                Value::Integer(i) => Some(Decimal::from(*i)),
                Value::Float(f) => Decimal::from_f64(*f),
                Value::Text(s) => s.trim().parse::<Decimal>().ok(),
                _ => None,
            };
            decimal.map(|d| Value::Decimal(d.round_dp(u32::from(scale))))
        }

        (WarehouseType::Boolean, Value::Boolean(_)) => Some(value.clone()),
        (WarehouseType::Boolean, Value::Integer(i)) => Some(Value::Boolean(*i != 0)),
        (WarehouseType::Boolean, Value::Text(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Some(Value::Boolean(true)),
            "false" | "f" | "no" | "n" | "0" => Some(Value::Boolean(false)),
            _ => None,
        },

        (WarehouseType::Date, Value::Date(_)) => Some(value.clone()),
        (WarehouseType::Date, Value::Timestamp(t)) => Some(Value::Date(t.date())),
        (WarehouseType::Date, Value::Text(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .map(Value::Date),

        (WarehouseType::Time, Value::Duration(_)) => Some(value.clone()),

        (WarehouseType::TimestampNtz, Value::Timestamp(_)) => Some(value.clone()),
        (WarehouseType::TimestampNtz, Value::TimestampTz(t)) => Some(Value::Timestamp(t.naive_local())),
        (WarehouseType::TimestampNtz, Value::Date(d)) => d.and_hms_opt(0, 0, 0).map(Value::Timestamp),
        (WarehouseType::TimestampNtz, Value::Text(s)) => {
            let s = s.trim();
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .ok()
                .map(Value::Timestamp)
        }

        (WarehouseType::Binary, Value::Binary(_)) => Some(value.clone()),
        (WarehouseType::Binary, Value::Text(s)) => hex::decode(s.trim()).ok().map(Value::Binary),

        (WarehouseType::Array, Value::Array(_)) => Some(value.clone()),
        (WarehouseType::Object, Value::Object(_)) => Some(value.clone()),
        (WarehouseType::Array | WarehouseType::Object, Value::Text(s)) => {
            serde_json::from_str::<serde_json::Value>(s)
                .ok()
                .map(|json| Value::from(&json))
                .filter(|v| match ty {
                    WarehouseType::Array => matches!(v, Value::Array(_)),
                    _ => matches!(v, Value::Object(_)),
                })
        }

        _ => None,
    };

    coerced.ok_or_else(|| mismatch(&value, ty))
}
