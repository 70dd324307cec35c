use serde::{Deserialize, Serialize};
use super::column::ResultColumn;
use super::value::Value;

/// Output of any query, whichever execution strategy produced it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TabularResult {
    columns: Vec<ResultColumn>,
    rows: Vec<Vec<Value>>,
}

impl TabularResult {
    #[must_use]
    pub const fn new(columns: Vec<ResultColumn>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Result with columns but no rows.
    #[must_use]
    pub const fn empty(columns: Vec<ResultColumn>) -> Self {
        Self::new(columns, Vec::new())
    }

    /// Single-cell status result, the shape warehouses use to answer DDL.
    #[must_use]
    pub fn status(message: impl Into<String>) -> Self {
        Self::new(
            vec![ResultColumn::typed("status", super::WarehouseType::String)],
            vec![vec![Value::Text(message.into())]],
        )
    }

    /// Case-folds every column name to lowercase.
    #[must_use]
    pub fn with_lowercase_columns(mut self) -> Self {
        for column in &mut self.columns {
            column.name = column.name.to_lowercase();
        }
        self
    }

    #[must_use]
    pub fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell lookup by row position and column name.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }
}
