/// Statement execution against the catalog
///
/// DDL answers with a one-row status result; SELECT projects stored
/// columns in catalog case.

use std::cmp::Ordering;

use crate::core::{ResultColumn, TabularResult, Value, WarehouseType};
use super::catalog::{Catalog, StoredColumn};
use super::conditions::ConditionEvaluator;
use super::parser::{ColumnDef, Expr, Ident, ObjectName, OrderBy, SelectItem, Statement};
use super::WarehouseError;

/// Database and schema that unqualified names resolve against.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub database: String,
    pub schema: String,
}

impl SessionContext {
    pub fn new(database: &str, schema: &str) -> Self {
        Self {
            database: database.to_uppercase(),
            schema: schema.to_uppercase(),
        }
    }

    /// Catalog key for `name`, filling in missing qualifiers.
    pub fn resolve(&self, name: &ObjectName) -> Result<String, WarehouseError> {
        let parts: Vec<String> = name.0.iter().map(Ident::normalized).collect();
        match parts.as_slice() {
            [table] => Ok(format!("{}.{}.{table}", self.database, self.schema)),
            [schema, table] => Ok(format!("{}.{schema}.{table}", self.database)),
            [database, schema, table] => Ok(format!("{database}.{schema}.{table}")),
            _ => Err(WarehouseError::InvalidIdentifier(name.to_string())),
        }
    }
}

pub struct StatementExecutor;

impl StatementExecutor {
    pub fn execute(
        catalog: &mut Catalog,
        ctx: &SessionContext,
        stmt: Statement,
    ) -> Result<TabularResult, WarehouseError> {
        match stmt {
            Statement::CreateTable {
                name,
                columns,
                or_replace,
                if_not_exists,
            } => {
                let key = ctx.resolve(&name)?;
                let short = Self::short_name(&key);
                let created = catalog.create_table(&key, Self::stored_columns(columns), or_replace, if_not_exists)?;
                if created {
                    Ok(TabularResult::status(format!("Table {short} successfully created.")))
                } else {
                    Ok(TabularResult::status(format!(
                        "{short} already exists, statement succeeded."
                    )))
                }
            }
            Statement::DropTable { name, if_exists } => {
                let key = ctx.resolve(&name)?;
                let short = Self::short_name(&key);
                if catalog.drop_table(&key, if_exists)? {
                    Ok(TabularResult::status(format!("{short} successfully dropped.")))
                } else {
                    Ok(TabularResult::status(format!(
                        "Drop statement executed successfully ({short} already dropped)."
                    )))
                }
            }
            Statement::Grant { privilege, table, role } => {
                let key = ctx.resolve(&table)?;
                catalog.grant(&key, privilege, &role.normalized())?;
                Ok(TabularResult::status("Statement executed successfully."))
            }
            Statement::Insert { table, columns, rows } => {
                let key = ctx.resolve(&table)?;
                let names: Option<Vec<String>> =
                    columns.map(|cols| cols.iter().map(Ident::normalized).collect());
                let values = rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|e| ConditionEvaluator::eval_expr(&[], &[], e))
                            .collect::<Result<Vec<Value>, _>>()
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let inserted = catalog.insert_rows(&key, names.as_deref(), values)?;
                Ok(TabularResult::new(
                    vec![ResultColumn::typed("number of rows inserted", WarehouseType::Integer)],
                    vec![vec![Value::Integer(inserted as i64)]],
                ))
            }
            Statement::Select {
                items,
                from,
                filter,
                order_by,
                limit,
            } => {
                let (columns, mut rows) = match from {
                    Some(name) => {
                        let table = catalog.table(&ctx.resolve(&name)?)?;
                        (table.columns.clone(), table.rows.clone())
                    }
                    // SELECT without FROM evaluates once
                    None => (Vec::new(), vec![Vec::new()]),
                };

                if let Some(cond) = &filter {
                    let mut kept = Vec::with_capacity(rows.len());
                    for row in rows {
                        if ConditionEvaluator::evaluate(&columns, &row, cond)? {
                            kept.push(row);
                        }
                    }
                    rows = kept;
                }

                if !order_by.is_empty() {
                    Self::sort_rows(&columns, &mut rows, &order_by)?;
                }

                if let Some(n) = limit {
                    rows.truncate(n);
                }

                Self::project(&columns, rows, &items)
            }
        }
    }

    fn short_name(key: &str) -> &str {
        key.rsplit('.').next().unwrap_or(key)
    }

    fn stored_columns(defs: Vec<ColumnDef>) -> Vec<StoredColumn> {
        defs.into_iter()
            .map(|def| StoredColumn::new(def.name.normalized(), def.data_type))
            .collect()
    }

    /// Stable multi-key sort. NULLs sort last in either direction.
    fn sort_rows(columns: &[StoredColumn], rows: &mut Vec<Vec<Value>>, order_by: &[OrderBy]) -> Result<(), WarehouseError> {
        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows.drain(..) {
            let keys = order_by
                .iter()
                .map(|o| ConditionEvaluator::eval_expr(columns, &row, &o.expr))
                .collect::<Result<Vec<_>, _>>()?;
            keyed.push((keys, row));
        }

        // Surface type errors before sorting; the comparator cannot fail.
        for pair in keyed.windows(2) {
            for (a, b) in pair[0].0.iter().zip(&pair[1].0) {
                ConditionEvaluator::compare_values(a, b)?;
            }
        }

        keyed.sort_by(|(a, _), (b, _)| {
            for ((x, y), spec) in a.iter().zip(b).zip(order_by) {
                let ordering = match (x.is_null(), y.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => {
                        let ord = ConditionEvaluator::compare_values(x, y)
                            .ok()
                            .flatten()
                            .unwrap_or(Ordering::Equal);
                        if spec.ascending { ord } else { ord.reverse() }
                    }
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        rows.extend(keyed.into_iter().map(|(_, row)| row));
        Ok(())
    }

    fn project(
        columns: &[StoredColumn],
        rows: Vec<Vec<Value>>,
        items: &[SelectItem],
    ) -> Result<TabularResult, WarehouseError> {
        let mut result_columns = Vec::new();
        for item in items {
            match item {
                SelectItem::Wildcard => {
                    if columns.is_empty() {
                        return Err(WarehouseError::Parse(
                            "SELECT * with no tables specified is not valid".to_string(),
                        ));
                    }
                    result_columns.extend(
                        columns
                            .iter()
                            .map(|c| ResultColumn::typed(c.name.clone(), c.data_type)),
                    );
                }
                SelectItem::Expr { expr, alias } => {
                    let name = match (alias, expr) {
                        (Some(alias), _) => alias.normalized(),
                        (None, Expr::Column(ident)) => ident.normalized(),
                        (None, other) => other.to_string(),
                    };
                    result_columns.push(ResultColumn::new(name, Self::expr_type(columns, expr)));
                }
            }
        }

        let mut projected = Vec::with_capacity(rows.len());
        for row in rows {
            let mut out = Vec::with_capacity(result_columns.len());
            for item in items {
                match item {
                    SelectItem::Wildcard => out.extend(row.iter().cloned()),
                    SelectItem::Expr { expr, .. } => {
                        out.push(ConditionEvaluator::eval_expr(columns, &row, expr)?);
                    }
                }
            }
            projected.push(out);
        }

        Ok(TabularResult::new(result_columns, projected))
    }

    fn expr_type(columns: &[StoredColumn], expr: &Expr) -> Option<WarehouseType> {
        match expr {
            Expr::Column(ident) => {
                let name = ident.normalized();
                columns.iter().find(|c| c.name == name).map(|c| c.data_type)
            }
            Expr::Function { .. } => Some(WarehouseType::String),
            Expr::Literal(_) | Expr::Placeholder(_) => None,
        }
    }
}
