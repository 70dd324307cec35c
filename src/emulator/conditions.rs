/// Expression and WHERE-clause evaluation against stored rows.
///
/// Comparisons involving NULL are never true, so `col = NULL` filters out
/// every row; use `IS NULL` instead.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use crate::core::Value;
use super::catalog::StoredColumn;
use super::parser::{CompareOp, Condition, Expr, ScalarFunction};
use super::WarehouseError;

pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn evaluate(columns: &[StoredColumn], row: &[Value], condition: &Condition) -> Result<bool, WarehouseError> {
        match condition {
            Condition::Compare { left, op, right } => {
                let left = Self::eval_expr(columns, row, left)?;
                let right = Self::eval_expr(columns, row, right)?;
                let Some(ordering) = Self::compare_values(&left, &right)? else {
                    return Ok(false);
                };
                Ok(match op {
                    CompareOp::Eq => ordering == Ordering::Equal,
                    CompareOp::NotEq => ordering != Ordering::Equal,
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::LtEq => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::GtEq => ordering != Ordering::Less,
                })
            }
            Condition::IsNull(e) => Ok(Self::eval_expr(columns, row, e)?.is_null()),
            Condition::IsNotNull(e) => Ok(!Self::eval_expr(columns, row, e)?.is_null()),
            Condition::In(e, list) => {
                let value = Self::eval_expr(columns, row, e)?;
                for item in list {
                    let item = Self::eval_expr(columns, row, item)?;
                    if Self::compare_values(&value, &item)? == Some(Ordering::Equal) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Like(e, pattern) => {
                let value = Self::eval_expr(columns, row, e)?;
                let pattern = Self::eval_expr(columns, row, pattern)?;
                Self::match_like(&value, &pattern)
            }
            Condition::And(left, right) => {
                let left_result = Self::evaluate(columns, row, left)?;
                let right_result = Self::evaluate(columns, row, right)?;
                Ok(left_result && right_result)
            }
            Condition::Or(left, right) => {
                let left_result = Self::evaluate(columns, row, left)?;
                let right_result = Self::evaluate(columns, row, right)?;
                Ok(left_result || right_result)
            }
        }
    }

    /// Evaluates an expression. Bind variables must already be resolved.
    pub fn eval_expr(columns: &[StoredColumn], row: &[Value], expr: &Expr) -> Result<Value, WarehouseError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Column(ident) => {
                let idx = Self::get_column_index(columns, &ident.normalized())?;
                Ok(row.get(idx).cloned().unwrap_or(Value::Null))
            }
            Expr::Placeholder(p) => Err(WarehouseError::MissingBind(format!("{p:?}"))),
            Expr::Function { name, arg } => {
                let value = Self::eval_expr(columns, row, arg)?;
                match (name, value) {
                    (_, Value::Null) => Ok(Value::Null),
                    (ScalarFunction::Lower, Value::Text(s)) => Ok(Value::Text(s.to_lowercase())),
                    (ScalarFunction::Upper, Value::Text(s)) => Ok(Value::Text(s.to_uppercase())),
                    (_, other) => Err(WarehouseError::TypeMismatch(format!(
                        "{expr} expects text, got {}",
                        other.type_name()
                    ))),
                }
            }
        }
    }

    fn get_column_index(columns: &[StoredColumn], name: &str) -> Result<usize, WarehouseError> {
        columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| WarehouseError::InvalidIdentifier(name.to_string()))
    }

    /// Orders two values; `None` when either side is NULL.
    pub fn compare_values(a: &Value, b: &Value) -> Result<Option<Ordering>, WarehouseError> {
        let ordering = match (a, b) {
            (Value::Null, _) | (_, Value::Null) => return Ok(None),
            (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
            (Value::Decimal(x), Value::Decimal(y)) => x.cmp(y),
            (Value::Integer(x), Value::Decimal(y)) => Decimal::from(*x).cmp(y),
            (Value::Decimal(x), Value::Integer(y)) => x.cmp(&Decimal::from(*y)),
            (Value::Float(_), Value::Integer(_) | Value::Float(_) | Value::Decimal(_))
            | (Value::Integer(_) | Value::Decimal(_), Value::Float(_)) => {
                let (x, y) = (a.as_f64(), b.as_f64());
                return Ok(x.zip(y).and_then(|(x, y)| x.partial_cmp(&y)));
            }
            (Value::Text(x), Value::Text(y)) => x.cmp(y),
            (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
            (Value::Date(x), Value::Date(y)) => x.cmp(y),
            (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
            (Value::TimestampTz(x), Value::TimestampTz(y)) => x.cmp(y),
            (Value::Duration(x), Value::Duration(y)) => x.cmp(y),
            (Value::Binary(x), Value::Binary(y)) => x.cmp(y),
            _ => {
                return Err(WarehouseError::TypeMismatch(format!(
                    "cannot compare {} with {}",
                    a.type_name(),
                    b.type_name()
                )));
            }
        };
        Ok(Some(ordering))
    }

    /// `%` matches any run of characters, `_` exactly one.
    fn match_like(value: &Value, pattern: &Value) -> Result<bool, WarehouseError> {
        match (value, pattern) {
            (Value::Null, _) | (_, Value::Null) => Ok(false),
            (Value::Text(text), Value::Text(pattern)) => Ok(Self::like_pattern_match(text, pattern)),
            (other, _) => Err(WarehouseError::TypeMismatch(format!(
                "LIKE expects text, got {}",
                other.type_name()
            ))),
        }
    }

    fn like_pattern_match(text: &str, pattern: &str) -> bool {
        let text_chars: Vec<char> = text.chars().collect();
        let pattern_chars: Vec<char> = pattern.chars().collect();

        Self::match_recursive(&text_chars, &pattern_chars, 0, 0)
    }

    fn match_recursive(text: &[char], pattern: &[char], ti: usize, pi: usize) -> bool {
        if pi >= pattern.len() {
            return ti >= text.len();
        }

        if pattern[pi] == '%' {
            // Zero characters, or one more and stay on the %
            return Self::match_recursive(text, pattern, ti, pi + 1)
                || (ti < text.len() && Self::match_recursive(text, pattern, ti + 1, pi));
        }

        if ti >= text.len() {
            return false;
        }

        if pattern[pi] == '_' || text[ti] == pattern[pi] {
            return Self::match_recursive(text, pattern, ti + 1, pi + 1);
        }

        false
    }
}
