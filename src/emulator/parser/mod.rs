//! The reference warehouse's SQL dialect.

mod common;
mod ddl;
mod expr;
mod queries;
mod statement;

pub use statement::{
    ColumnDef, CompareOp, Condition, Expr, Ident, ObjectName, OrderBy, Placeholder, Privilege,
    ScalarFunction, SelectItem, Statement,
};

use nom::branch::alt;

use super::WarehouseError;

pub fn parse_statement(input: &str) -> Result<Statement, WarehouseError> {
    let input = input.trim();
    let input = input.trim_end_matches(';');

    let result = alt((
        ddl::create_table,
        ddl::drop_table,
        ddl::grant,
        queries::insert,
        queries::select,
    ))(input);

    match result {
        Ok((remaining, stmt)) => {
            if remaining.trim().is_empty() {
                Ok(stmt)
            } else {
                Err(WarehouseError::Parse(format!(
                    "unexpected '{}'",
                    remaining.trim()
                )))
            }
        }
        Err(e) => Err(WarehouseError::Parse(format!("{e:?}"))),
    }
}
