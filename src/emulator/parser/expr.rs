use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{map, opt, value},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use super::common::{ident, keyword, literal, placeholder, ws};
use super::statement::{CompareOp, Condition, Expr, ScalarFunction};

fn function_call(input: &str) -> IResult<&str, Expr> {
    map(
        tuple((
            alt((
                value(ScalarFunction::Lower, keyword("LOWER")),
                value(ScalarFunction::Upper, keyword("UPPER")),
            )),
            ws(char('(')),
            expr,
            ws(char(')')),
        )),
        |(name, _, arg, _)| Expr::Function {
            name,
            arg: Box::new(arg),
        },
    )(input)
}

pub fn expr(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        map(placeholder, Expr::Placeholder),
        map(literal, Expr::Literal),
        function_call,
        map(ident, Expr::Column),
    )))(input)
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    ws(alt((
        value(CompareOp::GtEq, tag(">=")),
        value(CompareOp::LtEq, tag("<=")),
        value(CompareOp::NotEq, tag("!=")),
        value(CompareOp::NotEq, tag("<>")),
        value(CompareOp::Eq, tag("=")),
        value(CompareOp::Gt, tag(">")),
        value(CompareOp::Lt, tag("<")),
    )))(input)
}

// Parse a single predicate (expr = expr, expr IS NULL, ...)
fn condition_term(input: &str) -> IResult<&str, Condition> {
    alt((
        delimited(ws(char('(')), condition, ws(char(')'))),
        map(
            tuple((expr, ws(keyword("IS")), ws(keyword("NOT")), ws(keyword("NULL")))),
            |(e, _, _, _)| Condition::IsNotNull(e),
        ),
        map(
            tuple((expr, ws(keyword("IS")), ws(keyword("NULL")))),
            |(e, _, _)| Condition::IsNull(e),
        ),
        map(
            tuple((
                expr,
                ws(keyword("IN")),
                delimited(ws(char('(')), separated_list1(ws(char(',')), expr), ws(char(')'))),
            )),
            |(e, _, list)| Condition::In(e, list),
        ),
        map(
            tuple((expr, ws(keyword("LIKE")), expr)),
            |(e, _, pattern)| Condition::Like(e, pattern),
        ),
        map(tuple((expr, compare_op, expr)), |(left, op, right)| {
            Condition::Compare { left, op, right }
        }),
    ))(input)
}

// AND binds tighter than OR
fn condition_and(input: &str) -> IResult<&str, Condition> {
    let (input, first) = condition_term(input)?;
    let (input, rest) = opt(preceded(ws(keyword("AND")), condition_and))(input)?;

    match rest {
        Some(right) => Ok((input, Condition::And(Box::new(first), Box::new(right)))),
        None => Ok((input, first)),
    }
}

pub fn condition(input: &str) -> IResult<&str, Condition> {
    let (input, first) = condition_and(input)?;
    let (input, rest) = opt(preceded(ws(keyword("OR")), condition))(input)?;

    match rest {
        Some(right) => Ok((input, Condition::Or(Box::new(first), Box::new(right)))),
        None => Ok((input, first)),
    }
}

/// `expr [ASC|DESC]`, ascending by default.
pub fn order_item(input: &str) -> IResult<&str, (Expr, bool)> {
    pair(
        expr,
        map(
            opt(ws(alt((value(true, keyword("ASC")), value(false, keyword("DESC")))))),
            |dir| dir.unwrap_or(true),
        ),
    )(input)
}
