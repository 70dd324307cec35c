use nom::{
    branch::alt,
    character::complete::{char, digit1},
    combinator::{map, map_res, opt},
    multi::separated_list1,
    sequence::{delimited, pair, preceded},
    IResult,
};

use super::common::{ident, keyword, object_name, ws};
use super::expr::{condition, expr, order_item};
use super::statement::{OrderBy, SelectItem, Statement};

fn select_item(input: &str) -> IResult<&str, SelectItem> {
    alt((
        map(ws(char('*')), |_| SelectItem::Wildcard),
        map(
            pair(expr, opt(preceded(ws(keyword("AS")), ws(ident)))),
            |(expr, alias)| SelectItem::Expr { expr, alias },
        ),
    ))(input)
}

// SELECT items [FROM name] [WHERE cond] [ORDER BY expr [ASC|DESC], ...] [LIMIT n]
pub fn select(input: &str) -> IResult<&str, Statement> {
    let (input, _) = ws(keyword("SELECT"))(input)?;
    let (input, items) = separated_list1(ws(char(',')), select_item)(input)?;
    let (input, from) = opt(preceded(ws(keyword("FROM")), ws(object_name)))(input)?;
    let (input, filter) = opt(preceded(ws(keyword("WHERE")), condition))(input)?;
    let (input, order_by) = opt(preceded(
        pair(ws(keyword("ORDER")), ws(keyword("BY"))),
        separated_list1(ws(char(',')), order_item),
    ))(input)?;
    let (input, limit) = opt(preceded(
        ws(keyword("LIMIT")),
        ws(map_res(digit1, str::parse::<usize>)),
    ))(input)?;

    let order_by = order_by
        .unwrap_or_default()
        .into_iter()
        .map(|(expr, ascending)| OrderBy { expr, ascending })
        .collect();

    Ok((
        input,
        Statement::Select {
            items,
            from,
            filter,
            order_by,
            limit,
        },
    ))
}

// INSERT INTO name [(cols)] VALUES (exprs), (exprs), ...
pub fn insert(input: &str) -> IResult<&str, Statement> {
    let (input, _) = pair(ws(keyword("INSERT")), ws(keyword("INTO")))(input)?;
    let (input, table) = ws(object_name)(input)?;
    let (input, columns) = opt(delimited(
        ws(char('(')),
        separated_list1(ws(char(',')), ws(ident)),
        ws(char(')')),
    ))(input)?;
    let (input, _) = ws(keyword("VALUES"))(input)?;
    let (input, rows) = separated_list1(
        ws(char(',')),
        delimited(
            ws(char('(')),
            separated_list1(ws(char(',')), expr),
            ws(char(')')),
        ),
    )(input)?;

    Ok((input, Statement::Insert { table, columns, rows }))
}
