use nom::{
    branch::alt,
    character::complete::char,
    combinator::{map, opt, value},
    multi::separated_list1,
    sequence::{delimited, pair, tuple},
    IResult,
};

use super::common::{data_type, ident, keyword, object_name, ws};
use super::statement::{ColumnDef, Privilege, Statement};

fn column_def(input: &str) -> IResult<&str, ColumnDef> {
    map(pair(ws(ident), ws(data_type)), |(name, data_type)| ColumnDef { name, data_type })(input)
}

// CREATE [OR REPLACE] TABLE [IF NOT EXISTS] name (col TYPE, ...)
pub fn create_table(input: &str) -> IResult<&str, Statement> {
    let (input, _) = ws(keyword("CREATE"))(input)?;
    let (input, or_replace) = opt(pair(ws(keyword("OR")), ws(keyword("REPLACE"))))(input)?;
    let (input, _) = ws(keyword("TABLE"))(input)?;
    let (input, if_not_exists) = opt(tuple((
        ws(keyword("IF")),
        ws(keyword("NOT")),
        ws(keyword("EXISTS")),
    )))(input)?;
    let (input, name) = ws(object_name)(input)?;
    let (input, columns) = delimited(
        ws(char('(')),
        separated_list1(ws(char(',')), column_def),
        ws(char(')')),
    )(input)?;

    Ok((
        input,
        Statement::CreateTable {
            name,
            columns,
            or_replace: or_replace.is_some(),
            if_not_exists: if_not_exists.is_some(),
        },
    ))
}

// DROP TABLE [IF EXISTS] name
pub fn drop_table(input: &str) -> IResult<&str, Statement> {
    let (input, _) = pair(ws(keyword("DROP")), ws(keyword("TABLE")))(input)?;
    let (input, if_exists) = opt(pair(ws(keyword("IF")), ws(keyword("EXISTS"))))(input)?;
    let (input, name) = ws(object_name)(input)?;

    Ok((
        input,
        Statement::DropTable {
            name,
            if_exists: if_exists.is_some(),
        },
    ))
}

fn privilege(input: &str) -> IResult<&str, Privilege> {
    ws(alt((
        value(
            Privilege::All,
            pair(keyword("ALL"), opt(ws(keyword("PRIVILEGES")))),
        ),
        value(Privilege::Select, keyword("SELECT")),
        value(Privilege::Insert, keyword("INSERT")),
        value(Privilege::Update, keyword("UPDATE")),
        value(Privilege::Delete, keyword("DELETE")),
    )))(input)
}

// GRANT privilege ON [TABLE] name TO ROLE role
pub fn grant(input: &str) -> IResult<&str, Statement> {
    let (input, _) = ws(keyword("GRANT"))(input)?;
    let (input, privilege) = privilege(input)?;
    let (input, _) = ws(keyword("ON"))(input)?;
    let (input, _) = opt(ws(keyword("TABLE")))(input)?;
    let (input, table) = ws(object_name)(input)?;
    let (input, _) = pair(ws(keyword("TO")), ws(keyword("ROLE")))(input)?;
    let (input, role) = ws(ident)(input)?;

    Ok((input, Statement::Grant { privilege, table, role }))
}
