use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while},
    character::complete::{alpha1, char, digit1, multispace0, satisfy},
    combinator::{map, map_res, not, opt, recognize, value, verify},
    error::{Error, ErrorKind},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use rust_decimal::Decimal;

use crate::core::{Value, WarehouseType};
use super::statement::{Ident, ObjectName, Placeholder};

/// Words that end an expression and therefore cannot be bare identifiers.
const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "ORDER", "LIMIT", "AND", "OR", "NOT", "NULL", "IS", "IN", "LIKE",
    "AS", "ASC", "DESC", "VALUES", "ON", "TO", "TRUE", "FALSE",
];

pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Case-insensitive keyword that is not the prefix of a longer word.
pub fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(
        tag_no_case(word),
        not(satisfy(|c: char| c.is_alphanumeric() || c == '_')),
    )
}

fn bare_identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
        )),
        |s: &str| s.to_string(),
    )(input)
}

/// Text between two `quote` characters, a doubled quote standing for one.
fn quoted<'a>(quote: char) -> impl Fn(&'a str) -> IResult<&'a str, String> {
    move |input: &'a str| {
        let (mut rest, _) = char(quote)(input)?;
        let mut out = String::new();
        loop {
            let Some(idx) = rest.find(quote) else {
                return Err(nom::Err::Error(Error::new(rest, ErrorKind::Char)));
            };
            out.push_str(&rest[..idx]);
            let after = &rest[idx + quote.len_utf8()..];
            match after.strip_prefix(quote) {
                Some(tail) => {
                    out.push(quote);
                    rest = tail;
                }
                None => return Ok((after, out)),
            }
        }
    }
}

pub fn string_literal(input: &str) -> IResult<&str, String> {
    quoted('\'')(input)
}

pub fn ident(input: &str) -> IResult<&str, Ident> {
    alt((
        map(quoted('"'), Ident::quoted),
        map(
            verify(bare_identifier, |s: &String| {
                !RESERVED.contains(&s.to_uppercase().as_str())
            }),
            Ident::new,
        ),
    ))(input)
}

pub fn object_name(input: &str) -> IResult<&str, ObjectName> {
    map(
        verify(separated_list1(char('.'), ident), |parts: &Vec<Ident>| parts.len() <= 3),
        ObjectName,
    )(input)
}

pub fn number(input: &str) -> IResult<&str, Value> {
    alt((
        map_res(
            recognize(tuple((opt(char('-')), digit1, char('.'), digit1))),
            |s: &str| Decimal::from_str(s).map(Value::Decimal),
        ),
        map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
            s.parse::<i64>().map(Value::Integer)
        }),
    ))(input)
}

pub fn literal(input: &str) -> IResult<&str, Value> {
    alt((
        value(Value::Null, keyword("NULL")),
        value(Value::Boolean(true), keyword("TRUE")),
        value(Value::Boolean(false), keyword("FALSE")),
        map(string_literal, Value::Text),
        number,
    ))(input)
}

pub fn placeholder(input: &str) -> IResult<&str, Placeholder> {
    alt((
        value(Placeholder::Next, char('?')),
        map(
            preceded(
                char(':'),
                verify(map_res(digit1, str::parse::<usize>), |n: &usize| *n >= 1),
            ),
            Placeholder::Index,
        ),
        map(preceded(char(':'), bare_identifier), |name| {
            Placeholder::Named(name.to_lowercase())
        }),
    ))(input)
}

fn precision_scale(input: &str) -> IResult<&str, (u8, Option<u8>)> {
    delimited(
        ws(char('(')),
        pair(
            ws(map_res(digit1, str::parse::<u8>)),
            opt(preceded(ws(char(',')), ws(map_res(digit1, str::parse::<u8>)))),
        ),
        ws(char(')')),
    )(input)
}

pub fn data_type(input: &str) -> IResult<&str, WarehouseType> {
    // Split into two alt blocks due to nom's 21-element tuple limit
    alt((
        alt((
            map(
                pair(
                    alt((keyword("NUMBER"), keyword("NUMERIC"), keyword("DECIMAL"))),
                    opt(precision_scale),
                ),
                |(_, params)| match params {
                    Some((precision, scale)) => WarehouseType::Number {
                        precision,
                        scale: scale.unwrap_or(0),
                    },
                    None => WarehouseType::DEFAULT_NUMBER,
                },
            ),
            value(
                WarehouseType::Integer,
                alt((
                    keyword("INTEGER"),
                    keyword("INT"),
                    keyword("BIGINT"),
                    keyword("SMALLINT"),
                    keyword("TINYINT"),
                )),
            ),
            value(
                WarehouseType::Float,
                alt((
                    keyword("FLOAT"),
                    keyword("DOUBLE"),
                    keyword("REAL"),
                )),
            ),
            map(
                pair(
                    alt((
                        keyword("STRING"),
                        keyword("TEXT"),
                        keyword("VARCHAR"),
                        keyword("CHAR"),
                    )),
                    opt(precision_scale),
                ),
                |_| WarehouseType::String,
            ),
            value(WarehouseType::Boolean, keyword("BOOLEAN")),
        )),
        alt((
            value(
                WarehouseType::TimestampNtz,
                alt((
                    keyword("TIMESTAMP_NTZ"),
                    keyword("TIMESTAMP"),
                    keyword("DATETIME"),
                )),
            ),
            value(WarehouseType::Date, keyword("DATE")),
            value(WarehouseType::Time, keyword("TIME")),
            value(WarehouseType::Binary, keyword("BINARY")),
            value(WarehouseType::Array, keyword("ARRAY")),
            value(WarehouseType::Object, alt((keyword("OBJECT"), keyword("VARIANT")))),
        )),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_boundary() {
        assert!(keyword("INT")("INT)").is_ok());
        assert!(keyword("INT")("INTEGER").is_err());
        assert!(keyword("select")("SELECT *").is_ok());
    }

    #[test]
    fn test_string_literal_escapes() {
        assert_eq!(string_literal("'it''s'").unwrap().1, "it's");
        assert_eq!(string_literal("''").unwrap().1, "");
        assert!(string_literal("'open").is_err());
    }

    #[test]
    fn test_identifiers() {
        let (_, id) = ident("Consumer_ID").unwrap();
        assert_eq!(id.normalized(), "CONSUMER_ID");
        let (_, id) = ident("\"Mixed Case\"").unwrap();
        assert_eq!(id.normalized(), "Mixed Case");
        assert!(ident("FROM").is_err());
    }

    #[test]
    fn test_object_name() {
        let (_, name) = object_name("proddb.public.events").unwrap();
        assert_eq!(name.to_string(), "PRODDB.PUBLIC.EVENTS");
        assert!(object_name("a.b.c.d").is_err());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholder("?").unwrap().1, Placeholder::Next);
        assert_eq!(placeholder(":2").unwrap().1, Placeholder::Index(2));
        assert_eq!(placeholder(":UserName").unwrap().1, Placeholder::Named("username".into()));
        assert!(placeholder(":0").is_err());
    }

    #[test]
    fn test_data_types() {
        assert_eq!(data_type("NUMBER(10,2)").unwrap().1, WarehouseType::Number { precision: 10, scale: 2 });
        assert_eq!(data_type("NUMBER").unwrap().1, WarehouseType::DEFAULT_NUMBER);
        assert_eq!(data_type("VARCHAR(255)").unwrap().1, WarehouseType::String);
        assert_eq!(data_type("TIMESTAMP_NTZ").unwrap().1, WarehouseType::TimestampNtz);
        assert_eq!(data_type("TIME").unwrap().1, WarehouseType::Time);
        assert_eq!(data_type("INT").unwrap().1, WarehouseType::Integer);
    }
}
