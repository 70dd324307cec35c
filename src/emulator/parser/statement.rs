use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{Params, Value, WarehouseType};
use crate::emulator::WarehouseError;

/// SQL identifier. Unquoted identifiers are case-insensitive and stored
/// upper-cased; quoted ones keep their exact spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub value: String,
    pub quoted: bool,
}

impl Ident {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: false,
        }
    }

    pub fn quoted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: true,
        }
    }

    /// Name as stored in the catalog.
    #[must_use]
    pub fn normalized(&self) -> String {
        if self.quoted {
            self.value.clone()
        } else {
            self.value.to_uppercase()
        }
    }
}

/// Possibly qualified object name: `table`, `schema.table` or
/// `database.schema.table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName(pub Vec<Ident>);

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(Ident::normalized).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Bind variable: `?`, `:1` or `:name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    Next,
    Index(usize),
    Named(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunction {
    Lower,
    Upper,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Column(Ident),
    Placeholder(Placeholder),
    Function { name: ScalarFunction, arg: Box<Expr> },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(Value::Text(s)) => write!(f, "'{s}'"),
            Self::Literal(v) => write!(f, "{v}"),
            Self::Column(ident) => write!(f, "{}", ident.normalized()),
            Self::Placeholder(Placeholder::Next) => write!(f, "?"),
            Self::Placeholder(Placeholder::Index(n)) => write!(f, ":{n}"),
            Self::Placeholder(Placeholder::Named(name)) => write!(f, ":{name}"),
            Self::Function { name: ScalarFunction::Lower, arg } => write!(f, "LOWER({arg})"),
            Self::Function { name: ScalarFunction::Upper, arg } => write!(f, "UPPER({arg})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare { left: Expr, op: CompareOp, right: Expr },
    IsNull(Expr),
    IsNotNull(Expr),
    In(Expr, Vec<Expr>),
    Like(Expr, Expr),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard,
    Expr { expr: Expr, alias: Option<Ident> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: Ident,
    pub data_type: WarehouseType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Privilege {
    Select,
    Insert,
    Update,
    Delete,
    All,
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::All => write!(f, "ALL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable {
        name: ObjectName,
        columns: Vec<ColumnDef>,
        or_replace: bool,
        if_not_exists: bool,
    },
    DropTable {
        name: ObjectName,
        if_exists: bool,
    },
    Insert {
        table: ObjectName,
        columns: Option<Vec<Ident>>,
        rows: Vec<Vec<Expr>>,
    },
    Select {
        items: Vec<SelectItem>,
        from: Option<ObjectName>,
        filter: Option<Condition>,
        order_by: Vec<OrderBy>,
        limit: Option<usize>,
    },
    Grant {
        privilege: Privilege,
        table: ObjectName,
        role: Ident,
    },
}

impl Statement {
    /// Replaces every bind variable with its value from `params`. `?`
    /// markers take positional values in the order they appear.
    pub fn bind(self, params: &Params) -> Result<Self, WarehouseError> {
        let mut binder = Binder { params, next: 0 };
        match self {
            Self::Insert { table, columns, rows } => {
                let rows = rows
                    .into_iter()
                    .map(|row| row.into_iter().map(|e| binder.expr(e)).collect())
                    .collect::<Result<Vec<Vec<Expr>>, _>>()?;
                Ok(Self::Insert { table, columns, rows })
            }
            Self::Select {
                items,
                from,
                filter,
                order_by,
                limit,
            } => {
                let items = items
                    .into_iter()
                    .map(|item| match item {
                        SelectItem::Expr { expr, alias } => Ok(SelectItem::Expr {
                            expr: binder.expr(expr)?,
                            alias,
                        }),
                        SelectItem::Wildcard => Ok(SelectItem::Wildcard),
                    })
                    .collect::<Result<Vec<_>, WarehouseError>>()?;
                let filter = filter.map(|c| binder.condition(c)).transpose()?;
                let order_by = order_by
                    .into_iter()
                    .map(|o| {
                        Ok(OrderBy {
                            expr: binder.expr(o.expr)?,
                            ascending: o.ascending,
                        })
                    })
                    .collect::<Result<Vec<_>, WarehouseError>>()?;
                Ok(Self::Select {
                    items,
                    from,
                    filter,
                    order_by,
                    limit,
                })
            }
            other => Ok(other),
        }
    }
}

struct Binder<'a> {
    params: &'a Params,
    next: usize,
}

impl Binder<'_> {
    fn expr(&mut self, expr: Expr) -> Result<Expr, WarehouseError> {
        match expr {
            Expr::Placeholder(placeholder) => self.resolve(&placeholder).map(Expr::Literal),
            Expr::Function { name, arg } => Ok(Expr::Function {
                name,
                arg: Box::new(self.expr(*arg)?),
            }),
            other => Ok(other),
        }
    }

    fn condition(&mut self, condition: Condition) -> Result<Condition, WarehouseError> {
        Ok(match condition {
            Condition::Compare { left, op, right } => Condition::Compare {
                left: self.expr(left)?,
                op,
                right: self.expr(right)?,
            },
            Condition::IsNull(e) => Condition::IsNull(self.expr(e)?),
            Condition::IsNotNull(e) => Condition::IsNotNull(self.expr(e)?),
            Condition::In(e, list) => {
                let e = self.expr(e)?;
                let list = list
                    .into_iter()
                    .map(|item| self.expr(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Condition::In(e, list)
            }
            Condition::Like(e, pattern) => Condition::Like(self.expr(e)?, self.expr(pattern)?),
            Condition::And(l, r) => Condition::And(Box::new(self.condition(*l)?), Box::new(self.condition(*r)?)),
            Condition::Or(l, r) => Condition::Or(Box::new(self.condition(*l)?), Box::new(self.condition(*r)?)),
        })
    }

    fn resolve(&mut self, placeholder: &Placeholder) -> Result<Value, WarehouseError> {
        let value = match placeholder {
            Placeholder::Next => {
                self.next += 1;
                self.params
                    .get_positional(self.next - 1)
                    .ok_or_else(|| WarehouseError::MissingBind(format!("#{}", self.next)))?
            }
            Placeholder::Index(n) => self
                .params
                .get_positional(n.saturating_sub(1))
                .ok_or_else(|| WarehouseError::MissingBind(format!(":{n}")))?,
            Placeholder::Named(name) => self
                .params
                .get_named(name)
                .ok_or_else(|| WarehouseError::MissingBind(format!(":{name}")))?,
        };
        Ok(value.clone())
    }
}
