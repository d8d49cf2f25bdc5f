//! Syntax tree produced by the query parser.
//!
//! Every alternative is a closed enum so the compiler can match exhaustively.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolOp::And => write!(f, "AND"),
            BoolOp::Or => write!(f, "OR"),
        }
    }
}

/// A chain of terms evaluated strictly left to right
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub first: Term,
    /// Juxtaposed terms are stored with an implicit [`BoolOp::And`]
    pub rest: Vec<(BoolOp, Term)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    SubQuery(SubQuery),
    Condition(Condition),
    FreeCondition(FreeCondition),
}

/// `-( ... )`
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    pub exclusion: bool,
    pub query: Box<Query>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPrefix {
    At,
    Hash,
}

/// `-@field.path:expr`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub exclusion: bool,
    pub field_prefix: Option<FieldPrefix>,
    pub field_name: String,
    pub value: Expr,
}

/// A bare expression matched against the `message` field
#[derive(Debug, Clone, PartialEq)]
pub struct FreeCondition {
    pub exclusion: bool,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Value(Value),
    SubExpr(SubExpr),
}

/// `( expr OP expr ... )`, same left-to-right chain as [`Query`]
#[derive(Debug, Clone, PartialEq)]
pub struct SubExpr {
    pub first: Box<Expr>,
    pub rest: Vec<(BoolOp, Expr)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    StringLit(Vec<Fragment>),
    String(String),
    OpenRange(OpenRange),
    ClosedRange(ClosedRange),
}

/// Piece of a quoted literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Character that followed a backslash
    Escaped(char),
    Chars(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl RangeOp {
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "<" => Some(RangeOp::Lt),
            "<=" => Some(RangeOp::Le),
            ">" => Some(RangeOp::Gt),
            ">=" => Some(RangeOp::Ge),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            RangeOp::Lt => "<",
            RangeOp::Le => "<=",
            RangeOp::Gt => ">",
            RangeOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenRange {
    pub op: RangeOp,
    pub bound: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedRange {
    pub min: f64,
    pub max: f64,
}

fn exclusion(f: &mut fmt::Formatter<'_>, excluded: bool) -> fmt::Result {
    if excluded { write!(f, "-") } else { Ok(()) }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        for (op, term) in &self.rest {
            write!(f, " {op} {term}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::SubQuery(sub) => {
                exclusion(f, sub.exclusion)?;
                write!(f, "({})", sub.query)
            }
            Term::Condition(cond) => {
                exclusion(f, cond.exclusion)?;
                match cond.field_prefix {
                    Some(FieldPrefix::At) => write!(f, "@")?,
                    Some(FieldPrefix::Hash) => write!(f, "#")?,
                    None => {}
                }
                write!(f, "{}:{}", cond.field_name, cond.value)
            }
            Term::FreeCondition(cond) => {
                exclusion(f, cond.exclusion)?;
                write!(f, "{}", cond.value)
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Value(value) => write!(f, "{value}"),
            Expr::SubExpr(sub) => {
                write!(f, "({}", sub.first)?;
                for (op, expr) in &sub.rest {
                    write!(f, " {op} {expr}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::StringLit(fragments) => {
                write!(f, "\"")?;
                for fragment in fragments {
                    match fragment {
                        Fragment::Escaped(c) => write!(f, "\\{c}")?,
                        Fragment::Chars(s) => write!(f, "{}", s.replace('"', "\\\""))?,
                    }
                }
                write!(f, "\"")
            }
            Value::String(s) => write!(f, "{s}"),
            Value::OpenRange(range) => write!(f, "{}{}", range.op.symbol(), range.bound),
            Value::ClosedRange(range) => write!(f, "[{} TO {}]", range.min, range.max),
        }
    }
}
