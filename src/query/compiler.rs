use super::ast::{
    BoolOp, ClosedRange, Condition, Expr, Fragment, FreeCondition, OpenRange, Query, RangeOp,
    SubExpr, SubQuery, Term, Value,
};
use super::error::QueryError;
use crate::event::{FieldPath, FieldValue, LogEntry, MESSAGE_FIELD};
use regex::{Regex, RegexBuilder};
use std::fmt;

type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Predicate over a whole entry
type QueryFn = Predicate<LogEntry>;

/// Predicate over a single resolved field value
type ExprFn = Predicate<FieldValue>;

/// A compiled query, ready to be applied to any number of entries
/// from any number of threads.
pub struct Filter {
    source: String,
    predicate: QueryFn,
}

impl Filter {
    /// Compile a parsed query. The tree is walked exactly once.
    pub fn from_ast(ast: &Query) -> Result<Self, QueryError> {
        let predicate = new_query(ast)?;
        let source = ast.to_string();
        log::debug!("compiled query: {source}");
        Ok(Self { source, predicate })
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        (self.predicate)(entry)
    }

    /// Normalized text of the compiled query
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").field("source", &self.source).finish()
    }
}

/// Where a value is matched: against a named field or against `message` as free text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Field,
    FreeText,
}

fn chain<T: 'static>(lhs: Predicate<T>, op: BoolOp, rhs: Predicate<T>) -> Predicate<T> {
    match op {
        BoolOp::And => Box::new(move |v: &T| lhs(v) && rhs(v)),
        BoolOp::Or => Box::new(move |v: &T| lhs(v) || rhs(v)),
    }
}

fn negate_if<T: 'static>(exclusion: bool, arg: Predicate<T>) -> Predicate<T> {
    if exclusion {
        Box::new(move |v: &T| !arg(v))
    } else {
        arg
    }
}

// ---

fn new_query(ast: &Query) -> Result<QueryFn, QueryError> {
    let mut query = new_term(&ast.first)?;
    for (op, term) in &ast.rest {
        query = chain(query, *op, new_term(term)?);
    }
    Ok(query)
}

fn new_term(ast: &Term) -> Result<QueryFn, QueryError> {
    match ast {
        Term::SubQuery(sub) => new_sub_query(sub),
        Term::Condition(cond) => new_condition(cond),
        Term::FreeCondition(cond) => new_free_condition(cond),
    }
}

fn new_sub_query(ast: &SubQuery) -> Result<QueryFn, QueryError> {
    Ok(negate_if(ast.exclusion, new_query(&ast.query)?))
}

fn new_condition(ast: &Condition) -> Result<QueryFn, QueryError> {
    let path = FieldPath::parse(&ast.field_name);
    let rhs = new_expr(&ast.value, Context::Field)?;
    let query: QueryFn = Box::new(move |e: &LogEntry| e.resolve(&path).is_some_and(|v| rhs(v)));
    Ok(negate_if(ast.exclusion, query))
}

fn new_free_condition(ast: &FreeCondition) -> Result<QueryFn, QueryError> {
    let path = FieldPath::parse(MESSAGE_FIELD);
    let rhs = new_expr(&ast.value, Context::FreeText)?;
    let query: QueryFn = Box::new(move |e: &LogEntry| e.resolve(&path).is_some_and(|v| rhs(v)));
    Ok(negate_if(ast.exclusion, query))
}

fn new_expr(ast: &Expr, ctx: Context) -> Result<ExprFn, QueryError> {
    match ast {
        Expr::Value(value) => new_value(value, ctx),
        Expr::SubExpr(sub) => new_sub_expr(sub, ctx),
    }
}

fn new_sub_expr(ast: &SubExpr, ctx: Context) -> Result<ExprFn, QueryError> {
    let mut expr = new_expr(&ast.first, ctx)?;
    for (op, rhs) in &ast.rest {
        expr = chain(expr, *op, new_expr(rhs, ctx)?);
    }
    Ok(expr)
}

fn new_value(ast: &Value, ctx: Context) -> Result<ExprFn, QueryError> {
    match ast {
        Value::StringLit(fragments) => new_string_lit(fragments, ctx),
        Value::String(s) => new_string(Pattern::from_word(s), ctx),
        Value::OpenRange(range) => Ok(new_open_range(*range)),
        Value::ClosedRange(range) => Ok(new_closed_range(*range)),
    }
}

fn new_string_lit(fragments: &[Fragment], ctx: Context) -> Result<ExprFn, QueryError> {
    match ctx {
        // Raw `*` in a quoted free-text literal stands for a single space.
        // Kept for compatibility with existing monitor definitions.
        Context::FreeText => new_string(Pattern::from_fragments(fragments, Some(' ')), ctx),
        Context::Field => {
            let pattern = Pattern::from_fragments(fragments, None);
            if pattern.has_wildcard() {
                return new_string(pattern, ctx);
            }
            let rhs = fold_case(&pattern.literal());
            Ok(Box::new(move |v: &FieldValue| match v {
                FieldValue::Text(lhs) => fold_case(lhs) == rhs,
                _ => false,
            }))
        }
    }
}

/// Per-character lowercasing, applied identically to both sides of a comparison
fn fold_case(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

fn new_string(pattern: Pattern, ctx: Context) -> Result<ExprFn, QueryError> {
    if ctx == Context::Field && !pattern.has_wildcard() {
        let rhs = pattern.literal();
        return Ok(Box::new(move |v: &FieldValue| {
            v.as_text().is_some_and(|lhs| lhs == rhs)
        }));
    }

    let rhs = pattern.to_regex(ctx)?;
    Ok(Box::new(move |v: &FieldValue| {
        v.as_text().is_some_and(|lhs| rhs.is_match(lhs))
    }))
}

fn new_open_range(ast: OpenRange) -> ExprFn {
    let OpenRange { op, bound } = ast;
    Box::new(move |v: &FieldValue| {
        let Some(lhs) = v.as_number() else {
            return false;
        };
        match op {
            RangeOp::Lt => lhs < bound,
            RangeOp::Le => lhs <= bound,
            RangeOp::Gt => lhs > bound,
            RangeOp::Ge => lhs >= bound,
        }
    })
}

fn new_closed_range(ast: ClosedRange) -> ExprFn {
    let ClosedRange { min, max } = ast;
    Box::new(move |v: &FieldValue| v.as_number().is_some_and(|lhs| min <= lhs && lhs <= max))
}

// ---

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Wildcard,
}

/// String value split into literal runs and `*` wildcards
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Pattern {
    pieces: Vec<Piece>,
}

impl Pattern {
    /// Every `*` in a bare word is a wildcard
    fn from_word(s: &str) -> Self {
        let mut pattern = Self::default();
        for (i, part) in s.split('*').enumerate() {
            if i > 0 {
                pattern.pieces.push(Piece::Wildcard);
            }
            pattern.push_literal(part);
        }
        pattern
    }

    /// Raw `*` characters of a quoted literal are wildcards unless `star`
    /// gives a replacement; escaped characters are always literal.
    fn from_fragments(fragments: &[Fragment], star: Option<char>) -> Self {
        let mut pattern = Self::default();
        for fragment in fragments {
            match fragment {
                Fragment::Escaped(c) => pattern.push_literal(c.encode_utf8(&mut [0; 4])),
                Fragment::Chars(s) => match star {
                    Some(replacement) => pattern.push_literal(&s.replace('*', &replacement.to_string())),
                    None => {
                        let word = Self::from_word(s);
                        for piece in word.pieces {
                            match piece {
                                Piece::Literal(lit) => pattern.push_literal(&lit),
                                Piece::Wildcard => pattern.pieces.push(Piece::Wildcard),
                            }
                        }
                    }
                },
            }
        }
        pattern
    }

    fn push_literal(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        match self.pieces.last_mut() {
            Some(Piece::Literal(lit)) => lit.push_str(s),
            _ => self.pieces.push(Piece::Literal(s.to_string())),
        }
    }

    fn has_wildcard(&self) -> bool {
        self.pieces.contains(&Piece::Wildcard)
    }

    fn literal(&self) -> String {
        self.pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Literal(lit) => Some(lit.as_str()),
                Piece::Wildcard => None,
            })
            .collect()
    }

    /// Field context: case-sensitive and anchored at both ends.
    /// Free text: case-insensitive substring search.
    fn to_regex(&self, ctx: Context) -> Result<Regex, QueryError> {
        let body: String = self
            .pieces
            .iter()
            .map(|p| match p {
                Piece::Literal(lit) => regex::escape(lit),
                Piece::Wildcard => ".*".to_string(),
            })
            .collect();
        let source = match ctx {
            Context::Field => format!("^{body}$"),
            Context::FreeText => body,
        };
        RegexBuilder::new(&source)
            .case_insensitive(ctx == Context::FreeText)
            .build()
            .map_err(|e| QueryError::InvalidPattern {
                pattern: source.clone(),
                message: e.to_string(),
            })
    }
}

/// Parse and compile query text in one step
pub fn compile(input: &str) -> Result<Filter, QueryError> {
    let ast = super::parse(input)?;
    Filter::from_ast(&ast)
}
