use super::ast::{
    BoolOp, ClosedRange, Condition, Expr, FieldPrefix, Fragment, FreeCondition, OpenRange, Query,
    RangeOp, SubExpr, SubQuery, Term, Value,
};
use super::error::QueryError;
use super::lexer::{Token, TokenKind, tokenize};

/// Parse query text into a syntax tree.
///
/// The grammar, in EBNF:
///
/// ```text
/// Query        := Term (BooleanOperator? Term)*
/// Term         := SubQuery | Condition | FreeCondition
/// SubQuery     := '-'? '(' Query ')'
/// Condition    := '-'? FieldPrefix? Ident ':' Expr
/// FreeCondition:= '-'? Expr
/// Expr         := Value | '(' Expr (BooleanOperator Expr)* ')'
/// Value        := QuotedString | Ident | RangeOperator Number | '[' Number 'TO' Number ']'
/// ```
pub fn parse(input: &str) -> Result<Query, QueryError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        end: input.len(),
    };
    let query = parser.parse_query()?;
    match parser.peek(0) {
        None => Ok(query),
        Some(token) => Err(QueryError::UnexpectedToken {
            position: token.span.start,
            found: token.to_string(),
            expected: "end of query",
        }),
    }
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    end: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self, offset: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &'static str) -> QueryError {
        match self.peek(0) {
            Some(token) => QueryError::UnexpectedToken {
                position: token.span.start,
                found: token.to_string(),
                expected,
            },
            None => QueryError::UnexpectedToken {
                position: self.end,
                found: "end of query".to_string(),
                expected,
            },
        }
    }

    fn expect_punct(&mut self, text: &str, expected: &'static str) -> Result<(), QueryError> {
        match self.peek(0) {
            Some(token) if token.is_punct(text) => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn peek_is_punct(&self, offset: usize, text: &str) -> bool {
        self.peek(offset).is_some_and(|t| t.is_punct(text))
    }

    fn peek_kind(&self, offset: usize) -> Option<TokenKind> {
        self.peek(offset).map(|t| t.kind)
    }

    fn boolean_operator(&mut self) -> Option<BoolOp> {
        let token = self.peek(0).filter(|t| t.kind == TokenKind::BooleanOperator)?;
        self.pos += 1;
        match token.text.as_str() {
            "OR" => Some(BoolOp::Or),
            _ => Some(BoolOp::And),
        }
    }

    fn exclusion(&mut self) -> bool {
        let excluded = self.peek_is_punct(0, "-");
        if excluded {
            self.pos += 1;
        }
        excluded
    }

    fn parse_query(&mut self) -> Result<Query, QueryError> {
        let first = self.parse_term()?;
        let mut rest = Vec::new();
        while self.peek(0).is_some() && !self.peek_is_punct(0, ")") {
            let op = self.boolean_operator().unwrap_or(BoolOp::And);
            rest.push((op, self.parse_term()?));
        }
        Ok(Query { first, rest })
    }

    fn parse_term(&mut self) -> Result<Term, QueryError> {
        let negated = usize::from(self.peek_is_punct(0, "-"));

        if self.peek_is_punct(negated, "(") {
            let exclusion = self.exclusion();
            self.pos += 1;
            let query = self.parse_query()?;
            self.expect_punct(")", "')' closing the sub-query")?;
            return Ok(Term::SubQuery(SubQuery {
                exclusion,
                query: Box::new(query),
            }));
        }

        let prefixed = negated + usize::from(self.peek_kind(negated) == Some(TokenKind::FieldPrefix));
        if self.peek_kind(prefixed) == Some(TokenKind::Ident) && self.peek_is_punct(prefixed + 1, ":") {
            let exclusion = self.exclusion();
            let field_prefix = self.field_prefix();
            let field_name = self.advance().map(|t| t.text.clone()).unwrap_or_default();
            self.pos += 1;
            let value = self.parse_expr()?;
            return Ok(Term::Condition(Condition {
                exclusion,
                field_prefix,
                field_name,
                value,
            }));
        }

        let exclusion = self.exclusion();
        let value = self.parse_expr()?;
        Ok(Term::FreeCondition(FreeCondition { exclusion, value }))
    }

    fn field_prefix(&mut self) -> Option<FieldPrefix> {
        let token = self.peek(0).filter(|t| t.kind == TokenKind::FieldPrefix)?;
        self.pos += 1;
        match token.text.as_str() {
            "@" => Some(FieldPrefix::At),
            _ => Some(FieldPrefix::Hash),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, QueryError> {
        if !self.peek_is_punct(0, "(") {
            return self.parse_value().map(Expr::Value);
        }

        self.pos += 1;
        let first = self.parse_expr()?;
        let mut rest = Vec::new();
        while let Some(op) = self.boolean_operator() {
            rest.push((op, self.parse_expr()?));
        }
        self.expect_punct(")", "boolean operator or ')' closing the expression")?;
        Ok(Expr::SubExpr(SubExpr {
            first: Box::new(first),
            rest,
        }))
    }

    fn parse_value(&mut self) -> Result<Value, QueryError> {
        let Some(token) = self.peek(0) else {
            return Err(self.unexpected("a value"));
        };

        match token.kind {
            TokenKind::SingleQuote | TokenKind::DoubleQuote => {
                self.pos += 1;
                self.parse_string_fragments(token.kind).map(Value::StringLit)
            }
            TokenKind::Ident => {
                self.pos += 1;
                Ok(Value::String(token.text.clone()))
            }
            TokenKind::RangeOperator => {
                self.pos += 1;
                let op = RangeOp::from_symbol(&token.text).ok_or_else(|| self.unexpected("a range operator"))?;
                let bound = self.parse_number()?;
                Ok(Value::OpenRange(OpenRange { op, bound }))
            }
            TokenKind::Punct if token.text == "[" => {
                self.pos += 1;
                let min = self.parse_number()?;
                match self.peek(0) {
                    Some(t) if t.is(TokenKind::Ident, "TO") => self.pos += 1,
                    _ => return Err(self.unexpected("'TO'")),
                }
                let max = self.parse_number()?;
                self.expect_punct("]", "']' closing the range")?;
                Ok(Value::ClosedRange(ClosedRange { min, max }))
            }
            TokenKind::Punct if token.text == "-" => match self.peek(1) {
                // `-` directly followed by a word in value position is part of the word
                Some(next) if next.kind == TokenKind::Ident && next.span.start == token.span.end => {
                    self.pos += 2;
                    Ok(Value::String(format!("-{}", next.text)))
                }
                _ => Err(self.unexpected("a value")),
            },
            _ => Err(self.unexpected("a value")),
        }
    }

    fn parse_string_fragments(&mut self, quote: TokenKind) -> Result<Vec<Fragment>, QueryError> {
        let mut fragments = Vec::new();
        loop {
            let Some(token) = self.advance() else {
                return Err(self.unexpected("closing quote"));
            };
            match token.kind {
                kind if kind == quote => return Ok(fragments),
                TokenKind::EscapedChar => {
                    if let Some(c) = token.text.chars().nth(1) {
                        fragments.push(Fragment::Escaped(c));
                    }
                }
                TokenKind::StringChars => fragments.push(Fragment::Chars(token.text.clone())),
                _ => {
                    self.pos -= 1;
                    return Err(self.unexpected("closing quote"));
                }
            }
        }
    }

    fn parse_number(&mut self) -> Result<f64, QueryError> {
        match self.peek(0) {
            Some(token) if token.kind == TokenKind::Ident => {
                self.pos += 1;
                token
                    .text
                    .parse::<f64>()
                    .map_err(|_| QueryError::InvalidNumber {
                        position: token.span.start,
                        text: token.text.clone(),
                    })
            }
            _ => Err(self.unexpected("a number")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free(value: Value) -> Term {
        Term::FreeCondition(FreeCondition {
            exclusion: false,
            value: Expr::Value(value),
        })
    }

    fn word(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[test]
    fn test_parse_condition_with_prefix_and_exclusion() {
        let query = parse("-@kubernetes.pod:egress*").unwrap();
        assert_eq!(
            query.first,
            Term::Condition(Condition {
                exclusion: true,
                field_prefix: Some(FieldPrefix::At),
                field_name: "kubernetes.pod".to_string(),
                value: Expr::Value(word("egress*")),
            })
        );
        assert!(query.rest.is_empty());
    }

    #[test]
    fn test_juxtaposed_terms_default_to_and() {
        let query = parse("alpha beta OR gamma").unwrap();
        assert_eq!(query.first, free(word("alpha")));
        assert_eq!(
            query.rest,
            vec![(BoolOp::And, free(word("beta"))), (BoolOp::Or, free(word("gamma")))]
        );
    }

    #[test]
    fn test_condition_with_sub_expression() {
        let query = parse("service:(a or b)").unwrap();
        let Term::Condition(cond) = query.first else {
            panic!("expected a condition");
        };
        assert_eq!(
            cond.value,
            Expr::SubExpr(SubExpr {
                first: Box::new(Expr::Value(word("a"))),
                rest: vec![(BoolOp::Or, Expr::Value(word("b")))],
            })
        );
    }

    #[test]
    fn test_sub_query_takes_precedence() {
        let query = parse("-(env:prod timeout)").unwrap();
        let Term::SubQuery(sub) = query.first else {
            panic!("expected a sub-query");
        };
        assert!(sub.exclusion);
        assert_eq!(sub.query.rest.len(), 1);
    }

    #[test]
    fn test_quoted_fragments() {
        let query = parse(r#""a\*b*""#).unwrap();
        assert_eq!(
            query.first,
            free(Value::StringLit(vec![
                Fragment::Chars("a".to_string()),
                Fragment::Escaped('*'),
                Fragment::Chars("b*".to_string()),
            ]))
        );
    }

    #[test]
    fn test_ranges() {
        let query = parse("status:>=500 latency:[0.5 TO 2]").unwrap();
        let Term::Condition(status) = query.first else {
            panic!("expected a condition");
        };
        assert_eq!(
            status.value,
            Expr::Value(Value::OpenRange(OpenRange {
                op: RangeOp::Ge,
                bound: 500.0
            }))
        );
        let Term::Condition(latency) = &query.rest[0].1 else {
            panic!("expected a condition");
        };
        assert_eq!(
            latency.value,
            Expr::Value(Value::ClosedRange(ClosedRange { min: 0.5, max: 2.0 }))
        );
    }

    #[test]
    fn test_glued_minus_in_value_position() {
        let query = parse("delta:-foo").unwrap();
        let Term::Condition(cond) = query.first else {
            panic!("expected a condition");
        };
        assert_eq!(cond.value, Expr::Value(word("-foo")));
    }

    #[test]
    fn test_invalid_range_bound() {
        assert_eq!(
            parse("status:>abc"),
            Err(QueryError::InvalidNumber {
                position: 8,
                text: "abc".to_string()
            })
        );
    }

    #[test]
    fn test_missing_field_name() {
        let err = parse(":value").unwrap_err();
        assert_eq!(err.position(), Some(0));
    }

    #[test]
    fn test_sub_expression_requires_operator() {
        assert!(parse("service:(a b)").is_err());
    }

    #[test]
    fn test_unbalanced_parentheses() {
        assert!(parse("(a OR b").is_err());
        assert!(parse("a OR b)").is_err());
    }

    #[test]
    fn test_display_normalizes_operators() {
        let query = parse("service:(a or b) env:production -'no stream'").unwrap();
        assert_eq!(
            query.to_string(),
            r#"service:(a OR b) AND env:production AND -"no stream""#
        );
    }
}
