use super::error::QueryError;
use std::fmt;

/// Kinds of lexical units produced by the [`Lexer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `AND` or `OR`, canonicalized to uppercase
    BooleanOperator,
    /// `<=`, `>=`, `<` or `>`
    RangeOperator,
    /// `@` or `#` in front of a field name
    FieldPrefix,
    SingleQuote,
    DoubleQuote,
    /// Bare word: alphanumerics plus punctuation common in hostnames, paths and log tokens
    Ident,
    /// Any other single punctuation character
    Punct,
    Eol,
    Whitespace,
    /// Backslash followed by one character, inside a quoted string
    EscapedChar,
    /// Run of raw characters inside a quoted string
    StringChars,
}

/// Byte range of a token in the query text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }

    pub fn is_punct(&self, text: &str) -> bool {
        self.is(TokenKind::Punct, text)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eol => write!(f, "end of line"),
            _ => write!(f, "'{}'", self.text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Root,
    SingleQuoteString { start: usize },
    DoubleQuoteString { start: usize },
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '@' | '#'
                | '$'
                | '%'
                | '^'
                | '&'
                | '*'
                | '+'
                | '_'
                | '-'
                | '='
                | '\''
                | '|'
                | ';'
                | '<'
                | ','
                | '>'
                | '.'
                | '?'
                | '`'
                | '~'
                | '\\'
                | '/'
        )
}

fn is_punct_char(c: char) -> bool {
    matches!(
        c,
        '-' | '['
            | ']'
            | '!'
            | '@'
            | '#'
            | '$'
            | '%'
            | '^'
            | '&'
            | '*'
            | '('
            | ')'
            | '+'
            | '_'
            | '='
            | '{'
            | '}'
            | '|'
            | ':'
            | ';'
            | '"'
            | '\''
            | '<'
            | ','
            | '>'
            | '.'
            | '?'
            | '/'
    )
}

/// Finite-state tokenizer for the query language.
///
/// Root mode recognizes operators, identifiers and punctuation; a quote
/// pushes a string mode which only knows escapes, raw runs and the matching
/// closing quote (which pops back). Rules within a mode are tried in a fixed
/// order and the first one that matches wins.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    modes: Vec<Mode>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            modes: vec![Mode::Root],
        }
    }

    fn mode(&self) -> Mode {
        self.modes.last().copied().unwrap_or(Mode::Root)
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn emit(&mut self, kind: TokenKind, len: usize) -> Token {
        let start = self.pos;
        self.pos += len;
        Token {
            kind,
            text: self.input[start..self.pos].to_string(),
            span: Span::new(start, self.pos),
        }
    }

    fn run_len(&self, pred: impl Fn(char) -> bool) -> usize {
        self.rest()
            .char_indices()
            .find(|&(_, c)| !pred(c))
            .map_or(self.rest().len(), |(i, _)| i)
    }

    fn next_root(&mut self) -> Result<Token, QueryError> {
        let rest = self.rest();
        let mut chars = rest.chars();
        let Some(c) = chars.next() else {
            unreachable!("next_root is only called with input left")
        };
        let next = chars.next();

        if let Some(len) = boolean_operator_len(rest) {
            let mut token = self.emit(TokenKind::BooleanOperator, len);
            token.text.make_ascii_uppercase();
            return Ok(token);
        }

        if rest.starts_with("<=") || rest.starts_with(">=") {
            return Ok(self.emit(TokenKind::RangeOperator, 2));
        }
        if c == '<' || c == '>' {
            return Ok(self.emit(TokenKind::RangeOperator, 1));
        }

        if c == '@' || c == '#' {
            return Ok(self.emit(TokenKind::FieldPrefix, 1));
        }

        if c == '\'' || c == '"' {
            let start = self.pos;
            self.modes.push(if c == '\'' {
                Mode::SingleQuoteString { start }
            } else {
                Mode::DoubleQuoteString { start }
            });
            let kind = if c == '\'' {
                TokenKind::SingleQuote
            } else {
                TokenKind::DoubleQuote
            };
            return Ok(self.emit(kind, 1));
        }

        // A leading minus is an exclusion marker unless it starts a number
        if c == '-' && !next.is_some_and(|n| n.is_ascii_digit() || n == '.') {
            return Ok(self.emit(TokenKind::Punct, 1));
        }

        let len = self.run_len(is_ident_char);
        if len > 0 {
            return Ok(self.emit(TokenKind::Ident, len));
        }

        if is_punct_char(c) {
            return Ok(self.emit(TokenKind::Punct, c.len_utf8()));
        }

        let len = self.run_len(|c| c == '\n' || c == '\r');
        if len > 0 {
            return Ok(self.emit(TokenKind::Eol, len));
        }

        let len = self.run_len(|c| c == ' ' || c == '\t');
        if len > 0 {
            return Ok(self.emit(TokenKind::Whitespace, len));
        }

        Err(QueryError::UnexpectedChar {
            position: self.pos,
            found: c,
        })
    }

    fn next_string(&mut self, quote: char, start: usize) -> Result<Token, QueryError> {
        let rest = self.rest();
        let mut chars = rest.chars();
        let Some(c) = chars.next() else {
            unreachable!("next_string is only called with input left")
        };

        if c == '\\' {
            return match chars.next() {
                Some(escaped) => Ok(self.emit(TokenKind::EscapedChar, 1 + escaped.len_utf8())),
                None => Err(QueryError::UnterminatedString { position: start }),
            };
        }

        if c == quote {
            self.modes.pop();
            let kind = if quote == '\'' {
                TokenKind::SingleQuote
            } else {
                TokenKind::DoubleQuote
            };
            return Ok(self.emit(kind, 1));
        }

        let len = self.run_len(|c| c != quote && c != '\\');
        Ok(self.emit(TokenKind::StringChars, len))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mode = self.mode();
        if self.pos >= self.input.len() {
            return match mode {
                Mode::Root => None,
                Mode::SingleQuoteString { start } | Mode::DoubleQuoteString { start } => {
                    // report once, then stop
                    self.modes.truncate(1);
                    Some(Err(QueryError::UnterminatedString { position: start }))
                }
            };
        }

        let result = match mode {
            Mode::Root => self.next_root(),
            Mode::SingleQuoteString { start } => self.next_string('\'', start),
            Mode::DoubleQuoteString { start } => self.next_string('"', start),
        };
        if result.is_err() {
            self.pos = self.input.len();
            self.modes.truncate(1);
        }
        Some(result)
    }
}

/// Length of a case-insensitive `AND`/`OR` at the start of `s`, provided it
/// stands on its own rather than opening a longer identifier.
fn boolean_operator_len(s: &str) -> Option<usize> {
    ["AND", "OR"].into_iter().find_map(|op| {
        let head = s.get(..op.len())?;
        let standalone = !s[op.len()..].chars().next().is_some_and(is_ident_char);
        (head.eq_ignore_ascii_case(op) && standalone).then_some(op.len())
    })
}

/// Tokenize a query, dropping whitespace tokens
pub fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    Lexer::new(input)
        .filter(|t| !matches!(t, Ok(Token { kind: TokenKind::Whitespace, .. })))
        .collect()
}
