//! Search query language
//!
//! Queries select log entries the way a log-search query bar does. They are
//! lexed, parsed into a syntax tree, and compiled once into a [`Filter`] that
//! is then applied to every entry.
//!
//! # Syntax
//!
//! ```text
//! field:value                 Exact, case-sensitive match on a (dotted) field
//! @field:value  #field:value  Same, with an accepted but inert prefix marker
//! field:"Some Text"           Case-insensitive exact match
//! field:web-*                 Wildcard, anchored and case-sensitive
//! field:>=500  field:<1.5     Numeric open range
//! field:[200 TO 299]          Numeric closed range, inclusive
//! field:(a OR b)              Several values for one field
//! timeout  'no stream'        Free text: case-insensitive substring of `message`
//! -term  -(sub query)         Exclusion
//! a AND b  a OR b  a b        Operators; juxtaposition means AND
//! ```
//!
//! Operator chains fold strictly left to right: `a OR b AND c` is
//! `(a OR b) AND c`.

pub mod ast;
pub mod compiler;
pub mod error;
pub mod lexer;
pub mod parser;

pub use compiler::{Filter, compile};
pub use error::QueryError;
pub use lexer::{Lexer, Span, Token, TokenKind, tokenize};
pub use parser::parse;
