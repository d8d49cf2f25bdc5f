use thiserror::Error;

/// Errors that can occur when turning query text into a filter
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("Unterminated quoted string starting at position {position}")]
    UnterminatedString { position: usize },

    #[error("Unexpected character '{found}' at position {position}")]
    UnexpectedChar { position: usize, found: char },

    #[error("Unexpected {found} at position {position}, expected {expected}")]
    UnexpectedToken {
        position: usize,
        found: String,
        expected: &'static str,
    },

    #[error("Invalid number '{text}' at position {position}")]
    InvalidNumber { position: usize, text: String },

    #[error("Failed to build matcher for '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl QueryError {
    /// Byte offset into the query text where the problem was detected
    pub fn position(&self) -> Option<usize> {
        match self {
            QueryError::UnterminatedString { position }
            | QueryError::UnexpectedChar { position, .. }
            | QueryError::UnexpectedToken { position, .. }
            | QueryError::InvalidNumber { position, .. } => Some(*position),
            QueryError::InvalidPattern { .. } => None,
        }
    }
}
