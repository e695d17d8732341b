//! Error types for df-sqlx

use thiserror::Error;

/// Lexing and program compilation errors
#[derive(Error, Debug)]
pub enum SqlxError {
    /// Malformed lexical construct (X001)
    #[error("[X001] {message} at line {line}, column {column}")]
    Lex {
        message: String,
        line: usize,
        column: usize,
    },

    /// Config block could not be parsed (X002)
    #[error("[X002] Invalid config block: {0}")]
    InvalidConfig(String),

    /// File content violates the rules for its action type (X003)
    #[error("[X003] {}", .messages.join("; "))]
    Validation { messages: Vec<String> },

    /// No compiler for this kind of file (X004)
    #[error("[X004] Unsupported definition file: {0}")]
    UnsupportedFile(String),
}

/// Result type alias for SqlxError
pub type SqlxResult<T> = Result<T, SqlxError>;
