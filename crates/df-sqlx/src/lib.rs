//! df-sqlx - SQLX lexing layer for Dataforge
//!
//! This crate lexes `.sql` and `.sqlx` definition files into syntax trees
//! and compiles them into template programs for the sandbox.

pub mod error;
pub mod lexer;
pub mod program;
pub mod sqlx;

pub use error::{SqlxError, SqlxResult};
pub use lexer::{escape_backticks, lex, LexMode, SectionKind, SyntaxNode, SyntaxTree};
pub use program::{compile, compile_legacy, Program, Section, SqlProgram, LEGACY_BINDINGS};
pub use sqlx::SqlxFile;
