//! Error types for df-sandbox

use crate::protocol::SerializedError;
use df_core::CoreError;
use df_sqlx::SqlxError;
use df_template::TemplateError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while compiling a project inside the worker
#[derive(Error, Debug)]
pub enum SandboxError {
    /// D001: Core library without compiler or index entry points
    #[error("[D001] Missing or outdated core package: core library {version} has no compiler or index generator entry point")]
    MissingEntryPoints { version: String },

    /// D002: Project directory missing or unreadable
    #[error("[D002] Cannot read project directory '{path}': {message}")]
    ProjectDir { path: String, message: String },

    /// D003: Discovery pattern could not be evaluated
    #[error("[D003] Invalid file pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// D004: Definition or include listed in the index does not exist
    #[error("[D004] File not found: {path}")]
    FileNotFound { path: String },

    /// D005: Compile request could not be decoded
    #[error("[D005] Invalid compile request: {0}")]
    InvalidRequest(String),

    /// D006: A file panicked while being evaluated
    #[error("[D006] Evaluation panicked: {0}")]
    Panic(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Sqlx(#[from] SqlxError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    /// D007: IO error
    #[error("[D007] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SandboxError {
    /// Error class name sent across the worker boundary
    pub fn name(&self) -> &'static str {
        match self {
            SandboxError::Core(_) => "CoreError",
            SandboxError::Sqlx(_) => "SqlxError",
            SandboxError::Template(_) => "TemplateError",
            _ => "SandboxError",
        }
    }

    /// Structured fields of the error, for callers that match on them
    pub fn properties(&self) -> BTreeMap<String, Value> {
        let mut props = BTreeMap::new();
        match self {
            SandboxError::MissingEntryPoints { version } => {
                props.insert("version".to_string(), Value::from(version.as_str()));
            }
            SandboxError::ProjectDir { path, .. } | SandboxError::FileNotFound { path } => {
                props.insert("path".to_string(), Value::from(path.as_str()));
            }
            SandboxError::Core(CoreError::VersionMismatch { declared, loaded }) => {
                props.insert("declared".to_string(), Value::from(declared.as_str()));
                props.insert("loaded".to_string(), Value::from(loaded.as_str()));
            }
            SandboxError::Core(CoreError::ConflictingSettings { dir }) => {
                props.insert("dir".to_string(), Value::from(dir.as_str()));
            }
            _ => {}
        }
        props
    }

    /// Convert into the wire form, keeping the source chain as the stack
    pub fn to_serialized(&self) -> SerializedError {
        let mut stack = format!("{}: {}", self.name(), self);
        let mut source = StdError::source(self);
        while let Some(cause) = source {
            stack.push_str(&format!("\n    caused by: {}", cause));
            source = cause.source();
        }
        SerializedError {
            message: self.to_string(),
            stack,
            name: self.name().to_string(),
            properties: self.properties(),
        }
    }
}

/// Result type alias for SandboxError
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Errors raised by the host side of a compile
#[derive(Error, Debug)]
pub enum HostError {
    /// D010: The worker did not answer in time and was killed
    #[error("[D010] Compilation timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// D011: The worker process could not be started
    #[error("[D011] Failed to start worker '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// D012: The worker exited without writing a response
    #[error("[D012] Worker exited with {status} without a response")]
    WorkerCrashed { status: String },

    /// D013: The worker wrote something that is not a response
    #[error("[D013] Malformed worker response: {0}")]
    Protocol(String),

    /// The worker reported a fatal compile error
    #[error("{}", .0.message)]
    Fatal(SerializedError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// D014: IO error while talking to the worker
    #[error("[D014] Worker IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for HostError
pub type HostResult<T> = Result<T, HostError>;
