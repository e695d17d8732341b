//! Error types for df-template

use thiserror::Error;

/// Errors raised while evaluating one project file
#[derive(Error, Debug)]
pub enum TemplateError {
    /// Template render error (J001)
    #[error("[J001] Jinja render error: {0}")]
    RenderError(String),

    /// Unknown variable (J002)
    #[error("[J002] Undefined variable '{name}'. Define it in vars: of workflow_settings.yaml or pass it with --vars")]
    UnknownVariable { name: String },

    /// Invalid action configuration passed from project code (J003)
    #[error("[J003] Invalid config: {message}")]
    InvalidConfig { message: String },

    /// Capability not available for this action type (J004)
    #[error("[J004] {name}() is not available in {kind} actions")]
    UnsupportedCapability { name: String, kind: String },

    /// Loader asked for a path outside the project (J005)
    #[error("[J005] Path '{path}' escapes the project directory")]
    PathEscape { path: String },

    /// Notebook file could not be used (J006)
    #[error("[J006] Invalid notebook '{path}': {message}")]
    InvalidNotebook { path: String, message: String },

    /// Core model error
    #[error(transparent)]
    Core(#[from] df_core::CoreError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for TemplateError
pub type TemplateResult<T> = Result<T, TemplateError>;

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        TemplateError::RenderError(err.to_string())
    }
}

/// Wrap an error for return from a template function
pub(crate) fn to_jinja_error(err: impl std::fmt::Display) -> minijinja::Error {
    minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, err.to_string())
}
