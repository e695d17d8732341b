//! Error types for df-core

use thiserror::Error;

/// Core error type for Dataforge
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: No workflow settings file in the project
    #[error("[E001] No workflow settings found in {path}: expected workflow_settings.yaml or dataform.json")]
    SettingsNotFound { path: String },

    /// E002: Failed to parse a workflow settings file
    #[error("[E002] Failed to parse {path}: {message}")]
    SettingsParseError { path: String, message: String },

    /// E003: Invalid workflow settings value
    #[error("[E003] Invalid workflow settings: {message}")]
    SettingsInvalid { message: String },

    /// E004: Both the current and the deprecated settings file exist
    #[error("[E004] Both workflow_settings.yaml and the deprecated dataform.json are present in {dir}. Remove dataform.json")]
    ConflictingSettings { dir: String },

    /// E005: Declared core version differs from the loaded library
    #[error("[E005] Version mismatch: project declares dataformCoreVersion '{declared}' but the loaded core library is '{loaded}'")]
    VersionMismatch { declared: String, loaded: String },

    /// E006: Warehouse other than the supported one
    #[error("[E006] Unsupported warehouse '{warehouse}'. Only 'bigquery' is supported")]
    UnsupportedWarehouse { warehouse: String },

    /// E007: Circular dependency detected
    #[error("[E007] Circular dependency detected in chain: [{cycle}]")]
    CircularDependency { cycle: String },

    /// E008: Mutation attempted after the action was compiled
    #[error("[E008] Action '{name}' has already been compiled and can no longer be modified")]
    ActionSealed { name: String },

    /// E009: Empty identifier
    #[error("[E009] Empty name in {context}")]
    EmptyName { context: String },

    /// E010: Invalid action configuration
    #[error("[E010] Invalid action config for '{name}': {message}")]
    InvalidActionConfig { name: String, message: String },

    /// E011: Invalid reference arguments
    #[error("[E011] Invalid reference: {message}")]
    InvalidReference { message: String },

    // Schedule and credential errors (SCH/CRD)
    /// SCH001: schedules.json could not be read or parsed
    #[error("[SCH001] Failed to parse schedules file {path}: {message}")]
    SchedulesParseError { path: String, message: String },

    /// CRD001: Credentials file missing
    #[error("[CRD001] Missing credentials JSON file.")]
    MissingCredentials { path: String },

    /// CRD002: Unknown warehouse name
    #[error("[CRD002] Unrecognized warehouse: {warehouse}")]
    UnrecognizedWarehouse { warehouse: String },

    /// CRD003: Credentials object has the wrong shape
    #[error("[CRD003] Credentials JSON object is invalid: {message}")]
    InvalidCredentials { message: String },

    /// CRD004: Credentials object lacks required properties
    #[error("[CRD004] Missing required properties: {missing}")]
    MissingCredentialProperties { missing: String },

    /// E014: IO error
    #[error("[E014] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E016: IO error with file path context
    #[error("[E016] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E015: YAML parse error
    #[error("[E015] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
