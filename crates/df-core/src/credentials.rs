//! Warehouse credentials files (`.df-credentials.json`)

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CREDENTIALS_FILENAME: &str = ".df-credentials.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BigQueryCredentials {
    pub project_id: String,
    /// Service account key, as a JSON string
    pub credentials: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Postgres and Redshift
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JdbcCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database_name: String,
    #[serde(default)]
    pub ssl: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnowflakeCredentials {
    pub account_id: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub database_name: String,
    pub warehouse: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlDataWarehouseCredentials {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    BigQuery(BigQueryCredentials),
    Jdbc(JdbcCredentials),
    Snowflake(SnowflakeCredentials),
    SqlDataWarehouse(SqlDataWarehouseCredentials),
}

const BIGQUERY_PROPS: &[&str] = &["projectId", "credentials"];
const JDBC_PROPS: &[&str] = &["host", "port", "username", "password", "databaseName"];
const SNOWFLAKE_PROPS: &[&str] = &[
    "accountId",
    "username",
    "password",
    "role",
    "databaseName",
    "warehouse",
];
const SQLDATAWAREHOUSE_PROPS: &[&str] = &["server", "port", "username", "password", "database"];

/// Properties that must be present for each warehouse
pub fn required_properties(warehouse: &str) -> Option<&'static [&'static str]> {
    match warehouse {
        "bigquery" => Some(BIGQUERY_PROPS),
        "postgres" | "redshift" => Some(JDBC_PROPS),
        "snowflake" => Some(SNOWFLAKE_PROPS),
        "sqldatawarehouse" => Some(SQLDATAWAREHOUSE_PROPS),
        _ => None,
    }
}

/// Read and check the credentials file for `warehouse`.
pub fn read(warehouse: &str, path: &Path) -> CoreResult<Credentials> {
    if !path.is_file() {
        return Err(CoreError::MissingCredentials {
            path: path.display().to_string(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
        path: path.display().to_string(),
        source: e,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| CoreError::InvalidCredentials {
            message: e.to_string(),
        })?;
    coerce(warehouse, &value)
}

/// Check a parsed credentials object against the warehouse's requirements.
pub fn coerce(warehouse: &str, value: &serde_json::Value) -> CoreResult<Credentials> {
    let required = required_properties(warehouse).ok_or_else(|| CoreError::UnrecognizedWarehouse {
        warehouse: warehouse.to_string(),
    })?;
    let object = value.as_object().ok_or_else(|| CoreError::InvalidCredentials {
        message: "expected a JSON object".to_string(),
    })?;

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|key| object.get(*key).map_or(true, |v| v.is_null()))
        .collect();
    if !missing.is_empty() {
        return Err(CoreError::MissingCredentialProperties {
            missing: missing.join(", "),
        });
    }

    match warehouse {
        "bigquery" => typed(value).map(Credentials::BigQuery),
        "postgres" | "redshift" => typed(value).map(Credentials::Jdbc),
        "snowflake" => typed(value).map(Credentials::Snowflake),
        _ => typed(value).map(Credentials::SqlDataWarehouse),
    }
}

fn typed<T: DeserializeOwned>(value: &serde_json::Value) -> CoreResult<T> {
    T::deserialize(value).map_err(|e| CoreError::InvalidCredentials {
        message: e.to_string(),
    })
}

#[cfg(test)]
#[path = "credentials_test.rs"]
mod tests;
