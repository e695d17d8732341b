use super::*;
use serde_json::json;

#[test]
fn test_read_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = read("bigquery", &dir.path().join(CREDENTIALS_FILENAME)).unwrap_err();
    assert!(matches!(err, CoreError::MissingCredentials { .. }));
    assert!(err.to_string().contains("Missing credentials JSON file."));
}

#[test]
fn test_read_bigquery() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CREDENTIALS_FILENAME);
    std::fs::write(&path, r#"{"projectId": "p", "credentials": "{}", "location": "EU"}"#).unwrap();
    let creds = read("bigquery", &path).unwrap();
    assert_eq!(
        creds,
        Credentials::BigQuery(BigQueryCredentials {
            project_id: "p".into(),
            credentials: "{}".into(),
            location: Some("EU".into()),
        })
    );
}

#[test]
fn test_coerce_unknown_warehouse() {
    let err = coerce("oracle", &json!({})).unwrap_err();
    assert_eq!(err.to_string(), "[CRD002] Unrecognized warehouse: oracle");
}

#[test]
fn test_coerce_lists_missing_properties() {
    let err = coerce("postgres", &json!({"host": "h", "port": 5432})).unwrap_err();
    match err {
        CoreError::MissingCredentialProperties { missing } => {
            assert_eq!(missing, "username, password, databaseName")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_coerce_rejects_wrong_types() {
    let err = coerce(
        "sqldatawarehouse",
        &json!({"server": "s", "port": "not a port", "username": "u", "password": "p", "database": "d"}),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::InvalidCredentials { .. }));
}

#[test]
fn test_coerce_snowflake() {
    let creds = coerce(
        "snowflake",
        &json!({
            "accountId": "a",
            "username": "u",
            "password": "p",
            "role": "r",
            "databaseName": "d",
            "warehouse": "w"
        }),
    )
    .unwrap();
    assert!(matches!(creds, Credentials::Snowflake(_)));
}
