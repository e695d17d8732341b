use super::*;
use serde_json::json;

#[test]
fn test_minimal_request_uses_defaults() {
    let request: CompileRequest = serde_json::from_str(r#"{"projectDir": "/p"}"#).unwrap();
    assert_eq!(request, CompileRequest::new("/p"));
    assert_eq!(request.entry_point_mode, EntryPointMode::FallbackToLegacy);
    assert_eq!(
        request.unsupported_capabilities,
        UnsupportedCapabilityPolicy::Warn
    );
    assert!(!request.use_legacy_entry_points);
}

#[test]
fn test_request_fields_are_camel_case() {
    let request: CompileRequest = serde_json::from_value(json!({
        "projectDir": "/p",
        "schemaSuffixOverride": "dev",
        "filePaths": ["definitions/a.sql"],
        "useLegacyEntryPoints": true,
        "returnOverride": "override",
        "vars": {"env": "dev"},
        "entryPointMode": "strict",
        "unsupportedCapabilities": "error",
        "fuel": 100
    }))
    .unwrap();

    assert_eq!(request.schema_suffix_override.as_deref(), Some("dev"));
    assert_eq!(request.file_paths, Some(vec!["definitions/a.sql".to_string()]));
    assert!(request.use_legacy_entry_points);
    assert_eq!(request.return_override.as_deref(), Some("override"));
    assert_eq!(request.vars.get("env").map(String::as_str), Some("dev"));
    assert_eq!(request.entry_point_mode, EntryPointMode::Strict);
    assert_eq!(
        request.unsupported_capabilities,
        UnsupportedCapabilityPolicy::Error
    );
    assert_eq!(request.fuel, Some(100));
}

#[test]
fn test_request_rejects_missing_project_dir() {
    assert!(serde_json::from_str::<CompileRequest>("{}").is_err());
}

#[test]
fn test_success_response_shape() {
    let response = CompileResponse::Success {
        encoded_graph: "{}".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"type": "success", "encodedGraph": "{}"})
    );
}

#[test]
fn test_error_response_shape() {
    let mut properties = BTreeMap::new();
    properties.insert("declared".to_string(), json!("1.0.0"));
    let response = CompileResponse::Error {
        error: SerializedError {
            message: "boom".to_string(),
            stack: "CoreError: boom".to_string(),
            name: "CoreError".to_string(),
            properties,
        },
    };

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["type"], "error");
    assert_eq!(value["error"]["message"], "boom");
    assert_eq!(value["error"]["properties"]["declared"], "1.0.0");

    let decoded: CompileResponse = serde_json::from_value(value).unwrap();
    assert_eq!(decoded, response);
}
