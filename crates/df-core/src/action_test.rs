use super::*;

#[test]
fn test_config_parses_flow_mapping() {
    let yaml = r#"{type: "incremental", schema: "staging", tags: ["daily"], uniqueKey: ["id"],
        dependencies: ["raw_orders", {schema: "ext", name: "customers"}],
        bigquery: {partitionBy: "DATE(ts)", clusterBy: ["id"]}}"#;
    let config: ActionConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.config_type, Some(ConfigType::Incremental));
    assert_eq!(config.schema.as_deref(), Some("staging"));
    assert_eq!(config.unique_key, Some(vec!["id".to_string()]));

    let deps: Vec<TargetRef> = config
        .dependencies
        .unwrap()
        .into_iter()
        .map(TargetRef::from)
        .collect();
    assert_eq!(deps[0], TargetRef::named("raw_orders"));
    assert_eq!(deps[1].schema.as_deref(), Some("ext"));

    let bq = config.bigquery.unwrap();
    assert_eq!(bq.partition_by.as_deref(), Some("DATE(ts)"));
    assert_eq!(bq.cluster_by, vec!["id".to_string()]);
}

#[test]
fn test_config_rejects_unknown_keys() {
    let result: Result<ActionConfig, _> = serde_yaml::from_str("{tpye: table}");
    assert!(result.is_err());
}

#[test]
fn test_column_docs_accept_nested_records() {
    let yaml = r#"{columns: {id: "primary key", payload: {description: "raw", columns: {a: "nested"}}}}"#;
    let config: ActionConfig = serde_yaml::from_str(yaml).unwrap();
    let columns = config.columns.unwrap();
    assert_eq!(columns["id"], ColumnDoc::Description("primary key".into()));
    match &columns["payload"] {
        ColumnDoc::Detailed { description, columns } => {
            assert_eq!(description.as_deref(), Some("raw"));
            assert!(columns.contains_key("a"));
        }
        other => panic!("unexpected column doc: {other:?}"),
    }
}

#[test]
fn test_config_type_mapping() {
    assert_eq!(ConfigType::View.kind(), Some(ActionKind::Table));
    assert_eq!(ConfigType::Operations.kind(), Some(ActionKind::Operation));
    assert_eq!(ConfigType::Test.kind(), None);
    assert_eq!(ConfigType::Declaration.table_type(), None);
    assert!(ConfigType::Inline.is_dataset());
    assert!(!ConfigType::Assertion.is_dataset());
}

#[test]
fn test_table_serializes_flattened_header() {
    let table = Table {
        header: ActionHeader {
            target: Target::new(None, "s_dev", "t"),
            canonical_target: Target::new(None, "s", "t"),
            file_name: "definitions/t.sqlx".into(),
            dependency_targets: vec![],
            tags: vec![],
            disabled: false,
            action_descriptor: None,
        },
        table_type: TableType::View,
        query: "SELECT 1".into(),
        incremental_query: None,
        pre_ops: vec![],
        post_ops: vec![],
        incremental_where: None,
        protected: false,
        unique_key: vec![],
        bigquery: None,
    };
    let json = serde_json::to_value(&table).unwrap();
    assert_eq!(json["type"], "view");
    assert_eq!(json["fileName"], "definitions/t.sqlx");
    assert_eq!(json["canonicalTarget"]["schema"], "s");
    assert!(json.get("disabled").is_none());
    assert!(json.get("preOps").is_none());
}

#[test]
fn test_unit_test_config_accepts_only_test_keys() {
    let mut test = UnitTestRegistration::new("orders_test", "definitions/t.sqlx").unwrap();
    let config: ActionConfig =
        serde_yaml::from_str("{type: test, dataset: orders, tags: [ci], dependencies: [x]}")
            .unwrap();
    test.apply_config(config).unwrap();
    assert_eq!(test.dataset, Some(TargetRef::named("orders")));

    let config: ActionConfig = serde_yaml::from_str("{schema: reporting}").unwrap();
    let err = test.apply_config(config).unwrap_err();
    assert!(err.to_string().contains("Unexpected property \"schema\" in test config"));

    let config: ActionConfig = serde_yaml::from_str("{type: view}").unwrap();
    assert!(test.apply_config(config).is_err());
    assert!(UnitTestRegistration::new("", "definitions/t.sqlx").is_err());
}

#[test]
fn test_unit_test_inputs_match_references() {
    let mut test = UnitTestRegistration::new("t", "definitions/t.jinja").unwrap();
    test.set_input("raw.orders", "select 1".into());
    test.set_input("customers", "select 2".into());
    test.set_input("customers", "select 3".into());

    assert_eq!(test.input_for(&TargetRef::parse("raw.orders")), Some("select 1"));
    assert_eq!(test.input_for(&TargetRef::named("customers")), Some("select 3"));
    assert_eq!(test.input_for(&TargetRef::named("orders")), None);
}
