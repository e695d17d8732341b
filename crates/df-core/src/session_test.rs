use super::*;
use crate::action::{ActionDescriptor, TableType, UnitTestRegistration};
use crate::settings::ProjectConfig;

fn table(file: &str, name: &str, query: &str, deps: &[&str]) -> Registration {
    Registration {
        file_path: file.to_string(),
        name: name.to_string(),
        schema: None,
        database: None,
        dependencies: deps.iter().map(|d| TargetRef::named(*d)).collect(),
        descriptor: ActionDescriptor::default(),
        tags: vec![],
        disabled: false,
        payload: RegistrationPayload::Table {
            table_type: TableType::Table,
            query: query.to_string(),
            incremental_query: None,
            pre_ops: vec![],
            post_ops: vec![],
            incremental_where: None,
            protected: false,
            unique_key: vec![],
            assertions: TableAssertions::default(),
            bigquery: None,
        },
    }
}

fn declaration(file: &str, schema: &str, name: &str) -> Registration {
    Registration {
        file_path: file.to_string(),
        name: name.to_string(),
        schema: Some(schema.to_string()),
        database: None,
        dependencies: vec![],
        descriptor: ActionDescriptor::default(),
        tags: vec![],
        disabled: false,
        payload: RegistrationPayload::Declaration,
    }
}

fn inline(file: &str, name: &str, query: &str, deps: &[&str]) -> Registration {
    let mut registration = table(file, name, query, deps);
    if let RegistrationPayload::Table { table_type, .. } = &mut registration.payload {
        *table_type = TableType::Inline;
    }
    registration
}

fn operation(file: &str, name: &str, query: &str, has_output: bool) -> Registration {
    Registration {
        file_path: file.to_string(),
        name: name.to_string(),
        schema: None,
        database: None,
        dependencies: vec![],
        descriptor: ActionDescriptor::default(),
        tags: vec![],
        disabled: false,
        payload: RegistrationPayload::Operation {
            queries: vec![query.to_string()],
            has_output,
        },
    }
}

fn query_of<'g>(graph: &'g CompiledGraph, name: &str) -> &'g str {
    &graph
        .tables
        .iter()
        .find(|t| t.header.target.name == name)
        .unwrap()
        .query
}

fn config() -> ProjectConfig {
    ProjectConfig {
        default_database: Some("proj".to_string()),
        ..ProjectConfig::default()
    }
}

fn messages(graph: &CompiledGraph) -> Vec<String> {
    graph
        .graph_errors
        .validation_errors
        .iter()
        .map(|e| e.message.clone())
        .collect()
}

fn marker(name: &str) -> String {
    Deferred::Target {
        target: TargetRef::named(name),
    }
    .encode()
}

#[test]
fn test_compile_empty_session() {
    let graph = Session::new(config(), "3.0.0").compile();
    assert_eq!(graph.action_count(), 0);
    assert!(!graph.graph_errors.is_fatal());
    assert_eq!(graph.dataform_core_version, "3.0.0");
}

#[test]
fn test_references_resolve_regardless_of_registration_order() {
    let mut session = Session::new(config(), "3.0.0");
    session.register(table(
        "definitions/b.sqlx",
        "b",
        &format!("SELECT * FROM {}", marker("a")),
        &["a"],
    ));
    session.register(table("definitions/a.sqlx", "a", "SELECT 1", &[]));
    let graph = session.compile();

    assert!(messages(&graph).is_empty(), "{:?}", messages(&graph));
    let b = graph
        .tables
        .iter()
        .find(|t| t.header.target.name == "b")
        .unwrap();
    assert_eq!(b.query, "SELECT * FROM `proj.dataform.a`");
    assert_eq!(
        b.header.dependency_targets,
        vec![Target::new(Some("proj".into()), "dataform", "a")]
    );
}

#[test]
fn test_runtime_targets_apply_affixes_but_declarations_do_not() {
    let mut cfg = config();
    cfg.schema_suffix = Some("dev".into());
    cfg.table_prefix = Some("tmp".into());
    cfg.database_suffix = Some("x".into());
    let mut session = Session::new(cfg, "3.0.0");
    session.register(table(
        "definitions/t.sqlx",
        "t",
        &format!("SELECT * FROM {}", marker("src")),
        &["src"],
    ));
    session.register(declaration("definitions/src.sqlx", "raw", "src"));
    let graph = session.compile();

    assert!(messages(&graph).is_empty(), "{:?}", messages(&graph));
    let t = &graph.tables[0];
    assert_eq!(
        t.header.target,
        Target::new(Some("proj_x".into()), "dataform_dev", "tmp_t")
    );
    assert_eq!(
        t.header.canonical_target,
        Target::new(Some("proj".into()), "dataform", "t")
    );
    assert_eq!(t.query, "SELECT * FROM `proj.raw.src`");
    let decl = &graph.declarations[0];
    assert_eq!(decl.header.target, decl.header.canonical_target);
}

#[test]
fn test_self_markers_use_runtime_target() {
    let mut cfg = config();
    cfg.schema_suffix = Some("dev".into());
    let mut session = Session::new(cfg, "3.0.0");
    let query = format!(
        "INSERT INTO {} SELECT '{}', '{}'",
        Deferred::SelfTarget.encode(),
        Deferred::SelfSchema.encode(),
        Deferred::SelfDatabase.encode()
    );
    session.register(table("definitions/t.sqlx", "t", &query, &[]));
    let graph = session.compile();
    assert_eq!(
        graph.tables[0].query,
        "INSERT INTO `proj.dataform_dev.t` SELECT 'dataform_dev', 'proj'"
    );
}

#[test]
fn test_missing_dependency_is_a_validation_error() {
    let mut session = Session::new(config(), "3.0.0");
    session.register(table("definitions/a.sqlx", "a", "SELECT 1", &["nope"]));
    let graph = session.compile();
    assert_eq!(
        messages(&graph),
        vec![
            "Missing dependency detected: Action \"proj.dataform.a\" depends on \"nope\" which does not exist"
                .to_string()
        ]
    );
    assert_eq!(graph.graph_errors.validation_errors[0].file_name, "definitions/a.sqlx");
}

#[test]
fn test_ambiguous_dependency_is_reported() {
    let mut session = Session::new(config(), "3.0.0");
    session.register(declaration("definitions/x1.sqlx", "s1", "x"));
    session.register(declaration("definitions/x2.sqlx", "s2", "x"));
    session.register(table("definitions/a.sqlx", "a", "SELECT 1", &["x"]));
    let graph = session.compile();
    let msgs = messages(&graph);
    assert_eq!(msgs.len(), 1, "{:?}", msgs);
    assert!(msgs[0].starts_with("Ambiguous Action name: x."));
    assert!(msgs[0].contains("proj.s1.x"));
    assert!(msgs[0].contains("proj.s2.x"));
}

#[test]
fn test_duplicate_targets_reported_once_per_pair() {
    let mut session = Session::new(config(), "3.0.0");
    session.register(table("definitions/one.sqlx", "dup", "SELECT 1", &[]));
    session.register(table("definitions/two.sqlx", "dup", "SELECT 2", &[]));
    let graph = session.compile();
    let msgs = messages(&graph);
    assert_eq!(msgs.len(), 1, "{:?}", msgs);
    assert!(msgs[0].contains("definitions/one.sqlx"));
    assert!(msgs[0].contains("definitions/two.sqlx"));
    assert_eq!(graph.graph_errors.validation_errors[0].file_name, "definitions/two.sqlx");
}

#[test]
fn test_cycle_is_reported_with_chain() {
    let mut session = Session::new(config(), "3.0.0");
    session.register(table("definitions/a.sqlx", "a", "SELECT 1", &["b"]));
    session.register(table("definitions/b.sqlx", "b", "SELECT 1", &["a"]));
    let graph = session.compile();
    let msgs = messages(&graph);
    assert_eq!(msgs.len(), 1, "{:?}", msgs);
    assert_eq!(
        msgs[0],
        "Circular dependency detected in chain: [proj.dataform.a > proj.dataform.b > proj.dataform.a]"
    );
    assert!(graph.graph_errors.is_fatal());
}

#[test]
fn test_dotted_names_are_rejected() {
    let mut session = Session::new(config(), "3.0.0");
    session.register(table("definitions/a.sqlx", "a.b", "SELECT 1", &[]));
    let graph = session.compile();
    assert_eq!(
        messages(&graph),
        vec!["Action target names cannot include '.': \"a.b\"".to_string()]
    );
}

#[test]
fn test_inline_assertions_are_generated() {
    let mut session = Session::new(config(), "3.0.0");
    let mut reg = table("definitions/t.sqlx", "t", "SELECT 1 AS id", &[]);
    reg.tags = vec!["daily".into()];
    if let RegistrationPayload::Table { assertions, .. } = &mut reg.payload {
        assertions.unique_key = vec!["id".into()];
        assertions.non_null = vec!["id".into()];
        assertions.row_conditions = vec!["id > 0".into()];
    }
    session.register(reg);
    let graph = session.compile();

    assert!(messages(&graph).is_empty(), "{:?}", messages(&graph));
    let names: Vec<&str> = graph
        .assertions
        .iter()
        .map(|a| a.header.target.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "dataform_t_assertions_rowConditions",
            "dataform_t_assertions_uniqueKey_0"
        ]
    );
    let table_target = graph.tables[0].header.target.clone();
    for assertion in &graph.assertions {
        assert_eq!(assertion.header.target.schema, "dataform_assertions");
        assert_eq!(assertion.parent_action.as_ref(), Some(&table_target));
        assert_eq!(assertion.header.tags, vec!["daily".to_string()]);
        assert_eq!(assertion.header.dependency_targets, vec![table_target.clone()]);
    }
    let rows = &graph.assertions[0].query;
    assert!(rows.contains("WHERE NOT (id > 0)"));
    assert!(rows.contains("WHERE NOT (id IS NOT NULL)"));
    assert!(rows.contains("UNION ALL"));
    assert!(rows.contains("FROM `proj.dataform.t`"));
    let unique = &graph.assertions[1].query;
    assert!(unique.contains("GROUP BY id"));
    assert!(unique.contains("WHERE index_row_count > 1"));
}

#[test]
fn test_unique_key_and_unique_keys_are_exclusive() {
    let mut session = Session::new(config(), "3.0.0");
    let mut reg = table("definitions/t.sqlx", "t", "SELECT 1 AS id", &[]);
    if let RegistrationPayload::Table { assertions, .. } = &mut reg.payload {
        assertions.unique_key = vec!["id".into()];
        assertions.unique_keys = vec![vec!["id".into()]];
    }
    session.register(reg);
    let graph = session.compile();
    assert_eq!(graph.assertions.len(), 0);
    assert_eq!(messages(&graph).len(), 1);
}

#[test]
fn test_compile_errors_and_warnings_are_carried() {
    let mut session = Session::new(config(), "3.0.0");
    session.compile_error("definitions/bad.sqlx", "boom");
    session.warn("definitions/ok.sqlx", "careful");
    let graph = session.compile();
    assert_eq!(graph.graph_errors.compilation_errors.len(), 1);
    assert_eq!(graph.graph_errors.warnings.len(), 1);
    assert!(graph.graph_errors.is_fatal());
}

#[test]
fn test_dependencies_are_deduplicated_and_sorted() {
    let mut session = Session::new(config(), "3.0.0");
    session.register(table("definitions/z.sqlx", "z", "SELECT 1", &[]));
    session.register(table("definitions/y.sqlx", "y", "SELECT 1", &[]));
    session.register(table(
        "definitions/a.sqlx",
        "a",
        "SELECT 1",
        &["z", "y", "z", "y"],
    ));
    let graph = session.compile();
    let a = graph
        .tables
        .iter()
        .find(|t| t.header.target.name == "a")
        .unwrap();
    let deps: Vec<&str> = a
        .header
        .dependency_targets
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(deps, vec!["y", "z"]);
}

#[test]
fn test_compile_is_deterministic() {
    let build = || {
        let mut session = Session::new(config(), "3.0.0");
        session.register(table("definitions/b.sqlx", "b", &marker("a"), &["a"]));
        session.register(table("definitions/a.sqlx", "a", "SELECT 1", &[]));
        session.compile().to_json().unwrap()
    };
    assert_eq!(build(), build());
}

#[test]
fn test_ref_to_inline_table_is_replaced_by_its_query() {
    let mut session = Session::new(config(), "3.0.0");
    session.register(inline("definitions/inl.sqlx", "inl", "select 1 as x", &[]));
    session.register(table(
        "definitions/b.sql",
        "b",
        &format!("select * from {}", marker("inl")),
        &["inl"],
    ));
    let graph = session.compile();

    assert!(messages(&graph).is_empty(), "{:?}", messages(&graph));
    assert_eq!(query_of(&graph, "b"), "select * from (select 1 as x)");
}

#[test]
fn test_inline_tables_expand_through_chains() {
    let mut session = Session::new(config(), "3.0.0");
    session.register(table("definitions/src.sqlx", "src", "select 1 as x", &[]));
    session.register(inline(
        "definitions/inner.sqlx",
        "inner",
        &format!(
            "select x from {} where {} = 1",
            marker("src"),
            Deferred::SelfSchema.encode()
        ),
        &["src"],
    ));
    session.register(inline(
        "definitions/outer.sqlx",
        "outer",
        &format!("select x from {}", marker("inner")),
        &["inner"],
    ));
    session.register(table(
        "definitions/b.sqlx",
        "b",
        &format!("select * from {}", marker("outer")),
        &["outer"],
    ));
    let graph = session.compile();

    assert!(messages(&graph).is_empty(), "{:?}", messages(&graph));
    assert_eq!(
        query_of(&graph, "b"),
        "select * from (select x from (select x from `proj.dataform.src` where dataform = 1))"
    );
    assert_eq!(
        query_of(&graph, "outer"),
        "select x from (select x from `proj.dataform.src` where dataform = 1)"
    );
}

#[test]
fn test_inline_cycle_terminates_and_is_reported() {
    let mut session = Session::new(config(), "3.0.0");
    session.register(inline(
        "definitions/p.sqlx",
        "p",
        &format!("select * from {}", marker("q")),
        &["q"],
    ));
    session.register(inline(
        "definitions/q.sqlx",
        "q",
        &format!("select * from {}", marker("p")),
        &["p"],
    ));
    let graph = session.compile();

    assert_eq!(
        query_of(&graph, "p"),
        "select * from (select * from `proj.dataform.p`)"
    );
    assert!(messages(&graph)
        .iter()
        .any(|m| m.starts_with("Circular dependency detected")));
}

#[test]
fn test_ref_to_operation_without_output_is_an_error() {
    let mut session = Session::new(config(), "3.0.0");
    session.register(operation(
        "definitions/op.ops.sql",
        "op",
        "delete from foo",
        false,
    ));
    session.register(table(
        "definitions/b.sql",
        "b",
        &format!("select * from {}", marker("op")),
        &["op"],
    ));
    let graph = session.compile();

    let errors = &graph.graph_errors.validation_errors;
    assert_eq!(errors.len(), 1, "{:?}", messages(&graph));
    assert_eq!(
        errors[0].message,
        "Actions cannot resolve operations which do not produce output."
    );
    assert_eq!(errors[0].file_name, "definitions/b.sql");
    assert_eq!(query_of(&graph, "b"), "select * from `proj.dataform.op`");
}

#[test]
fn test_operations_with_output_and_plain_dependencies_are_fine() {
    let mut session = Session::new(config(), "3.0.0");
    session.register(operation(
        "definitions/op.ops.sql",
        "op",
        "create table x as select 1",
        true,
    ));
    session.register(operation(
        "definitions/cleanup.ops.sql",
        "cleanup",
        "delete from foo",
        false,
    ));
    session.register(table(
        "definitions/b.sql",
        "b",
        &format!("select * from {}", marker("op")),
        &["op", "cleanup"],
    ));
    let graph = session.compile();
    assert!(messages(&graph).is_empty(), "{:?}", messages(&graph));
}

fn unit_test(
    file: &str,
    name: &str,
    dataset: Option<&str>,
    inputs: &[(&str, &str)],
) -> UnitTestRegistration {
    let mut test = UnitTestRegistration::new(name, file).unwrap();
    test.dataset = dataset.map(TargetRef::parse);
    for (input, query) in inputs {
        test.set_input(input, query.to_string());
    }
    test.expected_query = "select 1 as x".to_string();
    test
}

fn compilation_messages(graph: &CompiledGraph) -> Vec<String> {
    graph
        .graph_errors
        .compilation_errors
        .iter()
        .map(|e| e.message.clone())
        .collect()
}

#[test]
fn test_unit_test_replaces_refs_with_inputs() {
    let mut session = Session::new(config(), "3.0.0");
    session.register(table(
        "definitions/orders.sqlx",
        "orders",
        &format!(
            "select * from {} join {} using (id) where {} is not null",
            marker("raw"),
            Deferred::Target {
                target: TargetRef::parse("ext.customers"),
            }
            .encode(),
            Deferred::SelfSchema.encode()
        ),
        &["raw"],
    ));
    session.register_test(unit_test(
        "definitions/orders_test.sqlx",
        "orders_test",
        Some("orders"),
        &[
            ("raw", "select 1 as id"),
            ("ext.customers", "select 1 as id, 'a' as name"),
        ],
    ));
    let graph = session.compile();

    let errors = compilation_messages(&graph);
    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(graph.tests.len(), 1);
    let test = &graph.tests[0];
    assert_eq!(test.file_name, "definitions/orders_test.sqlx");
    assert_eq!(
        test.test_query,
        "select * from (select 1 as id) join (select 1 as id, 'a' as name) using (id) where  is not null"
    );
    assert_eq!(test.expected_output_query, "select 1 as x");
}

#[test]
fn test_unit_test_dataset_problems_are_compile_errors() {
    let mut session = Session::new(config(), "3.0.0");
    let mut incremental = table("definitions/inc.sqlx", "inc", "select 1", &[]);
    if let RegistrationPayload::Table { table_type, .. } = &mut incremental.payload {
        *table_type = TableType::Incremental;
    }
    session.register(incremental);
    session.register(table(
        "definitions/t.sqlx",
        "t",
        &format!("select * from {}", marker("src")),
        &[],
    ));
    session.register(declaration("definitions/src.sqlx", "raw", "src"));
    session.register_test(unit_test("definitions/a.sqlx", "no_dataset", None, &[]));
    session.register_test(unit_test("definitions/b.sqlx", "missing", Some("nowhere"), &[]));
    session.register_test(unit_test("definitions/c.sqlx", "incremental", Some("inc"), &[]));
    session.register_test(unit_test("definitions/d.sqlx", "declared", Some("src"), &[]));
    session.register_test(unit_test("definitions/e.sqlx", "no_input", Some("t"), &[]));
    let graph = session.compile();

    assert_eq!(
        compilation_messages(&graph),
        vec![
            "Tests must operate upon a specified dataset.".to_string(),
            "Dataset nowhere could not be found.".to_string(),
            "Running tests on incremental datasets is not yet supported.".to_string(),
            "Dataset src could not be found.".to_string(),
            "Input for dataset \"src\" has not been provided.".to_string(),
        ]
    );
    let failing_files: Vec<&str> = graph
        .graph_errors
        .compilation_errors
        .iter()
        .map(|e| e.file_name.as_str())
        .collect();
    assert_eq!(
        failing_files,
        vec![
            "definitions/a.sqlx",
            "definitions/b.sqlx",
            "definitions/c.sqlx",
            "definitions/d.sqlx",
            "definitions/e.sqlx"
        ]
    );
    assert_eq!(graph.tests.len(), 5);
    assert_eq!(graph.action_count(), 3);
}

#[test]
fn test_duplicate_test_names_are_reported() {
    let mut session = Session::new(config(), "3.0.0");
    session.register(table("definitions/t.sqlx", "t", "select 1", &[]));
    session.register_test(unit_test("definitions/one.sqlx", "check_t", Some("t"), &[]));
    session.register_test(unit_test("definitions/two.sqlx", "check_t", Some("t"), &[]));
    let graph = session.compile();

    assert_eq!(
        graph.graph_errors.compilation_errors,
        vec![CompilationError {
            file_name: "definitions/two.sqlx".to_string(),
            message: "Duplicate test name detected: \"check_t\"".to_string(),
        }]
    );
    assert_eq!(graph.tests.len(), 1);
    assert_eq!(graph.tests[0].file_name, "definitions/one.sqlx");
    assert_eq!(graph.tests[0].test_query, "select 1");
}
