use super::*;
use crate::action::{ActionHeader, Declaration};

fn declaration(schema: &str, name: &str, file: &str) -> Action {
    let target = Target::new(None, schema, name);
    Action::Declaration(Declaration {
        header: ActionHeader {
            target: target.clone(),
            canonical_target: target,
            file_name: file.to_string(),
            dependency_targets: vec![],
            tags: vec![],
            disabled: false,
            action_descriptor: None,
        },
    })
}

#[test]
fn test_assemble_sorts_each_group() {
    let graph = CompiledGraph::assemble(
        "1.0.0",
        ProjectConfig::default(),
        vec![
            declaration("s", "b", "definitions/b.jinja"),
            declaration("s", "a", "definitions/a.jinja"),
        ],
        GraphErrors::default(),
    );
    let names: Vec<&str> = graph
        .declarations
        .iter()
        .map(|d| d.header.target.name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(graph.action_count(), 2);
    assert_eq!(graph.targets().len(), 2);
}

#[test]
fn test_json_round_trip_and_fingerprint() {
    let graph = CompiledGraph::assemble(
        "1.0.0",
        ProjectConfig::default(),
        vec![declaration("s", "a", "definitions/a.jinja")],
        GraphErrors::default(),
    );
    let encoded = graph.to_json().unwrap();
    let decoded = CompiledGraph::from_json(&encoded).unwrap();
    assert_eq!(decoded, graph);
    assert_eq!(decoded.fingerprint().unwrap(), graph.fingerprint().unwrap());
    assert_eq!(graph.fingerprint().unwrap().len(), 64);
}

#[test]
fn test_is_fatal() {
    let mut errors = GraphErrors::default();
    assert!(!errors.is_fatal());
    errors.warnings.push(GraphWarning {
        file_name: "f".into(),
        message: "w".into(),
    });
    assert!(!errors.is_fatal());
    errors.validation_errors.push(ValidationError {
        file_name: "f".into(),
        message: "m".into(),
        action_target: None,
    });
    assert!(errors.is_fatal());
}

#[test]
fn test_tests_are_sorted_by_name_and_do_not_count_as_actions() {
    let test = |name: &str| UnitTest {
        name: name.to_string(),
        file_name: format!("definitions/{}.sqlx", name),
        test_query: "select 1".into(),
        expected_output_query: "select 1".into(),
    };
    let graph = CompiledGraph::assemble(
        "1.0.0",
        ProjectConfig::default(),
        vec![],
        GraphErrors::default(),
    )
    .with_tests(vec![test("zeta"), test("alpha")]);

    let names: Vec<&str> = graph.tests.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
    assert_eq!(graph.action_count(), 0);

    let encoded = graph.to_json().unwrap();
    assert!(encoded.contains("\"expectedOutputQuery\":\"select 1\""));
    assert_eq!(CompiledGraph::from_json(&encoded).unwrap(), graph);
}

#[test]
fn test_graphs_without_tests_still_decode() {
    let encoded = CompiledGraph::assemble(
        "1.0.0",
        ProjectConfig::default(),
        vec![],
        GraphErrors::default(),
    )
    .to_json()
    .unwrap()
    .replace("\"tests\":[],", "");
    assert!(!encoded.contains("\"tests\""));
    assert!(CompiledGraph::from_json(&encoded).unwrap().tests.is_empty());
}
