use super::*;

fn lex_ok(source: &str, mode: LexMode) -> SyntaxTree {
    lex(source, mode).unwrap_or_else(|e| panic!("lex failed for {source:?}: {e}"))
}

fn lex_err(source: &str, mode: LexMode) -> (String, usize, usize) {
    match lex(source, mode) {
        Err(SqlxError::Lex {
            message,
            line,
            column,
        }) => (message, line, column),
        other => panic!("expected a lex error for {source:?}, got {other:?}"),
    }
}

#[test]
fn test_round_trip_sql() {
    let sources = [
        "",
        "SELECT 1",
        "/*jinja\n{% set x = 1 %}\n*/\nSELECT ${x} AS a -- trailing\nFROM `proj.ds.t`\n",
        "--jinja {{ config({\"type\": \"view\"}) }}\nSELECT 'it''s', \"q\\\"\" FROM t /* c */\n---\nSELECT 2\r\n",
        "SELECT '${ref(\"a\")}' || '}' AS x",
    ];
    for source in sources {
        assert_eq!(lex_ok(source, LexMode::Sql).source(), source);
    }
}

#[test]
fn test_round_trip_sqlx() {
    let source = r#"config {
  type: "incremental",
  tags: ["a", "b"],
  bigquery: { partitionBy: "DATE(ts)" }
}

jinja {
  {% set cols = ["a", "b"] %}
}

pre_operations {
  DECLARE x DEFAULT 1
  ---
  SET x = 2
}

SELECT ${cols | join(", ")} FROM ${ref("src")} -- config { not a block
WHERE note != '}'

incremental_where {
  ts > (SELECT MAX(ts) FROM ${self()})
}
"#;
    let tree = lex_ok(source, LexMode::Sqlx);
    assert_eq!(tree.source(), source);
    let kinds: Vec<SectionKind> = tree
        .nodes
        .iter()
        .filter_map(|n| match n {
            SyntaxNode::Section { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            SectionKind::Config,
            SectionKind::Jinja,
            SectionKind::PreOperations,
            SectionKind::IncrementalWhere
        ]
    );
}

#[test]
fn test_string_literal_is_not_scanned_for_code_blocks() {
    let tree = lex_ok("SELECT '/*jinja not code */' AS x", LexMode::Sql);
    assert!(tree.code_blocks().is_empty());
    assert_eq!(
        tree.nodes,
        vec![
            SyntaxNode::Text("SELECT ".into()),
            SyntaxNode::StringLiteral(vec![SyntaxNode::Text("'/*jinja not code */'".into())]),
            SyntaxNode::Text(" AS x".into()),
        ]
    );
    assert!(tree.is_plain_sql());
}

#[test]
fn test_code_blocks_are_collected_in_order() {
    let source = "/*jinja\n{% set a = 1 %}\n*/\nSELECT 1\n--JINJA {% set b = 2 %}\n-- just a comment\n";
    let tree = lex_ok(source, LexMode::Sql);
    assert_eq!(
        tree.code_blocks(),
        vec!["\n{% set a = 1 %}\n", " {% set b = 2 %}"]
    );
    assert!(tree
        .nodes
        .contains(&SyntaxNode::Comment("-- just a comment".into())));
}

#[test]
fn test_jinja_comments_are_opaque_in_sqlx() {
    let tree = lex_ok("--jinja {% set a = 1 %}\nSELECT 1", LexMode::Sqlx);
    assert!(tree.code_blocks().is_empty());
    assert!(matches!(tree.nodes[0], SyntaxNode::Comment(_)));
}

#[test]
fn test_marker_requires_whitespace() {
    let tree = lex_ok("/*jinjax */ SELECT 1", LexMode::Sql);
    assert!(tree.code_blocks().is_empty());
}

#[test]
fn test_placeholders_track_braces_and_strings() {
    let tree = lex_ok(r#"SELECT ${ {"a": "}"}["a"] } FROM t"#, LexMode::Sql);
    assert_eq!(
        tree.nodes[1],
        SyntaxNode::Placeholder {
            expr: r#" {"a": "}"}["a"] "#.into()
        }
    );
    assert_eq!(tree.nodes[2], SyntaxNode::Text(" FROM t".into()));
}

#[test]
fn test_placeholder_inside_string_literal() {
    let tree = lex_ok("SELECT '${name()}_x'", LexMode::Sql);
    assert_eq!(
        tree.nodes[1],
        SyntaxNode::StringLiteral(vec![
            SyntaxNode::Text("'".into()),
            SyntaxNode::Placeholder {
                expr: "name()".into()
            },
            SyntaxNode::Text("_x'".into()),
        ])
    );
    assert!(!tree.is_plain_sql());
}

#[test]
fn test_statement_separators_need_their_own_line() {
    let tree = lex_ok("SELECT 1\n  ---  \nSELECT 2 --- not one", LexMode::Sql);
    let separators: Vec<&SyntaxNode> = tree
        .nodes
        .iter()
        .filter(|n| matches!(n, SyntaxNode::StatementSeparator(_)))
        .collect();
    assert_eq!(
        separators,
        vec![&SyntaxNode::StatementSeparator("  ---  ".into())]
    );
}

#[test]
fn test_section_keywords_need_a_word_boundary() {
    let tree = lex_ok("SELECT my_config {", LexMode::Sql);
    assert!(tree.is_plain_sql());
    let err = lex("SELECT myconfig { x }", LexMode::Sqlx).unwrap_err();
    assert!(matches!(err, SqlxError::Lex { .. }), "{err}");
}

#[test]
fn test_section_sql_body() {
    let tree = lex_ok("post_operations {\n  GRANT '}' TO x\n}\nSELECT 1", LexMode::Sqlx);
    match &tree.nodes[0] {
        SyntaxNode::Section {
            kind: SectionKind::PostOperations,
            body: SectionBody::Sql(nodes),
            ..
        } => {
            assert_eq!(nodes.len(), 3);
            assert!(matches!(nodes[1], SyntaxNode::StringLiteral(_)));
        }
        other => panic!("unexpected node {other:?}"),
    }
}

#[test]
fn test_unterminated_constructs_report_position() {
    assert_eq!(
        lex_err("SELECT 1\n  'abc", LexMode::Sql),
        ("Unterminated string literal".to_string(), 2, 3)
    );
    assert_eq!(
        lex_err("SELECT /* open", LexMode::Sql),
        ("Unterminated comment".to_string(), 1, 8)
    );
    assert_eq!(
        lex_err("/*jinja\n{% set a = 1 %}", LexMode::Sql),
        ("Unterminated code block".to_string(), 1, 1)
    );
    assert_eq!(
        lex_err("SELECT ${ref('a'", LexMode::Sql),
        ("Unterminated placeholder".to_string(), 1, 8)
    );
    assert_eq!(
        lex_err("config { type: \"table\"\nSELECT 1", LexMode::Sqlx),
        ("Unterminated config block".to_string(), 1, 1)
    );
    assert_eq!(
        lex_err("pre_operations { SELECT 1", LexMode::Sqlx),
        ("Unterminated pre_operations block".to_string(), 1, 1)
    );
    assert_eq!(
        lex_err("SELECT 1 }", LexMode::Sqlx),
        ("Unexpected '}'".to_string(), 1, 10)
    );
}

#[test]
fn test_stray_brace_is_text_in_sql_mode() {
    let tree = lex_ok("SELECT 1 }", LexMode::Sql);
    assert_eq!(tree.nodes, vec![SyntaxNode::Text("SELECT 1 }".into())]);
}

#[test]
fn test_escape_backticks() {
    assert_eq!(escape_backticks("SELECT `a`"), "SELECT \\`a\\`");
    assert_eq!(escape_backticks("`x`"), "\\`x\\`");
    assert_eq!(escape_backticks("already \\` escaped"), "already \\` escaped");
    assert_eq!(escape_backticks("no ticks"), "no ticks");
}

#[test]
fn test_escape_backticks_is_idempotent() {
    for sql in ["SELECT `a`.`b`", "``", "\\``", "plain", "`"] {
        let once = escape_backticks(sql);
        assert_eq!(escape_backticks(&once), once, "{sql}");
    }
}

#[test]
fn test_input_sections_carry_their_label() {
    let tree = lex_ok(
        "input \"raw-orders_1\" {\n  SELECT 1 AS id\n}\nSELECT * FROM x",
        LexMode::Sqlx,
    );
    match &tree.nodes[0] {
        SyntaxNode::Section {
            kind: SectionKind::Input,
            open,
            body: SectionBody::Sql(_),
            ..
        } => {
            assert_eq!(open, "input \"raw-orders_1\" {");
            assert_eq!(input_label(open), Some("raw-orders_1"));
        }
        other => panic!("unexpected node {other:?}"),
    }
    assert_eq!(
        tree.source(),
        "input \"raw-orders_1\" {\n  SELECT 1 AS id\n}\nSELECT * FROM x"
    );
}

#[test]
fn test_input_labels_may_be_qualified() {
    let tree = lex_ok("input \"ext.customers\" { SELECT 1 }", LexMode::Sqlx);
    match &tree.nodes[0] {
        SyntaxNode::Section { open, .. } => {
            assert_eq!(input_label(open), Some("ext.customers"))
        }
        other => panic!("unexpected node {other:?}"),
    }
}

#[test]
fn test_input_without_label_is_plain_sql() {
    let tree = lex_ok("SELECT input FROM t", LexMode::Sqlx);
    assert!(tree.is_plain_sql());
    let tree = lex_ok("SELECT \"input\" FROM t", LexMode::Sqlx);
    assert!(tree.is_plain_sql());
}
