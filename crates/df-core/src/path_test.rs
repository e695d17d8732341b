use super::*;

#[test]
fn test_file_name_and_dir_name() {
    assert_eq!(file_name("definitions/a/b.sqlx"), "b.sqlx");
    assert_eq!(file_name("b.sqlx"), "b.sqlx");
    assert_eq!(dir_name("definitions/a/b.sqlx"), "definitions/a");
    assert_eq!(dir_name("b.sqlx"), "");
}

#[test]
fn test_base_filename_stops_at_first_dot() {
    assert_eq!(base_filename("definitions/check.assert.sql"), "check");
    assert_eq!(base_filename("includes/helpers.jinja"), "helpers");
    assert_eq!(base_filename("noext"), "noext");
}

#[test]
fn test_file_extension() {
    assert_eq!(file_extension("definitions/check.assert.sql"), "sql");
    assert_eq!(file_extension("a/b.sqlx"), "sqlx");
    assert_eq!(file_extension("a.b/noext"), "");
}

#[test]
fn test_join_collapses_dots() {
    assert_eq!(join("definitions/sub", "./nb.ipynb"), "definitions/sub/nb.ipynb");
    assert_eq!(join("", "nb.ipynb"), "nb.ipynb");
    assert_eq!(join("a/", "/b"), "a/b");
}

#[test]
fn test_variable_name_friendly() {
    assert_eq!(variable_name_friendly("my-helpers"), "myhelpers");
    assert_eq!(variable_name_friendly("@scope/pkg"), "scopepkg");
}

#[test]
fn test_affix_validation() {
    assert!(is_valid_affix("dev_123"));
    assert!(!is_valid_affix("dev-123"));
    assert!(!is_valid_affix("feature/x"));
}

#[test]
fn test_normalize_separators() {
    assert_eq!(normalize_separators("definitions\\a.sql"), "definitions/a.sql");
}
