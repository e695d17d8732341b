use super::*;
use tempfile::TempDir;

#[test]
fn test_select_current_without_declared_version() {
    let library = CoreLibrary::select(None);
    assert_eq!(library.version, CORE_VERSION);
    assert!(library.has_entry_points());
}

#[test]
fn test_select_matching_version() {
    assert_eq!(CoreLibrary::select(Some(CORE_VERSION)).version, CORE_VERSION);
    let legacy = CoreLibrary::select(Some(LEGACY_CORE_VERSION));
    assert_eq!(legacy.version, LEGACY_CORE_VERSION);
    assert!(!legacy.has_entry_points());
}

#[test]
fn test_unknown_version_selects_current() {
    assert_eq!(CoreLibrary::select(Some("9.9.9")).version, CORE_VERSION);
}

#[test]
fn test_strict_mode_rejects_library_without_entry_points() {
    let legacy = CoreLibrary::select(Some(LEGACY_CORE_VERSION));
    let err = legacy
        .entry_points(EntryPointMode::Strict, false)
        .unwrap_err();
    assert!(matches!(err, SandboxError::MissingEntryPoints { .. }));
    assert!(err.to_string().contains("Missing or outdated core package"));
}

#[test]
fn test_fallback_uses_legacy_compiler() {
    let legacy = CoreLibrary::select(Some(LEGACY_CORE_VERSION));
    let entry_points = legacy
        .entry_points(EntryPointMode::FallbackToLegacy, false)
        .unwrap();
    assert!((entry_points.compiler)("definitions/a.sqlx", "select 1").is_err());
    assert!((entry_points.compiler)("definitions/a.sql", "select 1").is_ok());
}

#[test]
fn test_force_legacy_overrides_current_entry_points() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join("definitions")).unwrap();
    std::fs::write(temp.path().join("definitions/a.sqlx"), "select 1").unwrap();

    let current = CoreLibrary::current();
    let strict = current.entry_points(EntryPointMode::Strict, true).unwrap();
    let index = (strict.index_generator)(temp.path(), None).unwrap();
    assert!(index.definition_paths.is_empty());

    let normal = current.entry_points(EntryPointMode::Strict, false).unwrap();
    let index = (normal.index_generator)(temp.path(), None).unwrap();
    assert_eq!(index.definition_paths, vec!["definitions/a.sqlx"]);
}

#[test]
fn test_entry_point_mode_serde() {
    assert_eq!(
        serde_json::to_string(&EntryPointMode::FallbackToLegacy).unwrap(),
        "\"fallbackToLegacy\""
    );
    let mode: EntryPointMode = serde_json::from_str("\"strict\"").unwrap();
    assert_eq!(mode, EntryPointMode::Strict);
    assert_eq!(EntryPointMode::default(), EntryPointMode::FallbackToLegacy);
}
