use super::*;
use df_core::RegistrationPayload;

fn context(kind: ActionKind, policy: UnsupportedCapabilityPolicy) -> ActionContext {
    let builder = ActionBuilder::new(kind, "orders", "definitions/orders.sql").unwrap();
    ActionContext::new(builder, false, policy, WarningCapture::default())
}

fn s(text: &str) -> Value {
    Value::from(text)
}

#[test]
fn test_ref_records_dependency_and_returns_marker() {
    let ctx = context(ActionKind::Table, UnsupportedCapabilityPolicy::Warn);
    let out = ctx.invoke("ref", &[s("customers")]).unwrap();
    assert_eq!(
        out.as_str().unwrap(),
        Deferred::Target {
            target: TargetRef::named("customers")
        }
        .encode()
    );

    ctx.with_builder(|b| b.set_query("select 1".into())).unwrap();
    let registration = ctx.finish().unwrap();
    assert_eq!(registration.dependencies, vec![TargetRef::named("customers")]);
}

#[test]
fn test_ref_with_schema_and_name() {
    let ctx = context(ActionKind::Table, UnsupportedCapabilityPolicy::Warn);
    ctx.invoke("ref", &[s("raw"), s("customers")]).unwrap();
    let mut builder = ctx.snapshot().unwrap();
    builder.set_query("x".into()).unwrap();
    let registration = builder.finish().unwrap();
    assert_eq!(registration.dependencies[0].schema.as_deref(), Some("raw"));
    assert_eq!(registration.dependencies[0].name, "customers");
}

#[test]
fn test_resolve_does_not_add_dependency() {
    let ctx = context(ActionKind::Table, UnsupportedCapabilityPolicy::Warn);
    ctx.invoke("resolve", &[s("customers")]).unwrap();
    ctx.with_builder(|b| b.set_query("x".into())).unwrap();
    assert!(ctx.finish().unwrap().dependencies.is_empty());
}

#[test]
fn test_ref_rejects_too_many_parts() {
    let ctx = context(ActionKind::Table, UnsupportedCapabilityPolicy::Warn);
    assert!(ctx.invoke("ref", &[s("a"), s("b"), s("c"), s("d")]).is_err());
    assert!(ctx.invoke("ref", &[s("")]).is_err());
}

#[test]
fn test_self_markers() {
    let ctx = context(ActionKind::Assertion, UnsupportedCapabilityPolicy::Warn);
    assert_eq!(
        ctx.invoke("self", &[]).unwrap().as_str().unwrap(),
        Deferred::SelfTarget.encode()
    );
    assert_eq!(
        ctx.invoke("schema", &[]).unwrap().as_str().unwrap(),
        Deferred::SelfSchema.encode()
    );
    assert_eq!(ctx.invoke("name", &[]).unwrap().as_str(), Some("orders"));
}

#[test]
fn test_type_and_config_on_table() {
    let ctx = context(ActionKind::Table, UnsupportedCapabilityPolicy::Warn);
    ctx.invoke("type", &[s("view")]).unwrap();
    let config = Value::from_iter([
        ("schema".to_string(), Value::from("analytics")),
        ("tags".to_string(), Value::from(vec![Value::from("daily")])),
    ]);
    ctx.invoke("config", &[config]).unwrap();

    let builder = ctx.snapshot().unwrap();
    assert_eq!(builder.table_type(), TableType::View);
    assert_eq!(builder.schema(), Some("analytics"));
}

#[test]
fn test_config_rejects_unknown_keys() {
    let ctx = context(ActionKind::Table, UnsupportedCapabilityPolicy::Warn);
    let config = Value::from_iter([("materialized".to_string(), Value::from("view"))]);
    let err = ctx.invoke("config", &[config]).unwrap_err();
    assert!(err.to_string().contains("J003"));
}

#[test]
fn test_type_rejects_unknown_value() {
    let ctx = context(ActionKind::Table, UnsupportedCapabilityPolicy::Warn);
    assert!(ctx.invoke("type", &[s("snapshot")]).is_err());
}

#[test]
fn test_when_picks_branch() {
    let ctx = context(ActionKind::Table, UnsupportedCapabilityPolicy::Warn);
    let yes = ctx
        .invoke("when", &[Value::from(true), s("a"), s("b")])
        .unwrap();
    let no = ctx.invoke("when", &[Value::from(false), s("a")]).unwrap();
    assert_eq!(yes.as_str(), Some("a"));
    assert_eq!(no.as_str(), Some(""));
}

#[test]
fn test_tags_and_disabled_reach_the_registration() {
    let ctx = context(ActionKind::Table, UnsupportedCapabilityPolicy::Error);
    ctx.invoke("tags", &[Value::from(vec![s("daily"), s("core")])])
        .unwrap();
    ctx.invoke("tags", &[s("extra")]).unwrap();
    assert_eq!(ctx.invoke("disabled", &[]).unwrap().as_str(), Some(""));
    ctx.with_builder(|b| b.set_query("select 1".into())).unwrap();
    let registration = ctx.finish().unwrap();
    assert_eq!(registration.tags, vec!["daily", "core", "extra"]);
    assert!(registration.disabled);
}

#[test]
fn test_when_on_assertion() {
    let ctx = context(ActionKind::Assertion, UnsupportedCapabilityPolicy::Error);
    let out = ctx
        .invoke("when", &[Value::from(true), s("a = 1"), s("b = 2")])
        .unwrap();
    assert_eq!(out.as_str(), Some("a = 1"));
}

#[test]
fn test_incremental_flag() {
    let builder = ActionBuilder::new(ActionKind::Table, "t", "definitions/t.sql").unwrap();
    let ctx = ActionContext::new(
        builder,
        true,
        UnsupportedCapabilityPolicy::Warn,
        WarningCapture::default(),
    );
    assert!(ctx.invoke("incremental", &[]).unwrap().is_true());
}

#[test]
fn test_pre_and_post_ops() {
    let ctx = context(ActionKind::Table, UnsupportedCapabilityPolicy::Warn);
    ctx.invoke("preOps", &[s("set x = 1")]).unwrap();
    ctx.invoke("postOps", &[Value::from(vec![s("a"), s("b")])])
        .unwrap();
    ctx.with_builder(|b| b.set_query("select 1".into())).unwrap();
    match ctx.finish().unwrap().payload {
        RegistrationPayload::Table {
            pre_ops, post_ops, ..
        } => {
            assert_eq!(pre_ops, vec!["set x = 1".to_string()]);
            assert_eq!(post_ops, vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn test_describe_returns_column_name() {
    let ctx = context(ActionKind::Table, UnsupportedCapabilityPolicy::Warn);
    let out = ctx.invoke("describe", &[s("id"), s("primary key")]).unwrap();
    assert_eq!(out.as_str(), Some("id"));
    ctx.with_builder(|b| b.set_query("select 1".into())).unwrap();
    let registration = ctx.finish().unwrap();
    assert_eq!(
        registration.descriptor.columns.get("id"),
        Some(&ColumnDoc::Description("primary key".into()))
    );
}

#[test]
fn test_unsupported_warn_records_warning_once() {
    let ctx = context(ActionKind::Assertion, UnsupportedCapabilityPolicy::Warn);
    assert_eq!(ctx.invoke("config", &[]).unwrap().as_str(), Some(""));
    ctx.invoke("config", &[]).unwrap();
    let warnings = ctx.warnings();
    let warnings = warnings.lock().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("config() is not available in assertion actions"));
}

#[test]
fn test_unsupported_silent_is_quiet() {
    let ctx = context(ActionKind::Assertion, UnsupportedCapabilityPolicy::Silent);
    assert_eq!(ctx.invoke("where", &[s("x")]).unwrap().as_str(), Some(""));
    assert!(ctx.warnings().lock().unwrap().is_empty());
}

#[test]
fn test_unsupported_error_fails() {
    let ctx = context(ActionKind::Operation, UnsupportedCapabilityPolicy::Error);
    let err = ctx.invoke("preOps", &[s("x")]).unwrap_err();
    assert!(err.to_string().contains("J004"));
}

#[test]
fn test_has_output_only_on_operations() {
    let op = context(ActionKind::Operation, UnsupportedCapabilityPolicy::Error);
    op.invoke("hasOutput", &[Value::from(true)]).unwrap();

    let table = context(ActionKind::Table, UnsupportedCapabilityPolicy::Error);
    assert!(table.invoke("hasOutput", &[Value::from(true)]).is_err());
}

#[test]
fn test_target_ref_from_map() {
    let map = Value::from_iter([
        ("schema".to_string(), Value::from("raw")),
        ("name".to_string(), Value::from("events")),
    ]);
    let target = target_ref(&[map]).unwrap();
    assert_eq!(target.schema.as_deref(), Some("raw"));
    assert_eq!(target.name, "events");
}
