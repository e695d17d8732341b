use super::*;

#[test]
fn test_worker_command_for_current_exe() {
    let command = WorkerCommand::current_exe().unwrap().arg("--verbose");
    assert_eq!(
        command.args,
        vec![WORKER_SUBCOMMAND.to_string(), "--verbose".to_string()]
    );
}

#[test]
fn test_default_timeout() {
    let host = CompileHost::new(WorkerCommand::new("dataforge", Vec::new()));
    assert_eq!(host.timeout(), DEFAULT_TIMEOUT);
    let host = host.with_timeout(Duration::from_secs(5));
    assert_eq!(host.timeout(), Duration::from_secs(5));
}

#[tokio::test]
async fn test_spawn_failure() {
    let host = CompileHost::new(WorkerCommand::new(
        "/nonexistent/dataforge-worker",
        Vec::new(),
    ));
    let err = host
        .exchange(&CompileRequest::new("/tmp"))
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::Spawn { .. }));
}
