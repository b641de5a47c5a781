// tests/process_runner.rs

mod common;
use crate::common::fakes::RecordingConsole;
use crate::common::{init_tracing, with_timeout};

use std::sync::Arc;

use devtask::errors::DevtaskError;
use devtask::exec::{
    CapturedOutput, ProcessRegistry, ProcessRunner, RunEvent, RunSpec, RunStatus,
};
use tempfile::TempDir;

fn runner_with_console() -> (ProcessRunner, RecordingConsole) {
    init_tracing();
    let console = RecordingConsole::new();
    let runner = ProcessRunner::new(ProcessRegistry::new(), Arc::new(console.clone()));
    (runner, console)
}

#[tokio::test]
async fn test_success_captures_stdout_in_order() {
    let (runner, _console) = runner_with_console();

    let result = with_timeout(runner.run(&RunSpec::shell("echo hello; echo world")))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert!(result.success());
    assert_eq!(
        result.output,
        CapturedOutput::Inline(b"hello\nworld\n".to_vec())
    );
}

#[tokio::test]
async fn test_success_captures_both_streams() {
    let (runner, _console) = runner_with_console();

    let result = with_timeout(runner.run(&RunSpec::shell(
        "echo out-1; echo err-1 1>&2; echo out-2; echo err-2 1>&2",
    )))
    .await
    .unwrap();

    assert!(result.success());
    let text = result.output.text().unwrap();
    assert_eq!(text.len(), "out-1\nerr-1\nout-2\nerr-2\n".len());

    // Within one stream the order is preserved.
    let out1 = text.find("out-1").unwrap();
    let out2 = text.find("out-2").unwrap();
    let err1 = text.find("err-1").unwrap();
    let err2 = text.find("err-2").unwrap();
    assert!(out1 < out2);
    assert!(err1 < err2);
}

#[tokio::test]
async fn test_non_zero_exit_reports_cwd_and_command() {
    let (runner, _console) = runner_with_console();
    let dir = TempDir::new().unwrap();
    let resolved = std::fs::canonicalize(dir.path()).unwrap();

    let spec = RunSpec::shell("echo failing; exit 3").cwd(dir.path());
    let result = with_timeout(runner.run(&spec)).await.unwrap();

    assert_eq!(result.status, RunStatus::Exited(3));
    assert_eq!(result.cwd, resolved);

    let err = result.clone().into_result().unwrap_err();
    match &err {
        DevtaskError::NonZeroExit { code, command, cwd } => {
            assert_eq!(*code, 3);
            assert_eq!(command, "echo failing; exit 3");
            assert_eq!(cwd, &resolved);
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }

    let message = err.to_string();
    assert!(message.contains(&resolved.display().to_string()));
    assert!(message.contains("echo failing; exit 3"));
    assert!(message.contains("Exit 3"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_signal_termination_is_distinct_and_published() {
    let (runner, _console) = runner_with_console();

    let mut handle = runner.start(&RunSpec::shell("kill -9 $$")).await.unwrap();
    let mut events = handle.take_events().unwrap();
    assert!(handle.take_events().is_none());

    let result = with_timeout(handle.wait()).await.unwrap();
    assert_eq!(result.status, RunStatus::Signaled(9));
    assert!(matches!(
        result.failure(),
        Some(DevtaskError::SignalTermination { signal: 9, .. })
    ));

    let mut seen = Vec::new();
    while let Ok(event) = events.recv().await {
        seen.push(event);
    }
    let failed_at = seen
        .iter()
        .position(|e| matches!(e, RunEvent::Failed { status: RunStatus::Signaled(9), .. }))
        .expect("failure event published");
    let exited_at = seen
        .iter()
        .position(|e| matches!(e, RunEvent::Exited(RunStatus::Signaled(9))))
        .expect("exit event published");
    assert!(failed_at < exited_at);
}

#[tokio::test]
async fn test_success_publishes_no_failure_event() {
    let (runner, _console) = runner_with_console();

    let mut handle = runner.start(&RunSpec::shell("echo ok")).await.unwrap();
    let mut events = handle.take_events().unwrap();
    with_timeout(handle.wait()).await.unwrap();

    let mut output = Vec::new();
    while let Ok(event) = events.recv().await {
        match event {
            RunEvent::Failed { .. } => panic!("unexpected failure event"),
            RunEvent::Output(chunk) => output.extend(chunk.data),
            RunEvent::Exited(status) => assert_eq!(status, RunStatus::Success),
        }
    }
    assert_eq!(output, b"ok\n");
}

#[tokio::test]
async fn test_launch_failure_is_immediate_error() {
    let (runner, console) = runner_with_console();

    let spec = RunSpec::program("/definitely/not/a/real/program", ["--flag"]);
    let err = runner.run(&spec).await.unwrap_err();

    match err {
        DevtaskError::Launch { command, .. } => {
            assert_eq!(command, "/definitely/not/a/real/program --flag");
        }
        other => panic!("expected Launch error, got {other:?}"),
    }
    // The banner is still logged before the launch attempt.
    assert_eq!(console.lines().len(), 1);
    assert!(runner.registry().is_empty());
}

#[tokio::test]
async fn test_banner_and_title_prefixed_lines() {
    let (runner, console) = runner_with_console();
    let dir = TempDir::new().unwrap();
    let resolved = std::fs::canonicalize(dir.path()).unwrap();

    let spec = RunSpec::shell("printf 'one\\ntwo\\n'")
        .cwd(dir.path())
        .title("build");
    with_timeout(runner.run(&spec)).await.unwrap();

    let lines = console.lines();
    assert_eq!(
        lines[0],
        format!("[{}] printf 'one\\ntwo\\n'", resolved.display())
    );
    assert_eq!(&lines[1..], &["build | one".to_string(), "build | two".to_string()]);
}

#[tokio::test]
async fn test_log_file_truncated_by_default() {
    let (runner, console) = runner_with_console();
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("run.log");
    std::fs::write(&log, "old\n").unwrap();

    let spec = RunSpec::shell("echo new").log(&log).console(false);
    let result = with_timeout(runner.run(&spec)).await.unwrap();

    assert_eq!(result.output, CapturedOutput::Persisted(log.clone()));
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "new\n");
    assert_eq!(result.output.text().unwrap(), "new\n");
    // Only the banner: console mirroring is off.
    assert_eq!(console.lines().len(), 1);
}

#[tokio::test]
async fn test_log_file_append_mode_keeps_previous_output() {
    let (runner, console) = runner_with_console();
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("run.log");
    std::fs::write(&log, "old\n").unwrap();

    let spec = RunSpec::shell("echo new").log(&log).append_log(true);
    with_timeout(runner.run(&spec)).await.unwrap();

    assert_eq!(std::fs::read_to_string(&log).unwrap(), "old\nnew\n");
    assert!(console.lines().contains(&"new".to_string()));
}

#[tokio::test]
async fn test_env_overrides_are_applied() {
    let (runner, _console) = runner_with_console();

    let spec = RunSpec::shell("echo \"$DEVTASK_TEST_VALUE\"").env("DEVTASK_TEST_VALUE", "from-spec");
    let result = with_timeout(runner.run(&spec)).await.unwrap();

    assert_eq!(result.output.text().unwrap(), "from-spec\n");
}

#[tokio::test]
async fn test_direct_program_without_shell() {
    let (runner, _console) = runner_with_console();

    let spec = RunSpec::program("echo", ["a b", "c"]);
    assert_eq!(spec.command_line(), "echo 'a b' c");

    let result = with_timeout(runner.run(&spec)).await.unwrap();
    assert_eq!(result.output.text().unwrap(), "a b c\n");
}

#[tokio::test]
async fn test_invalid_specs_are_rejected_before_launch() {
    let (runner, console) = runner_with_console();

    let err = runner.run(&RunSpec::shell("   ")).await.unwrap_err();
    assert!(matches!(err, DevtaskError::InvalidSpec(_)));

    let dir = TempDir::new().unwrap();
    let spec = RunSpec::shell("echo hi").log(dir.path().join("missing").join("run.log"));
    let err = runner.run(&spec).await.unwrap_err();
    assert!(matches!(err, DevtaskError::InvalidSpec(msg) if msg.contains("does not exist")));

    assert!(console.lines().is_empty());
}

#[tokio::test]
async fn test_process_is_registered_only_while_running() {
    let (runner, _console) = runner_with_console();

    let handle = runner.start(&RunSpec::shell("sleep 0.3").title("sleeper")).await.unwrap();
    let live = runner.registry().snapshot();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].label, "sleeper");
    assert_eq!(Some(live[0].pid), handle.pid());

    with_timeout(handle.wait()).await.unwrap();
    assert!(runner.registry().is_empty());
}

#[tokio::test]
async fn test_concurrent_runs_keep_separate_output() {
    let (runner, _console) = runner_with_console();

    let a = RunSpec::shell("echo alpha");
    let b = RunSpec::shell("echo beta");
    let (ra, rb) = with_timeout(async { tokio::join!(runner.run(&a), runner.run(&b)) }).await;

    assert_eq!(ra.unwrap().output.text().unwrap(), "alpha\n");
    assert_eq!(rb.unwrap().output.text().unwrap(), "beta\n");
}

#[cfg(unix)]
#[tokio::test]
async fn test_run_ends_when_child_exits_even_if_descendant_holds_pipes() {
    let (runner, _console) = runner_with_console();

    let started = std::time::Instant::now();
    let handle = runner
        .start(&RunSpec::shell("sleep 3 & echo started"))
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    assert!(runner.registry().is_empty());

    let result = with_timeout(handle.wait()).await.unwrap();
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.output.text().unwrap(), "started\n");
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
}
