// tests/exec_command.rs

//! Tests for the run-to-completion helper.

#![cfg(unix)]

use std::path::Path;

use sysworker::errors::WorkerError;
use sysworker::exec::exec_command;
use sysworker_test_utils::{init_tracing, with_timeout};

#[tokio::test]
async fn echo_collects_stdout_and_exit_status() {
    init_tracing();

    let outcome = with_timeout(exec_command("echo hello", None, None))
        .await
        .expect("echo runs");
    assert_eq!(outcome.exit_status, 0);
    assert!(!outcome.forced);
    assert_eq!(outcome.stdout, b"hello\n");
    assert!(outcome.stderr.is_empty());
}

#[tokio::test]
async fn input_is_fed_to_stdin() {
    init_tracing();

    let outcome = with_timeout(exec_command("cat", Some(b"ping"), None))
        .await
        .expect("cat runs");
    assert_eq!(outcome.stdout, b"ping");
    assert_eq!(outcome.exit_status, 0);
}

#[tokio::test]
async fn missing_executable_is_a_startup_error() {
    init_tracing();

    let err = with_timeout(exec_command("/no/such/binary", None, None))
        .await
        .expect_err("startup must fail");
    assert!(matches!(err, WorkerError::StartupFailed(_)));
}

#[tokio::test]
async fn quoted_arguments_reach_the_child_as_one_argument() {
    init_tracing();

    let outcome = with_timeout(exec_command("sh -c \"exit 3\"", None, None))
        .await
        .expect("sh runs");
    assert_eq!(outcome.exit_status, 3);
}

#[tokio::test]
async fn working_dir_is_applied_to_the_child() {
    init_tracing();

    let dir = tempfile::tempdir().expect("tempdir");
    let outcome = with_timeout(exec_command("pwd", None, Some(dir.path().to_path_buf())))
        .await
        .expect("pwd runs");
    assert_eq!(outcome.exit_status, 0);

    let reported = String::from_utf8(outcome.stdout).expect("utf8 path");
    let reported = Path::new(reported.trim()).canonicalize().expect("canonical");
    let expected = dir.path().canonicalize().expect("canonical");
    assert_eq!(reported, expected);
}

#[tokio::test]
async fn stderr_is_collected_separately() {
    init_tracing();

    let outcome = with_timeout(exec_command("sh -c \"echo out; echo err >&2\"", None, None))
        .await
        .expect("sh runs");
    assert_eq!(outcome.stdout, b"out\n");
    assert_eq!(outcome.stderr, b"err\n");
}
