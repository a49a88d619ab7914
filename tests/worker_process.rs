// tests/worker_process.rs

//! End-to-end worker tests against real child processes. Unix only: they
//! rely on `cat`, `sleep`, `pwd` and `kill -0`.

#![cfg(unix)]

use std::time::Duration;

use sysworker::events::{EventPayload, EventQueue, TerminationInfo, WorkerEvent};
use sysworker::worker::ProcessWorker;
use sysworker_test_utils::{init_tracing, with_timeout};
use tokio::sync::mpsc::UnboundedReceiver;

/// Drain events until the termination event, accumulating output.
async fn collect_until_termination(
    rx: &mut UnboundedReceiver<WorkerEvent>,
) -> (Vec<u8>, Vec<u8>, TerminationInfo) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    loop {
        let event = with_timeout(rx.recv()).await.expect("event before queue close");
        match event.payload {
            EventPayload::StdoutData(bytes) => stdout.extend_from_slice(&bytes),
            EventPayload::StderrData(bytes) => stderr.extend_from_slice(&bytes),
            EventPayload::Termination(info) => return (stdout, stderr, info),
        }
    }
}

fn pid_is_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn cat_echoes_stdin_and_exits_naturally() {
    init_tracing();

    let (queue, mut rx) = EventQueue::channel();
    let worker = ProcessWorker::spawn("cat", None, queue);

    assert!(worker.is_running(true).await);
    assert_eq!(worker.write(b"abc").await, 3);
    worker.close_input().await;

    let (stdout, stderr, info) = collect_until_termination(&mut rx).await;
    assert_eq!(stdout, b"abc");
    assert!(stderr.is_empty());
    assert!(info.has_started);
    assert!(!info.forced);
    assert_eq!(info.exit_status, 0);
    assert!(info.pid.is_some());
}

#[tokio::test]
async fn missing_executable_fails_startup() {
    init_tracing();

    let (queue, mut rx) = EventQueue::channel();
    let worker = ProcessWorker::spawn("/definitely/not/a/real/binary --flag", None, queue);

    assert!(!worker.is_running(true).await);
    let status = worker.status().await;
    assert!(!status.has_started);
    assert!(status.is_terminated);

    let (_, _, info) = collect_until_termination(&mut rx).await;
    assert!(!info.has_started);
    assert_eq!(info.pid, None);
}

#[tokio::test]
async fn force_kill_terminates_a_long_sleep_promptly() {
    init_tracing();

    let (queue, mut rx) = EventQueue::channel();
    let worker = ProcessWorker::spawn("sleep 30", None, queue);

    assert!(worker.is_running(true).await);
    worker.force_kill().await;

    let (_, _, info) = with_timeout(collect_until_termination(&mut rx)).await;
    assert!(info.has_started);
    assert!(info.forced);
    assert!(!worker.is_running(false).await);
}

#[tokio::test]
async fn graceful_request_lets_cat_exit_on_stdin_eof() {
    init_tracing();

    let (queue, mut rx) = EventQueue::channel();
    let worker = ProcessWorker::spawn("cat", None, queue);

    assert!(worker.is_running(true).await);
    with_timeout(worker.request_termination(true)).await;

    let (_, _, info) = collect_until_termination(&mut rx).await;
    assert!(info.has_started);
}

#[tokio::test]
async fn dispose_kills_the_underlying_child() {
    init_tracing();

    let (queue, mut rx) = EventQueue::channel();
    let worker = ProcessWorker::spawn("sleep 30", None, queue);

    assert!(worker.is_running(true).await);
    let pid = worker.status().await.pid.expect("running child has a pid");
    assert!(pid_is_alive(pid));

    worker.dispose().await;
    drop(worker);

    with_timeout(async {
        while pid_is_alive(pid) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    // Disposal suppresses the termination event; the queue either closes
    // quietly or stays silent.
    match tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        Ok(Some(event)) => panic!("event published after disposal: {:?}", event.payload),
        Ok(None) | Err(_) => {}
    }
}

#[tokio::test]
async fn stderr_from_the_child_arrives_as_stderr_events() {
    init_tracing();

    let (queue, mut rx) = EventQueue::channel();
    let worker = ProcessWorker::spawn("sh -c \"echo warn >&2; exit 2\"", None, queue);

    assert!(worker.is_running(true).await);
    let (stdout, stderr, info) = collect_until_termination(&mut rx).await;
    assert!(stdout.is_empty());
    assert_eq!(stderr, b"warn\n");
    assert_eq!(info.exit_status, 2);
}
