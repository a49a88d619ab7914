// tests/registry_count.rs

//! The running-worker counter is process-global, so everything that
//! observes it lives in this one test to keep other binaries from
//! perturbing the count.

use std::time::Duration;

use sysworker::events::EventQueue;
use sysworker::worker::registry::num_running;
use sysworker::worker::ProcessWorker;
use sysworker_test_utils::{ScriptedLauncher, init_tracing, with_timeout};

async fn wait_for_count(expected: usize) {
    with_timeout(async {
        while num_running() != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
}

#[tokio::test]
async fn counter_tracks_worker_lifecycles() {
    init_tracing();

    let base = num_running();

    // A running worker bumps the counter once its child has started.
    let (queue, _rx) = EventQueue::channel();
    let (launcher, _handle) = ScriptedLauncher::builder().stay_running().build();
    let worker =
        ProcessWorker::spawn_with_launcher("counted", None, queue, Box::new(launcher));
    assert!(worker.is_running(true).await);
    wait_for_count(base + 1).await;

    // Termination releases the slot.
    worker.force_kill().await;
    assert!(with_timeout(worker.wait_for_termination(None)).await);
    wait_for_count(base).await;

    // A worker whose startup fails never counts.
    let (queue, _rx) = EventQueue::channel();
    let (launcher, _handle) = ScriptedLauncher::builder().fail_start().build();
    let failed =
        ProcessWorker::spawn_with_launcher("uncounted", None, queue, Box::new(launcher));
    assert!(!failed.is_running(true).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(num_running(), base);
}
