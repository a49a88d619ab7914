// src/exec.rs

//! Run-to-completion convenience on top of [`ProcessWorker`].
//!
//! For callers that just want "run this command, give me its output and
//! exit status" without managing a worker and an event queue themselves.

use std::path::PathBuf;

use tracing::debug;

use crate::errors::{Result, WorkerError};
use crate::events::{EventPayload, EventQueue};
use crate::worker::ProcessWorker;

/// Collected result of a completed command.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    /// Child exit status. Only meaningful when `forced` is false.
    pub exit_status: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// True when the child was killed rather than exiting on its own.
    pub forced: bool,
}

/// Run `command_line` to completion, optionally feeding `input` to its
/// stdin, and collect everything it writes.
///
/// Startup failure (missing executable, bad working directory) is an
/// error; a child that starts and exits nonzero is a normal outcome with
/// that status.
pub async fn exec_command(
    command_line: &str,
    input: Option<&[u8]>,
    working_dir: Option<PathBuf>,
) -> Result<ExecOutcome> {
    let (queue, mut rx) = EventQueue::channel();
    let worker = ProcessWorker::spawn(command_line, working_dir, queue);

    // Gate on startup, not liveness: a fast command may already have
    // exited by now, and that is a normal outcome.
    if !worker.wait_for_startup().await {
        return Err(WorkerError::StartupFailed(command_line.to_string()));
    }

    if let Some(bytes) = input {
        let written = worker.write(bytes).await;
        debug!(requested = bytes.len(), written, "fed exec input to child");
    }
    worker.close_input().await;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    while let Some(event) = rx.recv().await {
        match event.payload {
            EventPayload::StdoutData(bytes) => stdout.extend_from_slice(&bytes),
            EventPayload::StderrData(bytes) => stderr.extend_from_slice(&bytes),
            EventPayload::Termination(info) => {
                return Ok(ExecOutcome {
                    exit_status: info.exit_status,
                    stdout,
                    stderr,
                    forced: info.forced,
                });
            }
        }
    }

    // The pump always publishes a termination event unless the worker was
    // disposed, which this function never does.
    Err(WorkerError::EventQueueClosed)
}
