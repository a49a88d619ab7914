// src/worker/mod.rs

//! The asynchronous external-process worker.
//!
//! A `ProcessWorker` owns one launcher (one child process) and one pump
//! task. The pump task drains the child's stdout/stderr into the event
//! queue and publishes a single termination event when the child goes
//! away; the owning context concurrently writes to the child, requests
//! termination, or waits for it.
//!
//! Cross-thread disposal safety comes from shared ownership: the pump task
//! holds its own `Arc<ProcessWorker>` for its whole run, so a caller
//! dropping (or disposing) the worker can never free state the pump still
//! touches. Disposal flips `panic_termination` under the state mutex,
//! which suppresses the termination event, then kills any live child.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

use crate::events::{EventPayload, EventQueue, TerminationInfo, WorkerEvent, WorkerId};
use crate::launcher::{CommandLauncher, ProcessLauncher};

mod pump;
pub mod registry;

/// Size of one stdin write slice. Writes larger than this are cut into
/// slices and issued as separate launcher calls under the state mutex.
pub const WRITE_SLICE_SIZE: usize = 1024;

/// Size of the pump loop's read buffer.
pub const READ_BUFFER_SIZE: usize = 4096;

/// How long the pump loop sleeps when an iteration produced no data and
/// the child is still alive.
pub const POLLING_INTERVAL: Duration = Duration::from_millis(10);

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// One-shot startup resolution, readable by any number of waiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupStatus {
    Pending,
    Started,
    Failed,
}

/// Snapshot returned by [`ProcessWorker::status`].
#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub command_line: String,
    pub has_started: bool,
    pub is_terminated: bool,
    pub pid: Option<u32>,
}

/// Mutable worker state. One mutex guards the flags *and* every launcher
/// IO call; it is never held across an event publish or a termination
/// wait.
pub(crate) struct WorkerState {
    pub(crate) launcher: Box<dyn ProcessLauncher>,
    pub(crate) terminated: bool,
    pub(crate) termination_requested: bool,
    pub(crate) forced_termination: bool,
    pub(crate) panic_termination: bool,
    pub(crate) exit_status: i32,
    pub(crate) pid: Option<u32>,
}

pub struct ProcessWorker {
    id: WorkerId,
    command_line: String,
    working_dir: Option<PathBuf>,
    pub(crate) state: Mutex<WorkerState>,
    pub(crate) startup_tx: watch::Sender<StartupStatus>,
    pub(crate) termination_tx: watch::Sender<Option<TerminationInfo>>,
    pub(crate) events: EventQueue,
}

impl ProcessWorker {
    /// Spawn a worker for `command_line` using the production launcher.
    ///
    /// The pump task starts immediately and holds its own reference to the
    /// returned worker until it exits.
    pub fn spawn(
        command_line: impl Into<String>,
        working_dir: Option<PathBuf>,
        events: EventQueue,
    ) -> Arc<Self> {
        let command_line = command_line.into();
        let launcher = CommandLauncher::new(command_line.clone(), working_dir.clone());
        Self::spawn_with_launcher(command_line, working_dir, events, Box::new(launcher))
    }

    /// Spawn a worker with an injected launcher (tests use a scripted one).
    pub fn spawn_with_launcher(
        command_line: impl Into<String>,
        working_dir: Option<PathBuf>,
        events: EventQueue,
        launcher: Box<dyn ProcessLauncher>,
    ) -> Arc<Self> {
        let (startup_tx, _) = watch::channel(StartupStatus::Pending);
        let (termination_tx, _) = watch::channel(None);

        let worker = Arc::new(Self {
            id: NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed),
            command_line: command_line.into(),
            working_dir,
            state: Mutex::new(WorkerState {
                launcher,
                terminated: false,
                termination_requested: false,
                forced_termination: false,
                panic_termination: false,
                exit_status: 0,
                pid: None,
            }),
            startup_tx,
            termination_tx,
            events,
        });

        // The pump task's clone is what keeps the worker alive while the
        // loop may still dereference it, independent of the caller's Arc.
        let pump_worker = Arc::clone(&worker);
        tokio::spawn(pump::run(pump_worker));

        worker
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }

    /// Write bytes to the child's stdin.
    ///
    /// Blocks until startup status is known; returns 0 without writing if
    /// the process never started or already terminated. Data goes out in
    /// [`WRITE_SLICE_SIZE`] slices, each driven to completion under the
    /// state mutex — a launcher accepting fewer bytes per call (pipe
    /// backpressure) just gets the remainder again. If any write fails or
    /// makes no progress the whole call reports 0 — callers cannot observe
    /// partial success; the partial count is only logged.
    pub async fn write(&self, bytes: &[u8]) -> usize {
        if !self.is_running(true).await {
            return 0;
        }

        let mut total_written = 0usize;
        for slice in bytes.chunks(WRITE_SLICE_SIZE) {
            let mut state = self.state.lock().await;
            let mut offset = 0usize;
            while offset < slice.len() {
                match state.launcher.write_stdin(&slice[offset..]).await {
                    Ok(n) if n > 0 => {
                        offset += n;
                        total_written += n;
                    }
                    Ok(_) => {
                        warn!(
                            worker = self.id,
                            bytes_written = total_written,
                            "stdin write made no progress; reporting zero bytes written"
                        );
                        return 0;
                    }
                    Err(e) => {
                        warn!(
                            worker = self.id,
                            bytes_written = total_written,
                            error = %e,
                            "stdin write failed; reporting zero bytes written"
                        );
                        return 0;
                    }
                }
            }
        }
        total_written
    }

    /// Close the child's stdin pipe. Idempotent; a no-op when the process
    /// was never confirmed started.
    pub async fn close_input(&self) {
        if self.is_running(true).await {
            let mut state = self.state.lock().await;
            state.launcher.close_stdin().await;
        }
    }

    /// Ask the child to terminate gracefully.
    ///
    /// Closes stdin first (a child blocked reading it will see EOF and can
    /// wind down), then flags the pump loop to shut the launcher down on
    /// its next iteration. With `wait`, this call additionally blocks
    /// until the termination event has been recorded. Any number of
    /// concurrent waiters is fine: all of them resolve once the single
    /// termination event exists.
    pub async fn request_termination(&self, wait: bool) {
        if !self.is_running(true).await {
            return;
        }

        {
            let mut state = self.state.lock().await;
            state.launcher.close_stdin().await;
            state.termination_requested = true;
        }

        if wait {
            self.wait_for_termination(None).await;
        }
    }

    /// Kill the child immediately.
    ///
    /// Under the mutex: if not already terminated and the launcher still
    /// reports the child alive, shut it down forcefully and mark the
    /// worker terminated with `forced_termination`. The pump loop observes
    /// the flag at the top of its next iteration and exits. Idempotent.
    pub async fn force_kill(&self) {
        let mut state = self.state.lock().await;
        if !state.terminated && state.launcher.is_running().await {
            state.launcher.shutdown(true).await;
            state.forced_termination = true;
            state.terminated = true;
            debug!(worker = self.id, "force kill issued");
        }
    }

    /// Atomic status snapshot.
    pub async fn status(&self) -> WorkerStatus {
        let state = self.state.lock().await;
        WorkerStatus {
            command_line: self.command_line.clone(),
            has_started: *self.startup_tx.borrow() == StartupStatus::Started,
            is_terminated: state.terminated,
            pid: state.pid,
        }
    }

    /// Wait until this worker's termination event has been recorded.
    ///
    /// `None` waits forever. Returns true when termination was observed
    /// within the bound. The recorded event is retained rather than
    /// consumed, so late and repeated calls resolve immediately — even
    /// when the event-queue consumer went away before the terminal event
    /// could be delivered.
    pub async fn wait_for_termination(&self, timeout: Option<Duration>) -> bool {
        let mut rx = self.termination_tx.subscribe();
        if rx.borrow().is_some() {
            return true;
        }

        match timeout {
            None => {
                // The sender lives in self, so changed() only fails if the
                // worker itself is being torn down mid-wait.
                while rx.changed().await.is_ok() {
                    if rx.borrow().is_some() {
                        return true;
                    }
                }
                false
            }
            Some(bound) => {
                match tokio::time::timeout(bound, rx.changed()).await {
                    Ok(Ok(())) => rx.borrow().is_some(),
                    _ => false,
                }
            }
        }
    }

    /// The termination event recorded for this worker, if any.
    pub fn termination_info(&self) -> Option<TerminationInfo> {
        self.termination_tx.borrow().clone()
    }

    /// Wait until startup has resolved, returning whether the child
    /// process actually started.
    ///
    /// Unlike [`is_running`](Self::is_running) this stays true for a child
    /// that has since exited, so callers can tell a fast-exiting command
    /// apart from one that never launched.
    pub async fn wait_for_startup(&self) -> bool {
        let mut rx = self.startup_tx.subscribe();
        loop {
            let status = *rx.borrow();
            match status {
                StartupStatus::Started => return true,
                StartupStatus::Failed => return false,
                StartupStatus::Pending => {
                    if rx.changed().await.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    /// Whether the child process is (still) running.
    ///
    /// - startup resolved Failed: false.
    /// - startup resolved Started: true until terminated.
    /// - startup Pending: waits for resolution when `wait_for_startup`,
    ///   otherwise optimistically true (it cannot have failed yet).
    pub async fn is_running(&self, wait_for_startup: bool) -> bool {
        let mut rx = self.startup_tx.subscribe();
        loop {
            let status = *rx.borrow();
            match status {
                StartupStatus::Started => {
                    let state = self.state.lock().await;
                    return !state.terminated;
                }
                StartupStatus::Failed => return false,
                StartupStatus::Pending => {
                    if !wait_for_startup {
                        return true;
                    }
                    if rx.changed().await.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    /// Tear the worker down from a context that no longer cares about it
    /// (owner dropped, surrounding context being destroyed).
    ///
    /// Sets `panic_termination` first — from that point on no termination
    /// event will ever be published — then applies force-kill semantics so
    /// no orphaned child outlives the worker. The caller drops its `Arc`
    /// afterwards; the worker is freed once the pump task has dropped its
    /// own reference too, whichever happens last.
    pub async fn dispose(&self) {
        {
            let mut state = self.state.lock().await;
            state.panic_termination = true;
        }
        self.force_kill().await;
        debug!(worker = self.id, "worker disposed");
    }

    /// Publish one output event, transferring buffer ownership to it.
    pub(crate) fn publish_output(&self, payload: EventPayload) {
        let delivered = self.events.publish(WorkerEvent {
            worker: self.id,
            payload,
        });
        if !delivered {
            debug!(worker = self.id, "output event dropped; consumer gone");
        }
    }
}

impl std::fmt::Debug for ProcessWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessWorker")
            .field("id", &self.id)
            .field("command_line", &self.command_line)
            .finish_non_exhaustive()
    }
}
