// src/worker/pump.rs

//! The pump loop: one background task per worker.
//!
//! Starts the child, then repeatedly drains stdout/stderr into the event
//! queue until the child terminates (on its own, or because termination
//! was requested). Draining is prioritised over termination detection:
//! liveness is only consulted on iterations that produced no data, so a
//! fast-exiting child's final burst of output is never dropped.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::events::{EventPayload, TerminationInfo, WorkerEvent};
use crate::worker::{POLLING_INTERVAL, ProcessWorker, READ_BUFFER_SIZE, StartupStatus, registry};

/// Body of the pump task. The `Arc` passed in is the task's own reference
/// to the worker; dropping it on return is what allows a disposed worker
/// to actually be freed.
pub(crate) async fn run(worker: Arc<ProcessWorker>) {
    // Entry guard: the owner may have disposed the worker before this task
    // ever got scheduled. Don't launch, don't publish; resolve startup so
    // no is_running(true) caller is left hanging.
    {
        let state = worker.state.lock().await;
        if state.panic_termination {
            debug!(worker = worker.id(), "disposed before launch; pump exiting");
            drop(state);
            worker.startup_tx.send_replace(StartupStatus::Failed);
            return;
        }
    }

    let started = {
        let mut state = worker.state.lock().await;
        match state.launcher.start().await {
            Ok(()) => {
                state.pid = state.launcher.pid();
                info!(
                    worker = worker.id(),
                    cmd = %worker.command_line(),
                    pid = ?state.pid,
                    "child process started"
                );
                true
            }
            Err(e) => {
                warn!(
                    worker = worker.id(),
                    cmd = %worker.command_line(),
                    error = %e,
                    "failed to start child process"
                );
                state.terminated = true;
                false
            }
        }
    };

    worker.startup_tx.send_replace(if started {
        StartupStatus::Started
    } else {
        StartupStatus::Failed
    });

    if started {
        registry::increment();
        drain_until_terminated(&worker).await;
        registry::decrement();

        // Natural termination is the only case with a meaningful status.
        let mut state = worker.state.lock().await;
        if !state.forced_termination && !state.panic_termination {
            state.exit_status = state.launcher.exit_status().unwrap_or(-1);
        }
    }

    publish_termination(&worker, started).await;
}

/// The read/write pump proper. Runs until a termination flag is observed
/// or the child is gone with nothing left to drain.
async fn drain_until_terminated(worker: &Arc<ProcessWorker>) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let mut produced_data = false;
        let mut state = worker.state.lock().await;

        // force_kill marks the worker terminated directly; honour it
        // before touching the launcher again.
        if state.terminated {
            break;
        }

        // Data on stdout?
        if !state.panic_termination {
            match state.launcher.read_stdout(&mut buf).await {
                Ok(n) if n > 0 => {
                    let bytes = buf[..n].to_vec();
                    drop(state);
                    worker.publish_output(EventPayload::StdoutData(bytes));
                    produced_data = true;
                    state = worker.state.lock().await;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(worker = worker.id(), error = %e, "stdout read failed");
                }
            }
        }

        // Data on stderr?
        if !state.panic_termination {
            match state.launcher.read_stderr(&mut buf).await {
                Ok(n) if n > 0 => {
                    let bytes = buf[..n].to_vec();
                    drop(state);
                    worker.publish_output(EventPayload::StderrData(bytes));
                    produced_data = true;
                    state = worker.state.lock().await;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(worker = worker.id(), error = %e, "stderr read failed");
                }
            }
        }

        // Termination preconditions, in priority order.
        if state.termination_requested || state.panic_termination {
            state.launcher.shutdown(true).await;
            state.terminated = true;
            state.forced_termination = true;
            break;
        } else if !produced_data {
            // Only consult liveness when nothing was drained this
            // iteration, so buffered output from a child's final moments
            // is fully read before termination is declared.
            if !state.launcher.is_running().await {
                state.terminated = true;
                state.forced_termination = false;
                break;
            }
            drop(state);
            tokio::time::sleep(POLLING_INTERVAL).await;
        } else {
            // Data flowed: yield without sleeping to keep draining under
            // load without starving other tasks.
            drop(state);
            tokio::task::yield_now().await;
        }
    }
}

/// Record and publish the single termination event, unless disposal
/// (panic termination) suppressed it.
async fn publish_termination(worker: &Arc<ProcessWorker>, has_started: bool) {
    let info = {
        let state = worker.state.lock().await;
        if state.panic_termination {
            None
        } else {
            Some(TerminationInfo {
                has_started,
                forced: state.forced_termination,
                exit_status: state.exit_status,
                pid: state.pid,
            })
        }
    };

    let Some(info) = info else {
        debug!(worker = worker.id(), "panic termination; no event published");
        return;
    };

    info!(
        worker = worker.id(),
        has_started = info.has_started,
        forced = info.forced,
        exit_status = info.exit_status,
        "worker terminated"
    );

    // Record on the watch channel first so wait_for_termination callers
    // resolve even when nobody drains the event queue anymore.
    worker.termination_tx.send_replace(Some(info.clone()));

    // Waiters are served by the watch channel above, so an undeliverable
    // queue event is only worth a log line.
    let delivered = worker.events.publish(WorkerEvent {
        worker: worker.id(),
        payload: EventPayload::Termination(info),
    });
    if !delivered {
        debug!(worker = worker.id(), "termination event discarded; consumer gone");
    }
}
