// src/lib.rs

pub mod cli;
pub mod errors;
pub mod events;
pub mod exec;
pub mod launcher;
pub mod logging;
pub mod worker;

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::events::{EventPayload, EventQueue};
use crate::worker::ProcessWorker;

/// High-level entry point used by `main.rs`.
///
/// Spawns one worker for the given command line and streams its output to
/// this process's stdout/stderr. Ctrl-C becomes a graceful termination
/// request; our own stdin is forwarded to the child unless `--no-stdin`.
///
/// Returns the child's exit status (or -1 when it was killed).
pub async fn run(args: CliArgs) -> Result<i32> {
    let command_line = args.command_line();
    let (queue, mut rx) = EventQueue::channel();
    let worker = ProcessWorker::spawn(command_line.clone(), args.dir.clone(), queue);

    // A command that exits before we get here still started fine; only a
    // launch failure is fatal.
    if !worker.wait_for_startup().await {
        anyhow::bail!("failed to start: {command_line}");
    }

    // Ctrl-C → graceful termination request.
    {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("interrupt received; requesting termination");
            worker.request_termination(false).await;
        });
    }

    if !args.no_stdin {
        spawn_stdin_forwarder(Arc::clone(&worker));
    }

    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();

    while let Some(event) = rx.recv().await {
        match event.payload {
            EventPayload::StdoutData(bytes) => {
                stdout.write_all(&bytes).await?;
                stdout.flush().await?;
            }
            EventPayload::StderrData(bytes) => {
                stderr.write_all(&bytes).await?;
                stderr.flush().await?;
            }
            EventPayload::Termination(term) => {
                info!(
                    forced = term.forced,
                    exit_status = term.exit_status,
                    "child terminated"
                );
                return Ok(if term.forced { -1 } else { term.exit_status });
            }
        }
    }

    anyhow::bail!("event queue closed before termination")
}

/// Copy this process's stdin into the child, closing the child's input on
/// end-of-file.
fn spawn_stdin_forwarder(worker: Arc<ProcessWorker>) {
    tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        let mut buf = vec![0u8; 4096];
        loop {
            match stdin.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if worker.write(&buf[..n]).await == 0 {
                        debug!("child rejected stdin data; stopping forwarder");
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "stdin read failed; stopping forwarder");
                    break;
                }
            }
        }
        worker.close_input().await;
    });
}
