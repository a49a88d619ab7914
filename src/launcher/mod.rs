// src/launcher/mod.rs

//! Pluggable process launcher abstraction.
//!
//! The worker talks to a `ProcessLauncher` instead of `tokio::process`
//! directly. This keeps the pump loop testable: production code uses
//! [`CommandLauncher`], tests can substitute a scripted implementation that
//! never spawns a real process.
//!
//! Read calls are polling-style: they return `Ok(0)` when no data is
//! currently available (or the stream hit end-of-file). The pump loop
//! relies on this to interleave stdout/stderr draining with its
//! termination checks without ever blocking on a quiet stream.

use std::io;

use async_trait::async_trait;

pub mod command;

pub use command::CommandLauncher;

/// Trait abstracting child process creation and byte-level pipe IO.
///
/// The command line and working directory are fixed at construction time;
/// `start` may be called at most once.
#[async_trait]
pub trait ProcessLauncher: Send {
    /// Start the child process. Fails when the executable cannot be
    /// spawned (missing binary, bad working directory, ...).
    async fn start(&mut self) -> io::Result<()>;

    /// Pid of the child, once started.
    fn pid(&self) -> Option<u32>;

    /// Whether the child is still running. Implementations reap the child
    /// here; once this returns false, `exit_status` is available.
    async fn is_running(&mut self) -> bool;

    /// Read currently-available stdout bytes into `buf`; `Ok(0)` when
    /// nothing is buffered right now.
    async fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Same as `read_stdout`, for stderr.
    async fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write one slice to the child's stdin, returning the number of bytes
    /// accepted.
    async fn write_stdin(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Close the child's stdin pipe. Idempotent.
    async fn close_stdin(&mut self);

    /// Shut the child down. `force` kills it outright; otherwise only the
    /// stdin pipe is closed so a child reading from it can wind down.
    async fn shutdown(&mut self, force: bool);

    /// Exit status of the child, once it has been reaped.
    fn exit_status(&self) -> Option<i32>;
}
