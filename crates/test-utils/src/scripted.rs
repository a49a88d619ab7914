//! A deterministic, in-memory `ProcessLauncher` for tests.
//!
//! The launcher plays back a script (stdout/stderr chunks, exit status,
//! startup failure) instead of spawning a real process, and records what
//! the worker did to it (writes, stdin close, kill) in a [`ScriptedHandle`]
//! the test keeps after the launcher has been moved into the worker.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use sysworker::launcher::ProcessLauncher;

/// Shared view into a [`ScriptedLauncher`] after it has been handed to a
/// worker.
#[derive(Clone, Default)]
pub struct ScriptedHandle {
    started: Arc<AtomicBool>,
    stdin_closed: Arc<AtomicBool>,
    kill_observed: Arc<AtomicBool>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ScriptedHandle {
    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stdin_closed(&self) -> bool {
        self.stdin_closed.load(Ordering::SeqCst)
    }

    pub fn kill_observed(&self) -> bool {
        self.kill_observed.load(Ordering::SeqCst)
    }

    /// Sizes of the individual write calls the worker issued.
    pub fn write_call_sizes(&self) -> Vec<usize> {
        self.writes.lock().unwrap().iter().map(Vec::len).collect()
    }

    /// All written bytes, concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.writes.lock().unwrap().concat()
    }
}

/// Scripted launcher. Build one with [`ScriptedLauncher::builder`].
pub struct ScriptedLauncher {
    fail_start: bool,
    stay_running: bool,
    exit_status: i32,
    pid: u32,
    fail_write_after: Option<usize>,
    max_write: Option<usize>,
    stdout_chunks: VecDeque<Vec<u8>>,
    stderr_chunks: VecDeque<Vec<u8>>,
    killed: bool,
    handle: ScriptedHandle,
}

impl ScriptedLauncher {
    pub fn builder() -> ScriptedLauncherBuilder {
        ScriptedLauncherBuilder::new()
    }

    fn pop_chunk(chunks: &mut VecDeque<Vec<u8>>, buf: &mut [u8]) -> usize {
        let Some(mut chunk) = chunks.pop_front() else {
            return 0;
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            chunk.drain(..n);
            chunks.push_front(chunk);
        }
        n
    }
}

#[async_trait]
impl ProcessLauncher for ScriptedLauncher {
    async fn start(&mut self) -> io::Result<()> {
        if self.fail_start {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "scripted startup failure",
            ));
        }
        self.handle.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        self.handle.started().then_some(self.pid)
    }

    async fn is_running(&mut self) -> bool {
        if !self.handle.started() || self.killed {
            return false;
        }
        if self.stay_running {
            return true;
        }
        // A scripted "short-lived" child exits once its output is drained.
        !self.stdout_chunks.is_empty() || !self.stderr_chunks.is_empty()
    }

    async fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(Self::pop_chunk(&mut self.stdout_chunks, buf))
    }

    async fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(Self::pop_chunk(&mut self.stderr_chunks, buf))
    }

    async fn write_stdin(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.handle.stdin_closed() || self.killed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed"));
        }
        if let Some(limit) = self.fail_write_after {
            if self.handle.writes.lock().unwrap().len() >= limit {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "scripted write failure",
                ));
            }
        }
        let n = self.max_write.map_or(buf.len(), |cap| buf.len().min(cap));
        self.handle.writes.lock().unwrap().push(buf[..n].to_vec());
        Ok(n)
    }

    async fn close_stdin(&mut self) {
        self.handle.stdin_closed.store(true, Ordering::SeqCst);
    }

    async fn shutdown(&mut self, force: bool) {
        self.handle.stdin_closed.store(true, Ordering::SeqCst);
        if force {
            self.killed = true;
            self.handle.kill_observed.store(true, Ordering::SeqCst);
        }
    }

    fn exit_status(&self) -> Option<i32> {
        self.handle.started().then_some(self.exit_status)
    }
}

pub struct ScriptedLauncherBuilder {
    launcher: ScriptedLauncher,
}

impl ScriptedLauncherBuilder {
    pub fn new() -> Self {
        Self {
            launcher: ScriptedLauncher {
                fail_start: false,
                stay_running: false,
                exit_status: 0,
                pid: 4242,
                fail_write_after: None,
                max_write: None,
                stdout_chunks: VecDeque::new(),
                stderr_chunks: VecDeque::new(),
                killed: false,
                handle: ScriptedHandle::default(),
            },
        }
    }

    /// Make `start()` fail, as if the executable did not exist.
    pub fn fail_start(mut self) -> Self {
        self.launcher.fail_start = true;
        self
    }

    /// Keep reporting the child as running until it is killed.
    pub fn stay_running(mut self) -> Self {
        self.launcher.stay_running = true;
        self
    }

    pub fn exit_status(mut self, status: i32) -> Self {
        self.launcher.exit_status = status;
        self
    }

    pub fn pid(mut self, pid: u32) -> Self {
        self.launcher.pid = pid;
        self
    }

    /// One chunk of stdout the pump will read.
    pub fn stdout_chunk(mut self, bytes: &[u8]) -> Self {
        self.launcher.stdout_chunks.push_back(bytes.to_vec());
        self
    }

    /// One chunk of stderr the pump will read.
    pub fn stderr_chunk(mut self, bytes: &[u8]) -> Self {
        self.launcher.stderr_chunks.push_back(bytes.to_vec());
        self
    }

    /// Accept `calls` write calls, then fail the next one.
    pub fn fail_write_after(mut self, calls: usize) -> Self {
        self.launcher.fail_write_after = Some(calls);
        self
    }

    /// Accept at most `cap` bytes per write call, like a full pipe.
    pub fn max_write(mut self, cap: usize) -> Self {
        self.launcher.max_write = Some(cap);
        self
    }

    pub fn build(self) -> (ScriptedLauncher, ScriptedHandle) {
        let handle = self.launcher.handle.clone();
        (self.launcher, handle)
    }
}

impl Default for ScriptedLauncherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
