// src/launcher/command.rs

//! Production `ProcessLauncher` over `tokio::process`.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use super::ProcessLauncher;

/// Launches the command line as a direct argv (no shell), with all three
/// standard streams piped.
///
/// The command line is split on whitespace with single/double-quote
/// handling, so a missing executable is a spawn error rather than a shell
/// exit code. That distinction is what makes startup failure observable to
/// the worker.
pub struct CommandLauncher {
    command_line: String,
    working_dir: Option<PathBuf>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    exit_status: Option<ExitStatus>,
}

impl CommandLauncher {
    pub fn new(command_line: impl Into<String>, working_dir: Option<PathBuf>) -> Self {
        Self {
            command_line: command_line.into(),
            working_dir,
            child: None,
            stdin: None,
            stdout: None,
            stderr: None,
            exit_status: None,
        }
    }

    /// Poll one read off an optional pipe without blocking.
    ///
    /// A zero-duration timeout gives the read future exactly one poll:
    /// buffered data is returned immediately, otherwise we report "nothing
    /// available". EOF clears the pipe so later calls short-circuit.
    async fn poll_read<R>(pipe: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        let Some(reader) = pipe.as_mut() else {
            return Ok(0);
        };
        match tokio::time::timeout(Duration::ZERO, reader.read(buf)).await {
            Ok(Ok(0)) => {
                *pipe = None;
                Ok(0)
            }
            Ok(result) => result,
            Err(_elapsed) => Ok(0),
        }
    }
}

#[async_trait]
impl ProcessLauncher for CommandLauncher {
    async fn start(&mut self) -> io::Result<()> {
        let argv = split_command_line(&self.command_line);
        let Some((program, args)) = argv.split_first() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty command line",
            ));
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn()?;
        debug!(program = %program, pid = ?child.id(), "child process spawned");

        self.stdin = child.stdin.take();
        self.stdout = child.stdout.take();
        self.stderr = child.stderr.take();
        self.child = Some(child);
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    async fn is_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        if self.exit_status.is_some() {
            return false;
        }
        match child.try_wait() {
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(error = %e, "try_wait failed; treating child as gone");
                false
            }
        }
    }

    async fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Self::poll_read(&mut self.stdout, buf).await
    }

    async fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Self::poll_read(&mut self.stderr, buf).await
    }

    async fn write_stdin(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stdin already closed",
            ));
        };
        let n = stdin.write(buf).await?;
        stdin.flush().await?;
        Ok(n)
    }

    async fn close_stdin(&mut self) {
        // Dropping the handle closes the pipe.
        self.stdin = None;
    }

    async fn shutdown(&mut self, force: bool) {
        self.stdin = None;
        if !force {
            return;
        }
        if let Some(child) = self.child.as_mut() {
            if self.exit_status.is_none() {
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "kill on shutdown failed (child may have exited)");
                }
                if let Ok(Some(status)) = child.try_wait() {
                    self.exit_status = Some(status);
                }
            }
        }
    }

    fn exit_status(&self) -> Option<i32> {
        // A signal-killed child has no code; report -1 like a failed wait.
        self.exit_status.map(|s| s.code().unwrap_or(-1))
    }
}

/// Split a full command line into argv, honouring single and double quotes.
///
/// This mirrors what callers expect from "one command-line string" APIs:
/// `my-tool --name "some value"` becomes three arguments. No escape
/// processing beyond quote grouping is performed.
fn split_command_line(command_line: &str) -> Vec<String> {
    let mut argv = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in command_line.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                    in_word = true;
                } else if c.is_whitespace() {
                    if in_word {
                        argv.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                } else {
                    current.push(c);
                    in_word = true;
                }
            }
        }
    }
    if in_word {
        argv.push(current);
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::split_command_line;

    #[test]
    fn splits_plain_words() {
        assert_eq!(
            split_command_line("cat -n file.txt"),
            vec!["cat", "-n", "file.txt"]
        );
    }

    #[test]
    fn keeps_quoted_spans_together() {
        assert_eq!(
            split_command_line(r#"grep "two words" 'and more' plain"#),
            vec!["grep", "two words", "and more", "plain"]
        );
    }

    #[test]
    fn empty_quotes_produce_an_argument() {
        assert_eq!(split_command_line(r#"prog """#), vec!["prog", ""]);
    }

    #[test]
    fn whitespace_only_is_empty_argv() {
        assert!(split_command_line("   ").is_empty());
    }

    #[test]
    fn quotes_inside_words_join() {
        assert_eq!(split_command_line(r#"a"b c"d"#), vec!["ab cd"]);
    }
}
