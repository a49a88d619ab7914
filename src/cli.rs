// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `sysworker`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sysworker",
    version,
    about = "Run a command under an asynchronous process worker, streaming its output.",
    long_about = None
)]
pub struct CliArgs {
    /// Command line to execute (quoted arguments are kept together).
    #[arg(value_name = "COMMAND", required = true, num_args = 1..)]
    pub command: Vec<String>,

    /// Working directory for the child process.
    #[arg(long, value_name = "PATH")]
    pub dir: Option<std::path::PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SYSWORKER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Don't forward this process's stdin to the child.
    #[arg(long)]
    pub no_stdin: bool,
}

impl CliArgs {
    /// The command words joined back into the single command-line string
    /// the worker expects.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
