// src/errors.rs

//! Crate-wide error type and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    /// The launcher could not start the child process at all.
    #[error("failed to start process: {0}")]
    StartupFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The event queue consumer went away mid-operation.
    #[error("event queue closed")]
    EventQueueClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WorkerError>;
