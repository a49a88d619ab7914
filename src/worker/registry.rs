// src/worker/registry.rs

//! Process-wide count of workers whose child process is currently active.
//!
//! Incremented exactly once per successful process start, decremented
//! exactly once per pump-loop exit. Introspection only: nothing in the
//! crate makes control decisions based on this value, and no ordering is
//! implied between counter changes of different workers.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

static RUNNING_WORKERS: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn increment() {
    let now = RUNNING_WORKERS.fetch_add(1, Ordering::Relaxed) + 1;
    trace!(running = now, "worker registry incremented");
}

pub(crate) fn decrement() {
    let now = RUNNING_WORKERS.fetch_sub(1, Ordering::Relaxed) - 1;
    trace!(running = now, "worker registry decremented");
}

/// Number of workers with a live child process right now.
pub fn num_running() -> usize {
    RUNNING_WORKERS.load(Ordering::Relaxed)
}
