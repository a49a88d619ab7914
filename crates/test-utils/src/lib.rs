//! Shared helpers for sysworker's test suites.

pub mod scripted;

pub use scripted::{ScriptedHandle, ScriptedLauncher, ScriptedLauncherBuilder};

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Upper bound on any single awaited step in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

static TRACING: Once = Once::new();

/// Install a tracing subscriber for the current test binary.
///
/// Safe to call from every test; only the first call installs anything.
/// Output goes through the libtest writer, so it surfaces for failing
/// tests (or everywhere with `--nocapture`). Level selection follows
/// `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `fut`, panicking once [`TEST_TIMEOUT`] elapses.
///
/// Wrap every await that needs the pump task to make progress, so a stuck
/// loop fails the test instead of hanging the run.
pub async fn with_timeout<F: std::future::Future>(fut: F) -> F::Output {
    tokio::time::timeout(TEST_TIMEOUT, fut)
        .await
        .unwrap_or_else(|_| panic!("step exceeded test timeout ({TEST_TIMEOUT:?})"))
}
