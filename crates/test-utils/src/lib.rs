//! Shared helpers for the integration tests under `tests/`.
//!
//! - [`fakes`]: in-memory socket table, terminator, console, ref lister and
//!   refetcher.
//! - [`builders`]: config and lockfile builders.

pub mod builders;
pub mod fakes;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Upper bound for any single awaited operation in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

static TRACING: Once = Once::new();

/// Route `tracing` output through libtest's capture, so it only shows for
/// failing tests (or with `--nocapture`).
///
/// Takes the same `DEVTASK_LOG` directives as the binary and defaults to
/// `devtask=debug`, which includes process and port lifecycle events.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = std::env::var("DEVTASK_LOG")
            .ok()
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new("devtask=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Await `future`, panicking once it runs longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F: Future>(future: F) -> F::Output {
    match tokio::time::timeout(TEST_TIMEOUT, future).await {
        Ok(output) => output,
        Err(_) => panic!("operation did not finish within {TEST_TIMEOUT:?}"),
    }
}
