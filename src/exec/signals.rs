// src/exec/signals.rs

//! Opt-in interrupt/terminate handling.
//!
//! Nothing here runs unless the orchestrator calls
//! [`install_shutdown_handlers`].

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::exec::registry::ProcessRegistry;

/// What to do once an interrupt or terminate signal arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Terminate every registered process and keep running.
    KillAll,
    /// Terminate every registered process, then exit with the given code.
    KillAllAndExit(i32),
}

/// Spawn a task that waits for Ctrl-C (and `SIGTERM` on unix) and applies
/// `policy` to `registry`.
///
/// The task handles the first signal only; abort the returned handle to
/// uninstall.
pub fn install_shutdown_handlers(
    registry: ProcessRegistry,
    policy: ShutdownPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !wait_for_shutdown_signal().await {
            return;
        }

        match policy {
            ShutdownPolicy::KillAll => {
                let report = registry.kill_all();
                info!(
                    requested = report.requested.len(),
                    already_gone = report.already_gone.len(),
                    failed = report.failed.len(),
                    "shutdown signal received; terminated live processes"
                );
            }
            ShutdownPolicy::KillAllAndExit(code) => registry.kill_all_and_exit(code),
        }
    })
}

/// Returns `false` when no signal listener could be installed.
async fn wait_for_shutdown_signal() -> bool {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                return wait_for_ctrl_c().await;
            }
        };

        tokio::select! {
            ok = wait_for_ctrl_c() => ok,
            _ = sigterm.recv() => true,
        }
    }

    #[cfg(not(unix))]
    {
        wait_for_ctrl_c().await
    }
}

async fn wait_for_ctrl_c() -> bool {
    match tokio::signal::ctrl_c().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "failed to listen for Ctrl+C");
            false
        }
    }
}
