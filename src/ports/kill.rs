// src/ports/kill.rs

//! Free a port by killing the process listening on it.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::terminate::{Terminate, Termination};
use crate::ports::table::{SocketTable, tcp_listeners_on};

/// What [`PortKiller::kill_port`] did. None of these is a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillPortOutcome {
    /// Nothing listens on the port.
    NoListener,
    /// More than one process owns the listener; nothing was killed.
    Ambiguous(Vec<u32>),
    /// A kill request was issued to this PID.
    Killed(u32),
    /// The owner exited before the kill request reached it.
    AlreadyGone(u32),
    /// The lookup or the kill request failed; logged and ignored.
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct PortKiller {
    table: Arc<dyn SocketTable>,
    terminator: Arc<dyn Terminate>,
}

impl PortKiller {
    pub fn new(table: Arc<dyn SocketTable>, terminator: Arc<dyn Terminate>) -> Self {
        Self { table, terminator }
    }

    /// Force-kill the single process listening on `port`.
    ///
    /// Returns once the kill request has been issued, not once the process
    /// has exited. Never fails the caller.
    pub fn kill_port(&self, port: u16) -> KillPortOutcome {
        let owners = match self.listener_owners(port) {
            Ok(owners) => owners,
            Err(e) => {
                warn!(port, error = %e, "could not resolve listener on port");
                return KillPortOutcome::Skipped(e.to_string());
            }
        };

        match owners.as_slice() {
            [] => {
                debug!(port, "no listener on port");
                KillPortOutcome::NoListener
            }
            [pid] => match self.terminator.terminate(*pid, true) {
                Ok(Termination::Requested) => {
                    info!(port, pid, "killed process listening on port");
                    KillPortOutcome::Killed(*pid)
                }
                Ok(Termination::AlreadyGone) => KillPortOutcome::AlreadyGone(*pid),
                Err(e) => {
                    warn!(port, pid, error = %e, "failed to kill listener");
                    KillPortOutcome::Skipped(e.to_string())
                }
            },
            _ => {
                debug!(port, ?owners, "port has several owners; leaving it alone");
                KillPortOutcome::Ambiguous(owners)
            }
        }
    }

    /// [`kill_port`](Self::kill_port) on the blocking pool, for async callers.
    pub async fn kill_port_async(&self, port: u16) -> KillPortOutcome {
        let killer = self.clone();
        tokio::task::spawn_blocking(move || killer.kill_port(port))
            .await
            .unwrap_or_else(|e| {
                warn!(port, error = %e, "port kill task failed");
                KillPortOutcome::Skipped(e.to_string())
            })
    }

    fn listener_owners(&self, port: u16) -> Result<Vec<u32>> {
        let entries = self.table.sockets()?;
        let mut pids = BTreeSet::new();
        for entry in tcp_listeners_on(&entries, port) {
            pids.extend(self.table.owners(entry.inode)?);
        }
        Ok(pids.into_iter().collect())
    }
}
