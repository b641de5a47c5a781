// src/exec/registry.rs

//! Table of live subprocesses, used to tear everything down on shutdown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, info, warn};

use crate::exec::terminate::{SignalTerminator, Terminate, Termination};

/// A subprocess that was running when it was registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveProcess {
    pub pid: u32,
    pub label: String,
}

/// Outcome of [`ProcessRegistry::kill_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KillReport {
    /// PIDs a termination request was delivered to.
    pub requested: Vec<u32>,
    /// PIDs that had already exited.
    pub already_gone: Vec<u32>,
    /// PIDs that could not be signalled, with the reason.
    pub failed: Vec<(u32, String)>,
}

impl KillReport {
    pub fn attempted(&self) -> usize {
        self.requested.len() + self.already_gone.len() + self.failed.len()
    }
}

#[derive(Debug)]
struct Inner {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, LiveProcess>>,
    terminator: Arc<dyn Terminate>,
}

impl Inner {
    fn live(&self) -> MutexGuard<'_, HashMap<u64, LiveProcess>> {
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Registry of live subprocesses.
///
/// Cheap to clone; clones share the same table. Entries are added with
/// [`register`](Self::register) and disappear when the returned
/// [`Registration`] is dropped, which the runner does as soon as the child
/// has exited.
#[derive(Debug, Clone)]
pub struct ProcessRegistry {
    inner: Arc<Inner>,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::with_terminator(Arc::new(SignalTerminator))
    }

    pub fn with_terminator(terminator: Arc<dyn Terminate>) -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(1),
                live: Mutex::new(HashMap::new()),
                terminator,
            }),
        }
    }

    /// Record a freshly launched process.
    pub fn register(&self, pid: u32, label: impl Into<String>) -> Registration {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let label = label.into();
        debug!(pid, label = %label, "registering live process");
        self.inner.live().insert(id, LiveProcess { pid, label });
        Registration {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Current entries, in no particular order.
    pub fn snapshot(&self) -> Vec<LiveProcess> {
        self.inner.live().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ask every registered process to terminate.
    ///
    /// Works on a snapshot; a failure for one PID does not stop the others and
    /// a process that is already gone counts as terminated.
    pub fn kill_all(&self) -> KillReport {
        let snapshot = self.snapshot();
        let mut report = KillReport::default();

        for proc in snapshot {
            match self.inner.terminator.terminate(proc.pid, false) {
                Ok(Termination::Requested) => {
                    info!(pid = proc.pid, label = %proc.label, "sent termination request");
                    report.requested.push(proc.pid);
                }
                Ok(Termination::AlreadyGone) => {
                    debug!(pid = proc.pid, label = %proc.label, "process already exited");
                    report.already_gone.push(proc.pid);
                }
                Err(e) => {
                    warn!(pid = proc.pid, label = %proc.label, error = %e, "failed to terminate process");
                    report.failed.push((proc.pid, e.to_string()));
                }
            }
        }

        report
    }

    /// [`kill_all`](Self::kill_all), then exit the host program.
    pub fn kill_all_and_exit(&self, code: i32) -> ! {
        let report = self.kill_all();
        info!(
            requested = report.requested.len(),
            failed = report.failed.len(),
            exit_code = code,
            "terminated live processes; exiting"
        );
        std::process::exit(code)
    }
}

/// Keeps a registry entry alive; dropping it removes the entry.
#[derive(Debug)]
pub struct Registration {
    id: u64,
    registry: Weak<Inner>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            inner.live().remove(&self.id);
        }
    }
}
