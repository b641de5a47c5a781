// src/exec/terminate.rs

//! Best-effort process termination.

use std::fmt::Debug;

use crate::errors::{DevtaskError, Result};

/// What a termination request achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The signal was delivered; the process may still be shutting down.
    Requested,
    /// No such process. Counts as already terminated.
    AlreadyGone,
}

/// Sends termination requests to processes by PID.
///
/// Shared by the process registry and the port killer so tests can observe
/// kill requests without signalling real processes.
pub trait Terminate: Send + Sync + Debug {
    /// Request termination: `SIGTERM` normally, `SIGKILL` when `force`.
    fn terminate(&self, pid: u32, force: bool) -> Result<Termination>;
}

/// Signal-based terminator used in production.
#[derive(Debug, Clone, Default)]
pub struct SignalTerminator;

#[cfg(unix)]
impl Terminate for SignalTerminator {
    fn terminate(&self, pid: u32, force: bool) -> Result<Termination> {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid)
            .map_err(|_| DevtaskError::InvalidSpec(format!("pid {pid} out of range")))?;
        let signal = if force {
            Signal::SIGKILL
        } else {
            Signal::SIGTERM
        };

        match kill(Pid::from_raw(raw), signal) {
            Ok(()) => Ok(Termination::Requested),
            Err(Errno::ESRCH) => Ok(Termination::AlreadyGone),
            Err(errno) => Err(DevtaskError::IoError(std::io::Error::from(errno))),
        }
    }
}

#[cfg(not(unix))]
impl Terminate for SignalTerminator {
    fn terminate(&self, pid: u32, _force: bool) -> Result<Termination> {
        Err(DevtaskError::IoError(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("cannot signal pid {pid} on this platform"),
        )))
    }
}
