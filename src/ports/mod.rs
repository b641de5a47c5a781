// src/ports/mod.rs

//! Port synchronization helpers used around long-running services.
//!
//! - [`table`] enumerates sockets (`SocketTable`, procfs implementation).
//! - [`wait`] polls until a port is listening.
//! - [`kill`] frees a port by killing its single owner.

pub mod kill;
pub mod table;
pub mod wait;

pub use kill::{KillPortOutcome, PortKiller};
pub use table::{ProcNetTable, Protocol, SocketEntry, SocketState, SocketTable};
pub use wait::{PortQuery, PortWaiter};
