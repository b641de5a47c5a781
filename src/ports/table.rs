// src/ports/table.rs

//! Listening-socket enumeration.
//!
//! The production table reads the kernel's structured socket tables under
//! `/proc/net` instead of scraping `netstat` output, and resolves socket
//! owners through `/proc/<pid>/fd`.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::trace;

use crate::errors::{DevtaskError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Tcp6,
    Udp,
    Udp6,
}

impl Protocol {
    pub fn is_tcp(&self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Tcp6)
    }

    fn proc_file(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Tcp6 => "tcp6",
            Protocol::Udp => "udp",
            Protocol::Udp6 => "udp6",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Listen,
    Established,
    Other(u8),
}

impl SocketState {
    /// Decode the kernel's hex state column (`0A` is `TCP_LISTEN`).
    fn from_kernel(protocol: Protocol, code: u8) -> Self {
        match (protocol.is_tcp(), code) {
            (true, 0x0A) => SocketState::Listen,
            (true, 0x01) => SocketState::Established,
            (_, other) => SocketState::Other(other),
        }
    }
}

/// One row of the socket table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEntry {
    pub protocol: Protocol,
    pub local_port: u16,
    pub state: SocketState,
    pub inode: u64,
}

impl SocketEntry {
    /// A TCP/TCP6 socket in the listening state.
    pub fn is_tcp_listener(&self) -> bool {
        self.protocol.is_tcp() && self.state == SocketState::Listen
    }
}

/// Snapshot access to the machine's sockets.
pub trait SocketTable: Send + Sync + Debug {
    /// All sockets known right now. Callers filter by protocol and state.
    fn sockets(&self) -> Result<Vec<SocketEntry>>;

    /// PIDs holding the socket with this inode open.
    fn owners(&self, inode: u64) -> Result<Vec<u32>>;
}

/// TCP listeners bound to `port` in a table snapshot.
pub fn tcp_listeners_on(entries: &[SocketEntry], port: u16) -> Vec<&SocketEntry> {
    entries
        .iter()
        .filter(|e| e.is_tcp_listener() && e.local_port == port)
        .collect()
}

/// Socket table backed by procfs.
#[derive(Debug, Clone)]
pub struct ProcNetTable {
    root: PathBuf,
}

impl Default for ProcNetTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcNetTable {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Read from an alternative procfs root (used by tests).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_protocol(&self, protocol: Protocol, out: &mut Vec<SocketEntry>) -> Result<()> {
        let path = self.root.join("net").join(protocol.proc_file());
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            // No IPv6 / UDP support in this kernel: nothing to report.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(DevtaskError::SocketQuery(format!(
                    "reading {}: {e}",
                    path.display()
                )));
            }
        };

        for (idx, line) in text.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let entry = parse_proc_net_line(protocol, line).ok_or_else(|| {
                DevtaskError::SocketQuery(format!(
                    "malformed line {} in {}: {line:?}",
                    idx + 1,
                    path.display()
                ))
            })?;
            out.push(entry);
        }
        Ok(())
    }
}

impl SocketTable for ProcNetTable {
    fn sockets(&self) -> Result<Vec<SocketEntry>> {
        let mut entries = Vec::new();
        for protocol in [Protocol::Tcp, Protocol::Tcp6, Protocol::Udp, Protocol::Udp6] {
            self.read_protocol(protocol, &mut entries)?;
        }
        trace!(count = entries.len(), "socket table snapshot");
        Ok(entries)
    }

    fn owners(&self, inode: u64) -> Result<Vec<u32>> {
        let needle = format!("socket:[{inode}]");
        let proc_dir = fs::read_dir(&self.root).map_err(|e| {
            DevtaskError::SocketQuery(format!("reading {}: {e}", self.root.display()))
        })?;

        let mut pids = BTreeSet::new();
        for entry in proc_dir.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };
            // Processes we may not inspect, or that exited mid-scan, are skipped.
            let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
                continue;
            };
            for fd in fds.flatten() {
                let Ok(target) = fs::read_link(fd.path()) else {
                    continue;
                };
                if target.to_string_lossy() == needle {
                    pids.insert(pid);
                    break;
                }
            }
        }
        Ok(pids.into_iter().collect())
    }
}

/// Parse one data row of `/proc/net/{tcp,tcp6,udp,udp6}`.
fn parse_proc_net_line(protocol: Protocol, line: &str) -> Option<SocketEntry> {
    let cols: Vec<&str> = line.split_whitespace().collect();
    if cols.len() < 10 {
        return None;
    }
    let (_, port_hex) = cols[1].rsplit_once(':')?;
    let local_port = u16::from_str_radix(port_hex, 16).ok()?;
    let state = u8::from_str_radix(cols[3], 16).ok()?;
    let inode = cols[9].parse::<u64>().ok()?;

    Some(SocketEntry {
        protocol,
        local_port,
        state: SocketState::from_kernel(protocol, state),
        inode,
    })
}
