use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use devtask::deps::{RefLister, Refetcher};
use devtask::errors::{DevtaskError, Result};
use devtask::exec::{ConsoleSink, Terminate, Termination};
use devtask::ports::{Protocol, SocketEntry, SocketState, SocketTable};

/// Console sink that keeps every emitted line.
#[derive(Debug, Clone, Default)]
pub struct RecordingConsole {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl ConsoleSink for RecordingConsole {
    fn emit(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

/// A socket table whose contents tests control.
///
/// Snapshots can be scripted per poll with [`FakeSocketTable::push_snapshot`];
/// once the script runs out the static entries are returned.
#[derive(Debug, Clone, Default)]
pub struct FakeSocketTable {
    entries: Arc<Mutex<Vec<SocketEntry>>>,
    script: Arc<Mutex<VecDeque<Result<Vec<SocketEntry>>>>>,
    owners: Arc<Mutex<HashMap<u64, Vec<u32>>>>,
    polls: Arc<AtomicUsize>,
}

impl FakeSocketTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a TCP listener on `port` owned by `pids`. Returns its inode.
    pub fn listen(&self, port: u16, pids: &[u32]) -> u64 {
        self.add(Protocol::Tcp, port, SocketState::Listen, pids)
    }

    pub fn add(&self, protocol: Protocol, port: u16, state: SocketState, pids: &[u32]) -> u64 {
        let mut entries = self.entries.lock().unwrap();
        let inode = 10_000 + entries.len() as u64;
        entries.push(SocketEntry {
            protocol,
            local_port: port,
            state,
            inode,
        });
        self.owners.lock().unwrap().insert(inode, pids.to_vec());
        inode
    }

    /// Script the result of the next poll.
    pub fn push_snapshot(&self, snapshot: Result<Vec<SocketEntry>>) {
        self.script.lock().unwrap().push_back(snapshot);
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl SocketTable for FakeSocketTable {
    fn sockets(&self) -> Result<Vec<SocketEntry>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            return scripted;
        }
        Ok(self.entries.lock().unwrap().clone())
    }

    fn owners(&self, inode: u64) -> Result<Vec<u32>> {
        Ok(self
            .owners
            .lock()
            .unwrap()
            .get(&inode)
            .cloned()
            .unwrap_or_default())
    }
}

/// Terminator that records requests instead of signalling.
#[derive(Debug, Clone, Default)]
pub struct RecordingTerminator {
    requests: Arc<Mutex<Vec<(u32, bool)>>>,
    gone: Arc<Mutex<HashSet<u32>>>,
    failing: Arc<Mutex<HashSet<u32>>>,
}

impl RecordingTerminator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `pid` as already exited.
    pub fn mark_gone(&self, pid: u32) {
        self.gone.lock().unwrap().insert(pid);
    }

    /// Make requests for `pid` fail.
    pub fn mark_failing(&self, pid: u32) {
        self.failing.lock().unwrap().insert(pid);
    }

    /// `(pid, force)` for every request, in order.
    pub fn requests(&self) -> Vec<(u32, bool)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Terminate for RecordingTerminator {
    fn terminate(&self, pid: u32, force: bool) -> Result<Termination> {
        self.requests.lock().unwrap().push((pid, force));
        if self.failing.lock().unwrap().contains(&pid) {
            return Err(DevtaskError::IoError(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("not permitted to signal {pid}"),
            )));
        }
        if self.gone.lock().unwrap().contains(&pid) {
            return Ok(Termination::AlreadyGone);
        }
        Ok(Termination::Requested)
    }
}

/// Ref lister serving canned `ls-remote` listings per URL.
#[derive(Debug, Clone, Default)]
pub struct FakeRefLister {
    listings: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeRefLister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listing(self, url: &str, listing: &str) -> Self {
        self.listings
            .lock()
            .unwrap()
            .insert(url.to_string(), listing.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl RefLister for FakeRefLister {
    fn list_refs<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(url.to_string());
            self.listings
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| DevtaskError::RefQuery {
                    url: url.to_string(),
                    reason: "repository not found".to_string(),
                })
        })
    }
}

/// Refetcher recording which dependencies it was asked to refetch.
#[derive(Debug, Clone, Default)]
pub struct RecordingRefetcher {
    refetched: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingRefetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(self, name: &str) -> Self {
        self.failing.lock().unwrap().insert(name.to_string());
        self
    }

    pub fn refetched(&self) -> Vec<String> {
        self.refetched.lock().unwrap().clone()
    }
}

impl Refetcher for RecordingRefetcher {
    fn refetch<'a>(
        &'a self,
        name: &'a str,
        declared: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if self.failing.lock().unwrap().contains(name) {
                return Err(DevtaskError::NonZeroExit {
                    command: format!("yarn add {declared}"),
                    cwd: std::path::PathBuf::from("."),
                    code: 1,
                });
            }
            self.refetched.lock().unwrap().push(name.to_string());
            Ok(())
        })
    }
}
