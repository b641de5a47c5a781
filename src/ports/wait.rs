// src/ports/wait.rs

//! Poll the socket table until a port is being listened on.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::errors::{DevtaskError, Result};
use crate::ports::table::{SocketEntry, SocketTable, tcp_listeners_on};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT_SECS: u32 = 60;

/// What to wait for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortQuery {
    pub port: u16,
    /// Number of failed polls tolerated before giving up.
    pub timeout_secs: u32,
    /// Included in the timeout error to say which service was expected.
    pub name: Option<String>,
    pub interval: Duration,
}

impl PortQuery {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            name: None,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn timeout_secs(mut self, secs: u32) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Waits for TCP listeners to appear.
#[derive(Debug, Clone)]
pub struct PortWaiter {
    table: Arc<dyn SocketTable>,
}

impl PortWaiter {
    pub fn new(table: Arc<dyn SocketTable>) -> Self {
        Self { table }
    }

    /// Resolve once `query.port` has a TCP listener.
    ///
    /// The first poll happens one interval after the call. After each miss
    /// the retry counter is incremented; once it exceeds `timeout_secs` the
    /// wait fails with `PortTimeout`. A failed table query ends the wait
    /// immediately.
    pub async fn wait_for_port(&self, query: &PortQuery) -> Result<()> {
        let name = query.name.clone().unwrap_or_default();
        debug!(port = query.port, name = %name, timeout_secs = query.timeout_secs, "waiting for port");

        let mut retry: u32 = 0;
        loop {
            sleep(query.interval).await;

            let entries = self.snapshot().await?;
            if !tcp_listeners_on(&entries, query.port).is_empty() {
                info!(port = query.port, name = %name, polls = retry + 1, "port is listening");
                return Ok(());
            }

            retry += 1;
            if retry > query.timeout_secs {
                return Err(DevtaskError::PortTimeout {
                    port: query.port,
                    name,
                });
            }
            debug!(port = query.port, retry, "port not listening yet");
        }
    }

    /// Table query on the blocking pool; procfs scans are plain file I/O.
    async fn snapshot(&self) -> Result<Vec<SocketEntry>> {
        let table = Arc::clone(&self.table);
        tokio::task::spawn_blocking(move || table.sockets())
            .await
            .map_err(|e| DevtaskError::SocketQuery(format!("socket query task failed: {e}")))?
    }

    /// `wait_for_port` with the default one-second interval.
    pub async fn wait(&self, port: u16, timeout_secs: u32, name: &str) -> Result<()> {
        let mut query = PortQuery::new(port).timeout_secs(timeout_secs);
        if !name.is_empty() {
            query = query.name(name);
        }
        self.wait_for_port(&query).await
    }

    /// True iff every port in `ports` is listening in a single snapshot.
    pub fn check_ports(&self, ports: &[u16]) -> Result<bool> {
        let entries = self.table.sockets()?;
        Ok(ports
            .iter()
            .all(|port| !tcp_listeners_on(&entries, *port).is_empty()))
    }
}
