// src/exec/runner.rs

//! Subprocess supervisor.
//!
//! A run is split into three cooperating pieces:
//! - one reader task per pipe, turning stdout/stderr into [`Chunk`]s,
//! - a supervisor task that drains the chunk channel into the run's
//!   [`OutputSink`] while waiting for the child to exit,
//! - a broadcast channel of [`RunEvent`]s for callers that want to observe
//!   output or failures while the run is in flight.
//!
//! The terminal [`RunResult`] is delivered separately through
//! [`RunHandle::wait`]. A run ends when the child exits, not when its pipes
//! close: output from descendants that inherited the pipes is only collected
//! for a short grace period after the exit.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::errors::{DevtaskError, Result};
use crate::exec::console::ConsoleSink;
use crate::exec::output::{CapturedOutput, Chunk, OutputSink, Stream};
use crate::exec::registry::{ProcessRegistry, Registration};
use crate::exec::spec::RunSpec;

const READ_BUF_SIZE: usize = 8 * 1024;
const CHUNK_CHANNEL_SIZE: usize = 64;
const EVENT_CHANNEL_SIZE: usize = 1024;
/// How long output is still collected once the child has exited.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// How a finished process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    /// Normal exit with a non-zero code.
    Exited(i32),
    /// Killed by a signal; no exit code.
    Signaled(i32),
}

impl RunStatus {
    pub fn from_exit(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return if code == 0 {
                RunStatus::Success
            } else {
                RunStatus::Exited(code)
            };
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return RunStatus::Signaled(signal);
            }
        }

        RunStatus::Exited(-1)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

/// Outcome of one completed run. Produced once, never mutated.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub command: String,
    pub cwd: PathBuf,
    pub status: RunStatus,
    pub output: CapturedOutput,
    pub duration: Duration,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.status.is_success()
    }

    /// The error describing this run's failure, if it failed.
    pub fn failure(&self) -> Option<DevtaskError> {
        match self.status {
            RunStatus::Success => None,
            RunStatus::Exited(code) => Some(DevtaskError::NonZeroExit {
                command: self.command.clone(),
                cwd: self.cwd.clone(),
                code,
            }),
            RunStatus::Signaled(signal) => Some(DevtaskError::SignalTermination {
                command: self.command.clone(),
                cwd: self.cwd.clone(),
                signal,
            }),
        }
    }

    /// `Ok(self)` on success, the failure error otherwise.
    pub fn into_result(self) -> Result<RunResult> {
        match self.failure() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Events published while a run is in flight.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Output(Chunk),
    /// The process failed (non-zero exit or signal). Published before `Exited`.
    Failed { status: RunStatus, message: String },
    Exited(RunStatus),
}

/// Handle to a launched run.
#[derive(Debug)]
pub struct RunHandle {
    pid: Option<u32>,
    events: broadcast::Sender<RunEvent>,
    initial_events: Option<broadcast::Receiver<RunEvent>>,
    completion: JoinHandle<Result<RunResult>>,
}

impl RunHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Receiver created before the process was launched, so it sees every
    /// event of the run. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<broadcast::Receiver<RunEvent>> {
        self.initial_events.take()
    }

    /// A receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<RunResult> {
        self.completion
            .await
            .map_err(|e| DevtaskError::Other(anyhow::Error::from(e)))?
    }
}

/// Launches and supervises subprocesses described by [`RunSpec`]s.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    registry: ProcessRegistry,
    console: Arc<dyn ConsoleSink>,
}

impl ProcessRunner {
    pub fn new(registry: ProcessRegistry, console: Arc<dyn ConsoleSink>) -> Self {
        Self { registry, console }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn console(&self) -> Arc<dyn ConsoleSink> {
        Arc::clone(&self.console)
    }

    /// Run to completion.
    ///
    /// Launch failures are returned as `Err`; a process that ran and failed
    /// comes back as an `Ok(RunResult)` with a failing status.
    pub async fn run(&self, spec: &RunSpec) -> Result<RunResult> {
        self.start(spec).await?.wait().await
    }

    /// Launch the process and return immediately.
    pub async fn start(&self, spec: &RunSpec) -> Result<RunHandle> {
        spec.validate()?;

        let cwd = spec.resolved_cwd();
        let command = spec.command_line();
        self.console
            .emit(&format!("[{}] {}", cwd.display(), command));

        let sink = OutputSink::open(spec, Arc::clone(&self.console)).await?;

        let mut cmd = spec.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| DevtaskError::Launch {
            command: command.clone(),
            cwd: cwd.clone(),
            source,
        })?;

        let pid = child.id();
        info!(pid = ?pid, cwd = %cwd.display(), cmd = %command, "process started");

        let label = spec.title.clone().unwrap_or_else(|| command.clone());
        let registration = pid.map(|pid| self.registry.register(pid, label));

        let (events, initial_events) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (chunk_tx, chunk_rx) = mpsc::channel::<Chunk>(CHUNK_CHANNEL_SIZE);
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, Stream::Stdout, chunk_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, Stream::Stderr, chunk_tx.clone());
        }
        drop(chunk_tx);

        let supervisor = Supervisor {
            command,
            cwd,
            started: Instant::now(),
            events: events.clone(),
        };
        let completion =
            tokio::spawn(supervisor.run(child, registration, sink, chunk_rx));

        Ok(RunHandle {
            pid,
            events,
            initial_events: Some(initial_events),
            completion,
        })
    }
}

fn spawn_reader<R>(mut reader: R, stream: Stream, tx: mpsc::Sender<Chunk>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUF_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = Chunk {
                        stream,
                        data: buf[..n].to_vec(),
                    };
                    if tx.send(chunk).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(?stream, error = %e, "output pipe read failed");
                    break;
                }
            }
        }
    });
}

struct Supervisor {
    command: String,
    cwd: PathBuf,
    started: Instant,
    events: broadcast::Sender<RunEvent>,
}

impl Supervisor {
    async fn run(
        self,
        mut child: Child,
        registration: Option<Registration>,
        mut sink: OutputSink,
        mut chunks: mpsc::Receiver<Chunk>,
    ) -> Result<RunResult> {
        let events = &self.events;
        let (exit, sink_error) = {
            let pump = async {
                // Keep draining after a sink error so the child never blocks on
                // a full pipe.
                let mut sink_error = None;
                while let Some(chunk) = chunks.recv().await {
                    if sink_error.is_none() {
                        if let Err(e) = sink.write(&chunk).await {
                            warn!(cmd = %self.command, error = %e, "failed to record process output");
                            sink_error = Some(e);
                        }
                    }
                    let _ = events.send(RunEvent::Output(chunk));
                }
                sink_error
            };
            tokio::pin!(pump);

            let mut drained = None;
            let exit = tokio::select! {
                exit = child.wait() => exit,
                sink_error = &mut pump => {
                    drained = Some(sink_error);
                    child.wait().await
                }
            };
            // The pid may be recycled from here on.
            drop(registration);

            // Descendants can keep the pipes open after the child exits.
            let sink_error = match drained {
                Some(sink_error) => sink_error,
                None => match timeout(OUTPUT_DRAIN_GRACE, &mut pump).await {
                    Ok(sink_error) => sink_error,
                    Err(_) => {
                        debug!(cmd = %self.command, "output pipes still open after exit; detaching");
                        None
                    }
                },
            };
            (exit, sink_error)
        };

        let exit = exit?;
        if let Some(e) = sink_error {
            return Err(e);
        }
        let output = sink.finish().await?;

        let result = RunResult {
            command: self.command.clone(),
            cwd: self.cwd.clone(),
            status: RunStatus::from_exit(exit),
            output,
            duration: self.started.elapsed(),
        };

        info!(
            cmd = %result.command,
            status = ?result.status,
            duration_ms = result.duration.as_millis() as u64,
            "process exited"
        );

        if let Some(err) = result.failure() {
            let _ = self.events.send(RunEvent::Failed {
                status: result.status,
                message: err.to_string(),
            });
        }
        let _ = self.events.send(RunEvent::Exited(result.status));

        Ok(result)
    }
}
