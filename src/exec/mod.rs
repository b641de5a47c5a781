// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for running external commands with
//! `tokio::process::Command` and keeping track of the ones still alive.
//!
//! - [`spec`] describes one invocation (`RunSpec`).
//! - [`runner`] launches and supervises a run, producing a `RunResult`.
//! - [`output`] splits, mirrors and persists process output.
//! - [`console`] is the sink for the pre-run banner and mirrored lines.
//! - [`registry`] tracks live processes so they can be torn down together.
//! - [`terminate`] sends the actual termination requests.
//! - [`signals`] wires Ctrl-C / `SIGTERM` to the registry, when asked to.
//! - [`capture`] runs short commands whose output is needed as a value.

pub mod capture;
pub mod console;
pub mod output;
pub mod registry;
pub mod runner;
pub mod signals;
pub mod spec;
pub mod terminate;

pub use capture::exec_capture;
pub use console::{ConsoleSink, TracingConsole};
pub use output::{CapturedOutput, Chunk, Stream, split_chunk_lines};
pub use registry::{KillReport, LiveProcess, ProcessRegistry, Registration};
pub use runner::{ProcessRunner, RunEvent, RunHandle, RunResult, RunStatus};
pub use signals::{ShutdownPolicy, install_shutdown_handlers};
pub use spec::RunSpec;
pub use terminate::{SignalTerminator, Terminate, Termination};
