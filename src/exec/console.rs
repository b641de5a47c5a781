// src/exec/console.rs

//! Console sink used for the pre-run banner and mirrored output lines.

use std::fmt::Debug;

use tracing::info;

use crate::logging::CONSOLE_TARGET;

/// Destination for human-readable run output.
///
/// Production uses [`TracingConsole`]; tests plug in a recording sink.
pub trait ConsoleSink: Send + Sync + Debug {
    fn emit(&self, line: &str);
}

/// Emits every line as an `info` event on [`CONSOLE_TARGET`], so
/// mirrored output is timestamped and filtered like the rest of the logs.
#[derive(Debug, Clone, Default)]
pub struct TracingConsole;

impl ConsoleSink for TracingConsole {
    fn emit(&self, line: &str) {
        info!(target: CONSOLE_TARGET, "{}", line);
    }
}
