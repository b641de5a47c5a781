// src/exec/output.rs

//! Output plumbing for a single run.
//!
//! Chunks arrive from the stdout/stderr readers in arrival order. The
//! [`OutputSink`] owns everything a run writes to: the optional log file, the
//! console mirror and the in-memory capture.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::errors::Result;
use crate::exec::console::ConsoleSink;
use crate::exec::spec::RunSpec;

/// Which pipe a chunk was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Raw bytes read from one of the child's pipes.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub stream: Stream,
    pub data: Vec<u8>,
}

/// Where the combined output of a finished run can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedOutput {
    /// Output kept in memory (no log file was configured).
    Inline(Vec<u8>),
    /// Output persisted to the run's log file.
    Persisted(PathBuf),
}

impl CapturedOutput {
    /// The captured text, reading the log file back when persisted.
    pub fn text(&self) -> Result<String> {
        match self {
            CapturedOutput::Inline(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            CapturedOutput::Persisted(path) => Ok(std::fs::read_to_string(path)?),
        }
    }
}

/// Split one chunk of output into console lines.
///
/// Trailing whitespace of the chunk is dropped, the rest is split on `\n`
/// and a trailing `\r` is stripped from each line. A partial last line is
/// still returned; nothing is buffered across chunks.
pub fn split_chunk_lines(chunk: &str) -> Vec<&str> {
    let trimmed = chunk.trim_end();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

pub(crate) struct OutputSink {
    log: Option<(PathBuf, File)>,
    console: Option<Arc<dyn ConsoleSink>>,
    title: Option<String>,
    captured: Vec<u8>,
}

impl OutputSink {
    /// Open (truncate or append) the log file and prepare console mirroring.
    pub(crate) async fn open(spec: &RunSpec, console: Arc<dyn ConsoleSink>) -> Result<Self> {
        let log = match &spec.log_path {
            Some(path) => {
                let mut opts = OpenOptions::new();
                opts.create(true);
                if spec.append_log {
                    opts.append(true);
                } else {
                    opts.write(true).truncate(true);
                }
                let file = opts.open(path).await?;
                Some((path.clone(), file))
            }
            None => None,
        };

        Ok(Self {
            log,
            console: spec.mirrors_to_console().then_some(console),
            title: spec.title.clone(),
            captured: Vec::new(),
        })
    }

    pub(crate) async fn write(&mut self, chunk: &Chunk) -> Result<()> {
        match &mut self.log {
            Some((_, file)) => file.write_all(&chunk.data).await?,
            None => self.captured.extend_from_slice(&chunk.data),
        }

        if let Some(console) = &self.console {
            let text = String::from_utf8_lossy(&chunk.data);
            for line in split_chunk_lines(&text) {
                match &self.title {
                    Some(title) => console.emit(&format!("{title} | {line}")),
                    None => console.emit(line),
                }
            }
        }
        Ok(())
    }

    /// Flush the log file and hand back where the output lives.
    pub(crate) async fn finish(self) -> Result<CapturedOutput> {
        match self.log {
            Some((path, mut file)) => {
                file.flush().await?;
                Ok(CapturedOutput::Persisted(path))
            }
            None => Ok(CapturedOutput::Inline(self.captured)),
        }
    }
}
