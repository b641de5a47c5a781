// src/exec/spec.rs

//! Immutable description of a single subprocess invocation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::errors::{DevtaskError, Result};

/// One subprocess invocation.
///
/// With `shell = true` (the default) `program` is a full command line handed
/// to `sh -c` (or `cmd /C` on Windows) and `args` must be empty. With
/// `shell = false`, `program` is executed directly with `args`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub shell: bool,
    pub log_path: Option<PathBuf>,
    pub append_log: bool,
    pub console: bool,
    pub title: Option<String>,
}

impl RunSpec {
    /// A shell command line with console mirroring and no log file.
    pub fn shell(command_line: impl Into<String>) -> Self {
        Self {
            program: command_line.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            shell: true,
            log_path: None,
            append_log: false,
            console: true,
            title: None,
        }
    }

    /// A program executed directly (no shell interpretation).
    pub fn program<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            shell: false,
            ..Self::shell(program)
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn log(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn append_log(mut self, append: bool) -> Self {
        self.append_log = append;
        self
    }

    pub fn console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Whether output lines go to the console sink.
    ///
    /// Without a log file, output is always mirrored so it is never dropped.
    pub fn mirrors_to_console(&self) -> bool {
        self.console || self.log_path.is_none()
    }

    /// The command line as it is logged and reported in failures.
    pub fn command_line(&self) -> String {
        if self.shell {
            return self.program.clone();
        }
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }

    /// Working directory made absolute against the current directory.
    pub fn resolved_cwd(&self) -> PathBuf {
        let dir = self.cwd.as_deref().unwrap_or(Path::new("."));
        let absolute = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
        std::fs::canonicalize(&absolute).unwrap_or(absolute)
    }

    /// Check the invariants that must hold before launch.
    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(DevtaskError::InvalidSpec(
                "command line must not be empty".to_string(),
            ));
        }
        if self.shell && !self.args.is_empty() {
            return Err(DevtaskError::InvalidSpec(format!(
                "shell command `{}` cannot take a separate argument vector",
                self.program
            )));
        }
        if let Some(log) = &self.log_path {
            let parent = match log.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            };
            if !parent.is_dir() {
                return Err(DevtaskError::InvalidSpec(format!(
                    "log directory {:?} does not exist",
                    parent
                )));
            }
        }
        Ok(())
    }

    /// Build the tokio command for this spec (stdio is configured by the runner).
    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = if self.shell {
            shell_command(&self.program)
        } else {
            let mut c = Command::new(&self.program);
            c.args(&self.args);
            c
        };
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(&self.env);
        cmd
    }
}

/// Build a shell command appropriate for the platform.
pub(crate) fn shell_command(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command_line);
        c
    }
}
