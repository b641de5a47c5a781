// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevtaskError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid run spec: {0}")]
    InvalidSpec(String),

    /// The executable could not be started at all. No `RunResult` exists.
    #[error("[{}] {command}: failed to launch: {source}", cwd.display())]
    Launch {
        command: String,
        cwd: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[{}] {command}: Exit {code}", cwd.display())]
    NonZeroExit {
        command: String,
        cwd: PathBuf,
        code: i32,
    },

    #[error("[{}] {command}: terminated by signal {signal}", cwd.display())]
    SignalTermination {
        command: String,
        cwd: PathBuf,
        signal: i32,
    },

    #[error("Port not ready {port} {name}")]
    PortTimeout { port: u16, name: String },

    #[error("Socket table query failed: {0}")]
    SocketQuery(String),

    #[error("Listing refs of {url} failed: {reason}")]
    RefQuery { url: String, reason: String },

    #[error("Refetching {name} ({declared}) failed: {reason}")]
    RefetchFailure {
        name: String,
        declared: String,
        reason: String,
    },

    #[error("Lockfile parse error at line {line}: {message}")]
    LockfileParse { line: usize, message: String },

    #[error("Manifest error: {0}")]
    ManifestError(String),

    #[error("Output of `{command}` exceeded {limit} bytes")]
    OutputTooLarge { command: String, limit: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DevtaskError>;
