// src/logging.rs

//! Logging for `devtask`: one `tracing-subscriber` fmt layer on stderr, so
//! stdout only carries command results (`check-ports`, `upgrade-git
//! --dry-run`, `git-check`).
//!
//! The subscriber carries two streams:
//! - diagnostics from the crate, filtered by level;
//! - mirrored subprocess output on [`CONSOLE_TARGET`], kept at `info` unless
//!   the filter names that target itself (e.g. `devtask::console=off`).
//!
//! `--log-level` wins; otherwise `DEVTASK_LOG` is read as `EnvFilter`
//! directives; otherwise `info`.

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Target of mirrored process output and run banners.
pub const CONSOLE_TARGET: &str = "devtask::console";

const LOG_ENV: &str = "DEVTASK_LOG";

pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = build_filter(cli_level, env.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))
}

/// Filter for the given flag and `DEVTASK_LOG` value.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    let env = env.map(str::trim).filter(|s| !s.is_empty());
    let mut directives = match (cli_level, env) {
        (Some(level), _) => directive(level).to_string(),
        (None, Some(env)) => env.to_string(),
        (None, None) => "info".to_string(),
    };
    if !directives.contains(CONSOLE_TARGET) {
        directives.push_str(&format!(",{CONSOLE_TARGET}=info"));
    }

    EnvFilter::try_new(&directives).map_err(|e| anyhow!("invalid log filter {directives:?}: {e}"))
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
