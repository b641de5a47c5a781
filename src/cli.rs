// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `devtask`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "devtask",
    version,
    about = "Build-automation helpers: supervised commands, port synchronization and git dependency refresh.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Devtask.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEVTASK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run configured steps in the given order.
    Run {
        #[arg(value_name = "STEP", required = true)]
        steps: Vec<String>,
    },

    /// Run an ad-hoc command under supervision.
    Exec {
        /// Working directory.
        #[arg(long, value_name = "DIR")]
        cwd: Option<PathBuf>,

        /// Write all output to this file.
        #[arg(long, value_name = "FILE")]
        log: Option<PathBuf>,

        /// Append to the log file instead of truncating it.
        #[arg(long, requires = "log")]
        append: bool,

        /// Prefix for mirrored output lines.
        #[arg(long, value_name = "TITLE")]
        title: Option<String>,

        /// Do not mirror output to the console (only with --log).
        #[arg(long, requires = "log")]
        quiet: bool,

        /// Execute the program directly instead of through the shell.
        #[arg(long)]
        no_shell: bool,

        #[arg(last = true, required = true, value_name = "CMD")]
        command: Vec<String>,
    },

    /// Wait until a TCP port is listening.
    WaitPort {
        port: u16,

        /// Failed polls tolerated before giving up.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u32>,

        /// Service name used in the timeout message.
        #[arg(long)]
        name: Option<String>,
    },

    /// Kill the process listening on a TCP port, if there is exactly one.
    KillPort { port: u16 },

    /// Exit non-zero unless every port is listening.
    CheckPorts {
        #[arg(required = true)]
        ports: Vec<u16>,
    },

    /// Refetch git dependencies whose lockfile pin is behind the remote.
    UpgradeGit {
        /// Only print decisions.
        #[arg(long)]
        dry_run: bool,
    },

    /// Summarise the git state of repositories under a directory.
    GitCheck {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
