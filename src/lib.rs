// src/lib.rs

pub mod cli;
pub mod config;
pub mod deps;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod gitcheck;
pub mod logging;
pub mod ports;
pub mod steps;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info};

use crate::cli::{CliArgs, Command};
use crate::config::{ConfigFile, load_or_default};
use crate::deps::{Action, CommandRefetcher, GitDependencyResolver, GitLsRemote, load_inputs};
use crate::exec::{
    CapturedOutput, ConsoleSink, ProcessRegistry, ProcessRunner, RunSpec, ShutdownPolicy,
    SignalTerminator, Terminate, TracingConsole, install_shutdown_handlers,
};
use crate::fs::RealFileSystem;
use crate::ports::{PortKiller, PortWaiter, ProcNetTable, SocketTable};
use crate::steps::StepRunner;

/// Exit code used when the process is stopped by Ctrl-C / SIGTERM.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Shared collaborators for one CLI invocation.
struct Services {
    runner: ProcessRunner,
    table: Arc<dyn SocketTable>,
    terminator: Arc<dyn Terminate>,
}

impl Services {
    fn new() -> Self {
        let console: Arc<dyn ConsoleSink> = Arc::new(TracingConsole);
        Self {
            runner: ProcessRunner::new(ProcessRegistry::new(), console),
            table: Arc::new(ProcNetTable::new()),
            terminator: Arc::new(SignalTerminator),
        }
    }

    fn waiter(&self) -> PortWaiter {
        PortWaiter::new(Arc::clone(&self.table))
    }

    fn killer(&self) -> PortKiller {
        PortKiller::new(Arc::clone(&self.table), Arc::clone(&self.terminator))
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - process runner / registry / port helpers
/// - Ctrl-C / SIGTERM handling (kill children, then exit)
/// - the selected subcommand
pub async fn run(args: CliArgs) -> Result<ExitCode> {
    let cfg = load_or_default(args.config.as_deref())?;
    let services = Services::new();

    // The binary opts in to signal handling; the library never does this itself.
    let _signals = install_shutdown_handlers(
        services.runner.registry().clone(),
        ShutdownPolicy::KillAllAndExit(INTERRUPTED_EXIT_CODE),
    );

    match args.command {
        Command::Run { steps } => {
            let step_runner = StepRunner::new(
                cfg,
                services.runner.clone(),
                services.waiter(),
                services.killer(),
            );
            let outcomes = step_runner.run_steps(&steps).await?;
            info!(steps = outcomes.len(), "all steps finished");
            Ok(ExitCode::SUCCESS)
        }

        Command::Exec {
            cwd,
            log,
            append,
            title,
            quiet,
            no_shell,
            command,
        } => {
            let mut spec = if no_shell {
                let mut words = command.into_iter();
                let program = words.next().unwrap_or_default();
                RunSpec::program(program, words)
            } else {
                RunSpec::shell(command.join(" "))
            };
            if let Some(dir) = cwd {
                spec = spec.cwd(dir);
            }
            if let Some(path) = log {
                spec = spec.log(path).append_log(append);
            }
            if let Some(title) = title {
                spec = spec.title(title);
            }
            spec = spec.console(!quiet);

            let result = services.runner.run(&spec).await?;
            if let Some(err) = result.failure() {
                if let CapturedOutput::Persisted(path) = &result.output {
                    error!(log = %path.display(), "command output was written to log file");
                }
                return Err(err.into());
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::WaitPort {
            port,
            timeout,
            name,
        } => {
            let mut query = cfg.port_query(port);
            if let Some(secs) = timeout {
                query = query.timeout_secs(secs);
            }
            if let Some(name) = name {
                query = query.name(name);
            }
            services.waiter().wait_for_port(&query).await?;
            Ok(ExitCode::SUCCESS)
        }

        Command::KillPort { port } => {
            let outcome = services.killer().kill_port_async(port).await;
            println!("{port}: {outcome:?}");
            Ok(ExitCode::SUCCESS)
        }

        Command::CheckPorts { ports } => {
            let all_listening = services.waiter().check_ports(&ports)?;
            println!("{}", if all_listening { "listening" } else { "not listening" });
            Ok(if all_listening {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::UpgradeGit { dry_run } => {
            upgrade_git(&cfg, services.runner.clone(), dry_run).await?;
            Ok(ExitCode::SUCCESS)
        }

        Command::GitCheck { dir } => {
            for status in gitcheck::check_workspace(&RealFileSystem, &dir).await? {
                println!("{status}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn upgrade_git(cfg: &ConfigFile, runner: ProcessRunner, dry_run: bool) -> Result<()> {
    let (manifest, lockfile) = load_inputs(&RealFileSystem, &cfg.deps.manifest, &cfg.deps.lockfile)?;
    let resolver = GitDependencyResolver::new(Arc::new(GitLsRemote));

    let decisions = if dry_run {
        resolver.resolve_staleness(&manifest, &lockfile).await?
    } else {
        let mut refetcher = CommandRefetcher::new(runner, cfg.deps.refetch.clone());
        if let Some(dir) = project_dir(&cfg.deps.manifest) {
            refetcher = refetcher.cwd(dir);
        }
        resolver.upgrade(&manifest, &lockfile, &refetcher).await?
    };

    for decision in &decisions {
        let action = match decision.action {
            Action::Skip => "skip",
            Action::Refetch if dry_run => "stale",
            Action::Refetch => "refetched",
        };
        println!("{}: {} ({})", decision.name, action, decision.reason);
    }
    debug!(count = decisions.len(), "dependency check complete");
    Ok(())
}

/// Directory holding the manifest, where the package manager must run.
fn project_dir(manifest: &Path) -> Option<&Path> {
    manifest.parent().filter(|p| !p.as_os_str().is_empty())
}
