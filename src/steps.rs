// src/steps.rs

//! Named build steps run in sequence around the process runner.
//!
//! Per step: free its ports, then either run it to completion or, for a
//! background step, start it and wait until its ready ports listen. When the
//! sequence ends (or fails), background processes are terminated through the
//! registry.

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::config::{ConfigFile, StepConfig};
use crate::errors::{DevtaskError, Result};
use crate::exec::{CapturedOutput, ProcessRunner, RunEvent, RunHandle, RunResult};
use crate::ports::{PortKiller, PortWaiter};

const BACKGROUND_EXIT_GRACE: Duration = Duration::from_secs(5);

/// Result of one step of a sequence.
#[derive(Debug)]
pub struct StepOutcome {
    pub name: String,
    /// `None` for background steps, which are still running when the step ends.
    pub result: Option<RunResult>,
}

#[derive(Debug, Clone)]
pub struct StepRunner {
    config: ConfigFile,
    runner: ProcessRunner,
    waiter: PortWaiter,
    killer: PortKiller,
}

impl StepRunner {
    pub fn new(
        config: ConfigFile,
        runner: ProcessRunner,
        waiter: PortWaiter,
        killer: PortKiller,
    ) -> Self {
        Self {
            config,
            runner,
            waiter,
            killer,
        }
    }

    /// Run the named steps in order, stopping at the first failure.
    pub async fn run_steps(&self, names: &[String]) -> Result<Vec<StepOutcome>> {
        let steps = names
            .iter()
            .map(|name| {
                self.config
                    .step
                    .get(name)
                    .map(|step| (name.as_str(), step))
                    .ok_or_else(|| DevtaskError::ConfigError(format!("unknown step '{name}'")))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut background = Vec::new();
        let mut outcomes = Vec::with_capacity(steps.len());
        let mut failure = None;

        for (name, step) in steps {
            match self.run_step(name, step, &mut background).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(step = %name, error = %e, "step failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        self.stop_background(background).await;

        match failure {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    }

    async fn run_step(
        &self,
        name: &str,
        step: &StepConfig,
        background: &mut Vec<(String, RunHandle)>,
    ) -> Result<StepOutcome> {
        for port in &step.free_ports {
            let outcome = self.killer.kill_port_async(*port).await;
            info!(step = %name, port, ?outcome, "freed port");
        }

        let spec = step.to_run_spec()?;

        if !step.background {
            let result = self.runner.run(&spec).await?;
            if let Some(err) = result.failure() {
                if let CapturedOutput::Persisted(path) = &result.output {
                    error!(step = %name, log = %path.display(), "step output was written to log file");
                }
                return Err(err);
            }
            return Ok(StepOutcome {
                name: name.to_string(),
                result: Some(result),
            });
        }

        let mut handle = self.runner.start(&spec).await?;
        if let Some(mut events) = handle.take_events() {
            let step_name = name.to_string();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(RunEvent::Failed { message, .. }) => {
                            warn!(step = %step_name, "background step failed: {}", message);
                        }
                        Ok(RunEvent::Exited(_)) | Err(RecvError::Closed) => break,
                        Ok(RunEvent::Output(_)) | Err(RecvError::Lagged(_)) => {}
                    }
                }
            });
        }
        background.push((name.to_string(), handle));

        for ready in &step.ready_ports {
            let mut query = self.config.port_query(ready.port);
            if let Some(secs) = ready.timeout_secs {
                query = query.timeout_secs(secs);
            }
            let label = ready.name.clone().unwrap_or_else(|| name.to_string());
            query = query.name(label);
            self.waiter.wait_for_port(&query).await?;
        }

        Ok(StepOutcome {
            name: name.to_string(),
            result: None,
        })
    }

    async fn stop_background(&self, background: Vec<(String, RunHandle)>) {
        if background.is_empty() {
            return;
        }

        let report = self.runner.registry().kill_all();
        info!(
            requested = report.requested.len(),
            already_gone = report.already_gone.len(),
            "stopping background steps"
        );

        for (name, handle) in background {
            match tokio::time::timeout(BACKGROUND_EXIT_GRACE, handle.wait()).await {
                Ok(Ok(result)) => info!(step = %name, status = ?result.status, "background step stopped"),
                Ok(Err(e)) => warn!(step = %name, error = %e, "background step ended with an error"),
                Err(_) => warn!(step = %name, "background step did not exit in time"),
            }
        }
    }
}
