// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile, StepConfig};
use crate::errors::{DevtaskError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::DevtaskError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.ports, raw.deps, raw.step))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_ports_section(cfg)?;
    validate_deps_section(cfg)?;
    for (name, step) in cfg.step.iter() {
        validate_step(name, step)?;
    }
    Ok(())
}

fn validate_ports_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.ports.poll_interval_ms == 0 {
        return Err(DevtaskError::ConfigError(
            "[ports].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_deps_section(cfg: &RawConfigFile) -> Result<()> {
    let refetch = &cfg.deps.refetch;
    if !refetch.contains("{source}") && !refetch.contains("{name}") {
        return Err(DevtaskError::ConfigError(format!(
            "[deps].refetch must reference {{name}} or {{source}} (got {:?})",
            refetch
        )));
    }
    Ok(())
}

fn validate_step(name: &str, step: &StepConfig) -> Result<()> {
    if step.cmd.trim().is_empty() {
        return Err(DevtaskError::ConfigError(format!(
            "step '{}' has an empty `cmd`",
            name
        )));
    }

    if !step.shell {
        let words = shell_words::split(&step.cmd).map_err(|e| {
            DevtaskError::ConfigError(format!("step '{}' has an unparsable `cmd`: {}", name, e))
        })?;
        if words.is_empty() {
            return Err(DevtaskError::ConfigError(format!(
                "step '{}' has an empty `cmd`",
                name
            )));
        }
    }

    if step.free_ports.contains(&0) || step.ready_ports.iter().any(|p| p.port == 0) {
        return Err(DevtaskError::ConfigError(format!(
            "step '{}' references port 0",
            name
        )));
    }

    if !step.ready_ports.is_empty() && !step.background {
        return Err(DevtaskError::ConfigError(format!(
            "step '{}' has `ready_ports` but is not a background step",
            name
        )));
    }

    Ok(())
}
