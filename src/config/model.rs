// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::RunSpec;
use crate::ports::PortQuery;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [ports]
/// poll_interval_ms = 1000
/// timeout_secs = 60
///
/// [deps]
/// manifest = "package.json"
/// lockfile = "yarn.lock"
/// refetch = "yarn add {source}"
///
/// [step.api]
/// cmd = "node server.js"
/// background = true
/// free_ports = [8080]
/// ready_ports = [{ port = 8080, name = "api" }]
///
/// [step.test]
/// cmd = "npm test"
/// log = "logs/test.log"
/// title = "test"
/// ```
///
/// All sections are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub ports: PortsSection,

    #[serde(default)]
    pub deps: DepsSection,

    /// Named steps from `[step.<name>]`.
    #[serde(default)]
    pub step: BTreeMap<String, StepConfig>,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub ports: PortsSection,
    pub deps: DepsSection,
    pub step: BTreeMap<String, StepConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        ports: PortsSection,
        deps: DepsSection,
        step: BTreeMap<String, StepConfig>,
    ) -> Self {
        Self { ports, deps, step }
    }

    /// A `PortQuery` for `port` using the configured interval and timeout.
    pub fn port_query(&self, port: u16) -> PortQuery {
        PortQuery::new(port)
            .timeout_secs(self.ports.timeout_secs)
            .interval(self.ports.poll_interval())
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            PortsSection::default(),
            DepsSection::default(),
            BTreeMap::new(),
        )
    }
}

/// `[ports]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortsSection {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u32,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u32 {
    60
}

impl PortsSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for PortsSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// `[deps]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DepsSection {
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    #[serde(default = "default_lockfile")]
    pub lockfile: PathBuf,

    /// Command template for a single refetch; `{name}` and `{source}` are
    /// substituted.
    #[serde(default = "default_refetch")]
    pub refetch: String,
}

fn default_manifest() -> PathBuf {
    PathBuf::from("package.json")
}

fn default_lockfile() -> PathBuf {
    PathBuf::from("yarn.lock")
}

fn default_refetch() -> String {
    "yarn add {source}".to_string()
}

impl Default for DepsSection {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            lockfile: default_lockfile(),
            refetch: default_refetch(),
        }
    }
}

/// `[step.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// The command to execute.
    pub cmd: String,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Interpret `cmd` with the shell. When false, `cmd` is split into words.
    #[serde(default = "default_true")]
    pub shell: bool,

    #[serde(default)]
    pub log: Option<PathBuf>,

    #[serde(default)]
    pub append_log: bool,

    #[serde(default = "default_true")]
    pub console: bool,

    #[serde(default)]
    pub title: Option<String>,

    /// Start the step and move on without waiting for it to exit.
    #[serde(default)]
    pub background: bool,

    /// Ports whose listener is killed before the step starts.
    #[serde(default)]
    pub free_ports: Vec<u16>,

    /// Ports that must be listening before the next step runs.
    #[serde(default)]
    pub ready_ports: Vec<ReadyPort>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadyPort {
    pub port: u16,
    #[serde(default)]
    pub timeout_secs: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
}

impl StepConfig {
    /// Turn the step into a `RunSpec`.
    ///
    /// Non-shell commands are split with shell word rules; validation has
    /// already checked they split cleanly.
    pub fn to_run_spec(&self) -> crate::errors::Result<RunSpec> {
        let mut spec = if self.shell {
            RunSpec::shell(self.cmd.clone())
        } else {
            let words = shell_words::split(&self.cmd).map_err(|e| {
                crate::errors::DevtaskError::ConfigError(format!(
                    "cannot split command {:?}: {e}",
                    self.cmd
                ))
            })?;
            let mut words = words.into_iter();
            let program = words.next().unwrap_or_default();
            RunSpec::program(program, words)
        };

        if let Some(dir) = &self.cwd {
            spec = spec.cwd(dir.clone());
        }
        for (key, value) in &self.env {
            spec = spec.env(key.clone(), value.clone());
        }
        if let Some(log) = &self.log {
            spec = spec.log(log.clone()).append_log(self.append_log);
        }
        if let Some(title) = &self.title {
            spec = spec.title(title.clone());
        }
        Ok(spec.console(self.console))
    }
}
