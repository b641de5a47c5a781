#![allow(dead_code)]

use std::collections::BTreeMap;

use devtask::config::{ConfigFile, DepsSection, PortsSection, RawConfigFile, ReadyPort, StepConfig};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                ports: PortsSection::default(),
                deps: DepsSection::default(),
                step: BTreeMap::new(),
            },
        }
    }

    pub fn with_step(mut self, name: &str, step: StepConfig) -> Self {
        self.config.step.insert(name.to_string(), step);
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.ports.poll_interval_ms = ms;
        self
    }

    pub fn port_timeout_secs(mut self, secs: u32) -> Self {
        self.config.ports.timeout_secs = secs;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StepConfig`.
pub struct StepConfigBuilder {
    step: StepConfig,
}

impl StepConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            step: StepConfig {
                cmd: cmd.to_string(),
                cwd: None,
                env: BTreeMap::new(),
                shell: true,
                log: None,
                append_log: false,
                console: true,
                title: None,
                background: false,
                free_ports: vec![],
                ready_ports: vec![],
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.step.title = Some(title.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.step.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn background(mut self) -> Self {
        self.step.background = true;
        self
    }

    pub fn free_port(mut self, port: u16) -> Self {
        self.step.free_ports.push(port);
        self
    }

    pub fn ready_port(mut self, port: u16, name: Option<&str>) -> Self {
        self.step.ready_ports.push(ReadyPort {
            port,
            timeout_secs: None,
            name: name.map(str::to_string),
        });
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}

/// Builder for yarn v1 lockfile text.
#[derive(Default)]
pub struct LockfileBuilder {
    text: String,
}

impl LockfileBuilder {
    pub fn new() -> Self {
        Self {
            text: "# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.\n# yarn lockfile v1\n\n".to_string(),
        }
    }

    /// Add an entry keyed by `name@declared` with the given resolved value.
    pub fn entry(mut self, name: &str, declared: &str, resolved: Option<&str>) -> Self {
        self.text.push_str(&format!("\n\"{name}@{declared}\":\n  version \"1.0.0\"\n"));
        if let Some(resolved) = resolved {
            self.text.push_str(&format!("  resolved \"{resolved}\"\n"));
        }
        self
    }

    pub fn build(self) -> String {
        self.text
    }
}
