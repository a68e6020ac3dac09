//! linkwatch.toml configuration parser.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use linkwatch_health::{WatchdogConfig, parse_duration};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkwatchConfig {
    pub watchdog: WatchdogSection,
    #[serde(default, rename = "component")]
    pub components: Vec<ComponentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogSection {
    pub interface: Option<String>,
    pub period: String,
    #[serde(default)]
    pub timeout_ms: u64,
    pub endpoint_timeout_ms: Option<u64>,
    #[serde(default)]
    pub initial_delay: bool,
    #[serde(default)]
    pub addresses: TargetList,
    #[serde(default)]
    pub endpoints: TargetList,
}

/// Targets given either as an array or as one comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetList {
    List(Vec<String>),
    Csv(String),
}

impl Default for TargetList {
    fn default() -> Self {
        TargetList::List(Vec::new())
    }
}

impl TargetList {
    /// The list in comma-separated form.
    pub fn joined(&self) -> String {
        match self {
            TargetList::List(items) => items.join(","),
            TargetList::Csv(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl LinkwatchConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: LinkwatchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.period()?;

        let mut names = HashSet::new();
        for component in &self.components {
            if component.name.trim().is_empty() {
                bail!("component name must not be empty");
            }
            if component.command.trim().is_empty() {
                bail!("component {} has no command", component.name);
            }
            if !names.insert(component.name.as_str()) {
                bail!("duplicate component name: {}", component.name);
            }
        }
        Ok(())
    }

    fn period(&self) -> anyhow::Result<Duration> {
        match parse_duration(&self.watchdog.period) {
            Some(period) if !period.is_zero() => Ok(period),
            _ => bail!("invalid period: {:?}", self.watchdog.period),
        }
    }

    /// Construction parameters for the health check.
    pub fn watchdog_config(&self) -> anyhow::Result<WatchdogConfig> {
        let section = &self.watchdog;
        let mut config = WatchdogConfig::new(self.period()?)
            .with_timeout_ms(section.timeout_ms)
            .with_initial_delay(section.initial_delay);
        if let Some(interface) = &section.interface {
            config = config.with_interface(interface.clone());
        }
        if let Some(ms) = section.endpoint_timeout_ms {
            config = config.with_endpoint_timeout(Duration::from_millis(ms));
        }
        Ok(config)
    }
}
