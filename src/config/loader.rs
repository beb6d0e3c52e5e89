use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::types::Config;

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        debug!(path = %path.display(), "loading configuration");

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(yaml).context("failed to parse YAML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.defaults.baud_rate == 0 {
            anyhow::bail!("defaults.baud_rate must be non-zero");
        }

        if self.defaults.read_timeout.is_zero() {
            anyhow::bail!("defaults.read_timeout must be non-zero");
        }

        if self.defaults.event_capacity == 0 {
            anyhow::bail!("defaults.event_capacity must be non-zero");
        }

        if self.probe.baud_rate == 0 {
            anyhow::bail!("probe.baud_rate must be non-zero");
        }

        if self.probe.ussd_codes.is_empty() {
            anyhow::bail!("probe.ussd_codes must list at least one code");
        }

        // Validate autoconnect ports are unique
        let mut ports = std::collections::HashSet::new();
        for port in &self.autoconnect {
            if !ports.insert(port) {
                anyhow::bail!("duplicate autoconnect port: {}", port);
            }
        }

        info!("configuration validated successfully");
        Ok(())
    }
}
