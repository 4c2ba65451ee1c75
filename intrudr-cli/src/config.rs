//! Configuration file loading and command line overrides

use crate::logging::LoggingConfig;
use crate::Args;
use anyhow::{bail, Context};
use intrudr_engine::DispatchConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of an `intrudr.toml` file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// Load a configuration file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Configuration for a run: the file named by `--config` if any, then
    /// command line flags on top.
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_args(args)?;
        Ok(config)
    }

    pub fn apply_args(&mut self, args: &Args) -> anyhow::Result<()> {
        if let Some(workers) = args.workers {
            self.dispatch.max_workers = workers;
        }
        if let Some(timeout) = args.timeout {
            if !timeout.is_finite() || timeout <= 0.0 {
                bail!("Timeout must be a positive number of seconds");
            }
            self.dispatch.timeout_ms = (timeout * 1000.0).round().max(1.0) as u64;
        }
        if let Some(retries) = args.retries {
            self.dispatch.retries = retries;
        }
        if let Some(proxy) = &args.proxy {
            self.dispatch.proxy = Some(proxy.clone());
        }
        if args.verify_tls {
            self.dispatch.verify_tls = true;
        }
        if args.no_raw {
            self.dispatch.record_raw = false;
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }

        self.dispatch
            .validate()
            .context("Invalid dispatch configuration")?;
        Ok(())
    }
}
