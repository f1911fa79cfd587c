//! CLI execution context.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use edge_gateway::GatewayConfig;

use crate::config::find_config;
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// Gateway configuration.
    pub config: GatewayConfig,
    /// File the configuration came from, if any.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load the config given on the command line, or the nearest one found
    /// from the working directory, or the defaults.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config_path = match config_path {
            Some(path) => Some(PathBuf::from(path)),
            None => find_config(&cwd),
        };
        let config = match &config_path {
            Some(path) => {
                output.debug(&format!("Using config {}", path.display()));
                GatewayConfig::load(path)?
            }
            None => GatewayConfig::default(),
        };

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }

    /// Resolve a path relative to the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        if PathBuf::from(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.cwd.join(path)
        }
    }
}
