use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Environment variable naming an optional YAML config file.
pub const CONFIG_FILE_ENV: &str = "FERRULE_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port to serve on
    pub port: u16,
    /// Directory served by the file server
    pub document_root: PathBuf,
    /// Graceful shutdown grace period, in seconds
    pub timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            document_root: PathBuf::from("."),
            timeout: 5,
        }
    }
}

impl Config {
    /// Defaults, then the YAML file named by `FERRULE_CONFIG` (if set),
    /// then `PORT`, `DOCUMENT_ROOT` and `TIMEOUT` from the environment.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Overrides fields from `lookup`, which maps a variable name to its
    /// value.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("invalid PORT: {port}"))?;
        }
        if let Some(root) = lookup("DOCUMENT_ROOT") {
            self.document_root = PathBuf::from(root);
        }
        if let Some(timeout) = lookup("TIMEOUT") {
            self.timeout = timeout
                .trim()
                .parse()
                .with_context(|| format!("invalid TIMEOUT: {timeout}"))?;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
