//! Runtime configuration
//!
//! Values are resolved in three layers: built-in defaults, an optional TOML
//! file, then `GLBDASH_*` environment variables. Command-line flags are
//! applied on top by the binary.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, BYTES_PER_MB};

/// Runtime configuration for the dashboard client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Backend base URL, endpoints are resolved relative to it
    /// (default: `"http://localhost:5000/api"`).
    pub base_url: String,

    /// Per-request timeout in seconds (default: `30`).
    pub timeout_secs: u64,

    /// Largest file accepted for upload, in bytes (default: 100 MiB).
    pub max_upload_bytes: u64,

    /// Accepted file extensions including the leading dot (default: `[".glb"]`).
    pub accepted_extensions: Vec<String>,

    /// `tracing` filter string, e.g. `"info"` or `"debug,reqwest=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout_secs: 30,
            max_upload_bytes: 100 * BYTES_PER_MB,
            accepted_extensions: vec![".glb".to_string()],
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl DashboardConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let source = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&source)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `GLBDASH_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GLBDASH_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("GLBDASH_TIMEOUT_SECS") {
            self.timeout_secs = parse_value("GLBDASH_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("GLBDASH_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = parse_value("GLBDASH_MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(v) = lookup("GLBDASH_LOG") {
            self.log_level = v;
        }
        if let Some(v) = lookup("GLBDASH_LOG_JSON") {
            self.log_json = v == "1" || v.eq_ignore_ascii_case("true");
        }
        Ok(())
    }

    /// Reject values the client cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("base_url must not be empty".to_string()));
        }
        if self.accepted_extensions.is_empty() {
            return Err(Error::Config("accepted_extensions must not be empty".to_string()));
        }
        if let Some(bad) = self.accepted_extensions.iter().find(|e| !e.starts_with('.')) {
            return Err(Error::Config(format!(
                "accepted extension {:?} must start with '.'",
                bad
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Upload limit in MB, as shown to users
    pub fn max_upload_mb(&self) -> f64 {
        self.max_upload_bytes as f64 / BYTES_PER_MB as f64
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key}={value:?} is not a valid number")))
}
