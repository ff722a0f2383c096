//! Shell configuration (`atlas.toml`).
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AtlasError, Result};

/// Origin used when the configuration does not name one.
pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";

/// A well-known module that gets its own `load <name>` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedModuleConfig {
    /// Module name as typed after `load`; also the descriptor file stem.
    pub name: String,
    /// Secret required before the module may be fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Top-level shell configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Session origin; named modules are fetched from `<origin>/<name>.json`.
    pub origin: String,
    /// Default `env_logger` filter (overridden by `RUST_LOG`).
    pub log_filter: String,
    /// Transport timeout for descriptor fetches. Absent means no timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_secs: Option<u64>,
    /// Table of named modules, in command registration order.
    pub named_modules: Vec<NamedModuleConfig>,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            log_filter: "info".to_string(),
            fetch_timeout_secs: None,
            named_modules: vec![
                NamedModuleConfig {
                    name: "excalibur".to_string(),
                    password: None,
                },
                NamedModuleConfig {
                    name: "ECR".to_string(),
                    password: Some("sunburn".to_string()),
                },
            ],
        }
    }
}

impl AtlasConfig {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| AtlasError::Config(format!("atlas.toml: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        log::debug!("Read configuration from {}", path.display());
        Self::from_toml(&text)
    }

    /// The parsed session origin.
    pub fn origin(&self) -> Result<Url> {
        Ok(Url::parse(&self.origin)?)
    }

    /// Transport timeout, if one is configured.
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    /// Check the invariants the loader relies on.
    pub fn validate(&self) -> Result<()> {
        let origin = self
            .origin()
            .map_err(|e| AtlasError::Config(format!("origin {:?}: {e}", self.origin)))?;
        if origin.cannot_be_a_base() {
            return Err(AtlasError::Config(format!(
                "origin {:?} cannot be used as a base URL",
                self.origin
            )));
        }

        let mut seen = HashSet::new();
        for entry in &self.named_modules {
            if entry.name.is_empty() {
                return Err(AtlasError::Config("named module with empty name".into()));
            }
            if entry.name.contains(|c: char| c == '/' || c.is_whitespace()) {
                return Err(AtlasError::Config(format!(
                    "named module {:?} must not contain '/' or whitespace",
                    entry.name
                )));
            }
            if !seen.insert(entry.name.to_lowercase()) {
                return Err(AtlasError::Config(format!(
                    "duplicate named module {:?}",
                    entry.name
                )));
            }
            if entry
                .password
                .as_deref()
                .is_some_and(|p| p.trim().is_empty())
            {
                return Err(AtlasError::Config(format!(
                    "named module {:?} has a blank password",
                    entry.name
                )));
            }
        }
        Ok(())
    }
}
