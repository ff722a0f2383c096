//! Remote module loading.
//!
//! Both load commands share [`load_and_bind`]: ask the registry to fetch and
//! bind the descriptor, tell the session, and report the module path.
//! Named modules add two steps in front of it: an optional password check
//! and resolving `<origin>/<name>.json`.

use std::sync::Arc;

use url::Url;

use atlas_registry::{LoadSource, Module};
use atlas_types::config::NamedModuleConfig;
use atlas_types::error::{AtlasError, Result};

use crate::interpreter::Context;

/// Compare two byte slices in constant time.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Passwords compare case-insensitively with surrounding whitespace ignored.
fn normalize_secret(secret: &str) -> String {
    secret.trim().to_lowercase()
}

/// A well-known module with its own `load <name>` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedModule {
    name: String,
    password: Option<String>,
}

impl NamedModule {
    pub fn new(name: impl Into<String>, password: Option<String>) -> Self {
        Self {
            name: name.into(),
            password,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requires_password(&self) -> bool {
        self.password.is_some()
    }

    /// Lower-cased form used in titles and command identifiers.
    pub fn display_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Manifest identifier, e.g. `loadExcalibur` or `loadEcr`.
    pub fn command_name(&self) -> String {
        let display = self.display_name();
        let mut chars = display.chars();
        match chars.next() {
            Some(first) => format!("load{}{}", first.to_uppercase(), chars.as_str()),
            None => "load".to_string(),
        }
    }

    pub fn title(&self) -> String {
        format!("Load {} Module", self.display_name())
    }

    pub fn syntax(&self) -> String {
        if self.requires_password() {
            format!("load {} (password string)", self.name)
        } else {
            format!("load {}", self.name)
        }
    }

    /// Check a supplied password. Modules without a password accept
    /// anything, including nothing.
    pub fn authenticate(&self, supplied: Option<&str>) -> Result<()> {
        let Some(expected) = &self.password else {
            return Ok(());
        };
        let accepted = supplied.is_some_and(|s| {
            constant_time_eq(
                normalize_secret(s).as_bytes(),
                normalize_secret(expected).as_bytes(),
            )
        });
        if accepted {
            Ok(())
        } else {
            log::warn!("Rejected load of {}: incorrect or missing password", self.name);
            Err(AtlasError::Authentication(
                "incorrect or missing password".into(),
            ))
        }
    }

    /// Descriptor location: `<origin>/<name>.json`.
    pub fn source(&self, origin: &Url) -> Result<LoadSource> {
        Ok(LoadSource::new(origin.join(&format!("/{}.json", self.name))?))
    }
}

impl From<&NamedModuleConfig> for NamedModule {
    fn from(config: &NamedModuleConfig) -> Self {
        Self::new(config.name.clone(), config.password.clone())
    }
}

/// Confirmation shown after a successful load.
pub fn loaded_message(module: &Module) -> String {
    format!("module {} loaded", module.path())
}

/// Load `source` through the registry and bind the result to the session.
///
/// Registry failures propagate unchanged and the session is not notified.
pub async fn load_and_bind(ctx: &Context, source: &LoadSource) -> Result<String> {
    let module = ctx.registry.load(source).await?;
    ctx.session.module_loaded(Arc::clone(&module));
    Ok(loaded_message(&module))
}
