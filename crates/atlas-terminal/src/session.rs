//! The active shell session.

use std::sync::Arc;

use parking_lot::RwLock;
use url::Url;

use atlas_registry::{Module, ModulePath, ModuleSummary, project_module};

/// The shell instance that loaded modules are bound into.
pub trait Session: Send + Sync {
    /// Origin that named modules are fetched from.
    fn origin(&self) -> &Url;

    /// Called exactly once for every successful load, after the module is
    /// in the registry.
    fn module_loaded(&self, module: Arc<Module>);
}

/// Default [`Session`]: remembers what was loaded, in load order.
pub struct Terminal {
    origin: Url,
    loaded: RwLock<Vec<Arc<Module>>>,
}

impl Terminal {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            loaded: RwLock::new(Vec::new()),
        }
    }

    /// Paths of loaded modules, oldest first.
    pub fn loaded_modules(&self) -> Vec<ModulePath> {
        self.loaded
            .read()
            .iter()
            .map(|m| m.path().clone())
            .collect()
    }

    /// Dotted names (`module.command`) of every command contributed by the
    /// loaded modules, including their nested modules.
    pub fn available_commands(&self) -> Vec<String> {
        let mut names = Vec::new();
        for module in self.loaded.read().iter() {
            match project_module(module) {
                Ok(summary) => collect_commands(&module.path().to_string(), &summary, &mut names),
                Err(e) => log::warn!("Skipping commands of {}: {e}", module.path()),
            }
        }
        names
    }
}

fn collect_commands(prefix: &str, summary: &ModuleSummary, out: &mut Vec<String>) {
    let mut stack = vec![(prefix.to_string(), summary)];
    while let Some((path, node)) = stack.pop() {
        out.extend(node.commands.iter().map(|c| format!("{path}.{}", c.name)));
        for child in node.modules.iter().rev() {
            stack.push((format!("{path}.{}", child.name), child));
        }
    }
}

impl Session for Terminal {
    fn origin(&self) -> &Url {
        &self.origin
    }

    fn module_loaded(&self, module: Arc<Module>) {
        log::info!("Module {} is now available in this session", module.path());
        self.loaded.write().push(module);
    }
}
