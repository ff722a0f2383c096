//! Module descriptors and their structural compiler.
//!
//! A descriptor is the JSON form of a module:
//!
//! ```json
//! {
//!     "name": "io.example.tools",
//!     "title": "Tools",
//!     "types": { "url": { "title": "URL" } },
//!     "commands": [ { "name": "fetch", "description": "Fetch a page" } ],
//!     "modules": { "net": { "types": { "host": {} } } }
//! }
//! ```
//!
//! Every collection may be a JSON array of entries carrying `name`, or an
//! object keyed by entry name. Object key order is kept. Fields the
//! compiler does not understand (syntax, handlers, forms) are ignored.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use atlas_types::error::{LoadError, Result};

use crate::module::{Component, ComponentKind, Module};
use crate::path::ModulePath;

/// Entries that get their name from an object key when they do not carry one.
pub trait Named {
    fn name(&self) -> Option<&str>;
    fn set_name(&mut self, name: String);
}

/// A collection in either array or keyed-object form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Entries<T> {
    Listed(Vec<T>),
    Keyed(Map<String, Value>),
}

impl<T> Default for Entries<T> {
    fn default() -> Self {
        Self::Listed(Vec::new())
    }
}

impl<T: DeserializeOwned + Named> Entries<T> {
    fn into_named(self, what: &str) -> Result<Vec<T>> {
        let entries = match self {
            Self::Listed(items) => items,
            Self::Keyed(map) => map
                .into_iter()
                .map(|(key, value)| {
                    let mut entry: T = serde_json::from_value(value).map_err(LoadError::Malformed)?;
                    if entry.name().is_none() {
                        entry.set_name(key);
                    }
                    Ok(entry)
                })
                .collect::<Result<Vec<T>>>()?,
        };

        let mut seen = HashSet::new();
        for entry in &entries {
            let name = entry
                .name()
                .ok_or_else(|| LoadError::Invalid(format!("{what} entry without a name")))?;
            check_segment(name, what)?;
            if !seen.insert(name.to_string()) {
                return Err(LoadError::Invalid(format!("duplicate {what} {name:?}")).into());
            }
        }
        Ok(entries)
    }
}

fn check_segment(name: &str, what: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(LoadError::Invalid(format!("{what} with an empty name")).into());
    }
    if name.contains('.') {
        return Err(LoadError::Invalid(format!("{what} name {name:?} must not contain '.'")).into());
    }
    Ok(())
}

/// Descriptor of a single non-module component.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComponentDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Named for ComponentDescriptor {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }
}

impl ComponentDescriptor {
    fn compile(self) -> Component {
        let mut component = Component::new(self.name.unwrap_or_default());
        if let Some(title) = self.title {
            component = component.with_title(title);
        }
        if let Some(description) = self.description {
            component = component.with_description(description);
        }
        component
    }
}

/// Descriptor of a module and everything it declares.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleDescriptor {
    /// Required at the top level, where it may be dotted. Nested modules
    /// may take their name from the enclosing object key instead.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub modules: Entries<ModuleDescriptor>,
    #[serde(default)]
    pub types: Entries<ComponentDescriptor>,
    #[serde(default)]
    pub constraints: Entries<ComponentDescriptor>,
    #[serde(default)]
    pub commands: Entries<ComponentDescriptor>,
    #[serde(default)]
    pub converters: Entries<ComponentDescriptor>,
}

impl Named for ModuleDescriptor {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }
}

impl ModuleDescriptor {
    /// Parse descriptor JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text).map_err(LoadError::Malformed)?)
    }

    /// The fully-qualified path this descriptor declares.
    pub fn path(&self) -> Result<ModulePath> {
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| LoadError::Invalid("descriptor has no name".into()))?;
        ModulePath::parse(name)
            .ok_or_else(|| LoadError::Invalid(format!("invalid module name {name:?}")).into())
    }

    /// Compile into a detached module tree rooted at [`Self::path`].
    ///
    /// Nothing is shared with any registry; the caller binds the result.
    pub fn compile(self) -> Result<Arc<Module>> {
        let path = self.path()?;
        self.compile_at(path)
    }

    fn compile_at(self, path: ModulePath) -> Result<Arc<Module>> {
        let name = path.name().unwrap_or_default().to_string();
        let mut header = Component::new(name);
        if let Some(title) = self.title {
            header = header.with_title(title);
        }
        if let Some(description) = self.description {
            header = header.with_description(description);
        }
        let module = Module::new(path, header);

        let collections = [
            (ComponentKind::Type, self.types, "type"),
            (ComponentKind::Constraint, self.constraints, "constraint"),
            (ComponentKind::Command, self.commands, "command"),
            (ComponentKind::Converter, self.converters, "converter"),
        ];
        for (kind, entries, what) in collections {
            for entry in entries.into_named(what)? {
                module.add_component(kind, entry.compile())?;
            }
        }

        for child in self.modules.into_named("module")? {
            let child_name = child.name.clone().unwrap_or_default();
            let child_path = module.path().child(&child_name);
            module.add_module(child.compile_at(child_path)?)?;
        }

        Ok(Arc::new(module))
    }
}
