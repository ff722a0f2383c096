//! Live registry components.
//!
//! A [`Module`] is shared (`Arc`) between the registry tree and whoever
//! resolved it. Its child collections sit behind a lock so loads can graft
//! new modules into an existing tree while readers take snapshots.

use std::sync::Arc;

use parking_lot::RwLock;

use atlas_types::error::{LoadError, Result};

use crate::path::ModulePath;

/// A named, documented registry entry (type, constraint, command, converter,
/// or the header of a module).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    name: String,
    title: Option<String>,
    description: Option<String>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Title as declared; `None` when the descriptor omitted it.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Description as declared; `None` when the descriptor omitted it.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

#[derive(Debug, Default)]
struct ModuleContents {
    modules: Vec<Arc<Module>>,
    types: Vec<Component>,
    constraints: Vec<Component>,
    commands: Vec<Component>,
    converters: Vec<Component>,
}

/// A namespace node in the registry tree.
///
/// Children keep insertion order. Names are unique within each collection.
#[derive(Debug)]
pub struct Module {
    component: Component,
    path: ModulePath,
    contents: RwLock<ModuleContents>,
}

/// Which flat collection of a module a component belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Type,
    Constraint,
    Command,
    Converter,
}

impl ComponentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Constraint => "constraint",
            Self::Command => "command",
            Self::Converter => "converter",
        }
    }
}

impl Module {
    /// Create an empty module at `path`. The component name should match the
    /// last path segment.
    pub fn new(path: ModulePath, component: Component) -> Self {
        Self {
            component,
            path,
            contents: RwLock::new(ModuleContents::default()),
        }
    }

    /// Create an undocumented namespace module named after the last segment
    /// of `path`.
    pub fn namespace(path: ModulePath) -> Self {
        let name = path.name().unwrap_or_default().to_string();
        Self::new(path, Component::new(name))
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn title(&self) -> Option<&str> {
        self.component.title()
    }

    pub fn description(&self) -> Option<&str> {
        self.component.description()
    }

    pub fn path(&self) -> &ModulePath {
        &self.path
    }

    /// Snapshot of the child modules.
    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.contents.read().modules.clone()
    }

    /// Snapshot of the declared types.
    pub fn types(&self) -> Vec<Component> {
        self.contents.read().types.clone()
    }

    /// Snapshot of the declared constraints.
    pub fn constraints(&self) -> Vec<Component> {
        self.contents.read().constraints.clone()
    }

    /// Snapshot of the declared commands.
    pub fn commands(&self) -> Vec<Component> {
        self.contents.read().commands.clone()
    }

    /// Snapshot of the declared converters.
    pub fn converters(&self) -> Vec<Component> {
        self.contents.read().converters.clone()
    }

    /// Snapshot of one flat collection.
    pub fn components(&self, kind: ComponentKind) -> Vec<Component> {
        match kind {
            ComponentKind::Type => self.types(),
            ComponentKind::Constraint => self.constraints(),
            ComponentKind::Command => self.commands(),
            ComponentKind::Converter => self.converters(),
        }
    }

    /// Child module with the given name.
    pub fn child(&self, name: &str) -> Option<Arc<Module>> {
        self.contents
            .read()
            .modules
            .iter()
            .find(|m| m.name() == name)
            .cloned()
    }

    /// Append a child module. Fails with [`LoadError::Collision`] when a
    /// sibling already has the same name.
    pub fn add_module(&self, module: Arc<Module>) -> Result<()> {
        let mut contents = self.contents.write();
        if contents.modules.iter().any(|m| m.name() == module.name()) {
            return Err(LoadError::Collision(self.path.child(module.name()).to_string()).into());
        }
        contents.modules.push(module);
        Ok(())
    }

    /// Return the child named `name`, creating an empty namespace module for
    /// it first if needed.
    pub fn child_or_namespace(&self, name: &str) -> Arc<Module> {
        let mut contents = self.contents.write();
        if let Some(existing) = contents.modules.iter().find(|m| m.name() == name) {
            return Arc::clone(existing);
        }
        let created = Arc::new(Module::namespace(self.path.child(name)));
        contents.modules.push(Arc::clone(&created));
        created
    }

    /// Append a component to one flat collection. Duplicate names are
    /// rejected as an invalid descriptor.
    pub fn add_component(&self, kind: ComponentKind, component: Component) -> Result<()> {
        let mut contents = self.contents.write();
        let list = match kind {
            ComponentKind::Type => &mut contents.types,
            ComponentKind::Constraint => &mut contents.constraints,
            ComponentKind::Command => &mut contents.commands,
            ComponentKind::Converter => &mut contents.converters,
        };
        if list.iter().any(|c| c.name() == component.name()) {
            return Err(LoadError::Invalid(format!(
                "duplicate {} {:?} in module {}",
                kind.as_str(),
                component.name(),
                self.path
            ))
            .into());
        }
        list.push(component);
        Ok(())
    }
}
