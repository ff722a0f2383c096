//! Administrative commands over the module registry.
//!
//! - `load <name>` for each named module (with a password slot when the
//!   module is protected)
//! - `load module from (url net.url)`
//! - `list modules [in (path path)]`
//! - `list types|constraints|commands|converters in (path path)`

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use atlas_registry::{
    Component, ComponentKind, LoadSource, Module, ModulePath, project, project_module,
};
use atlas_types::error::Result;

use crate::interpreter::{
    Arguments, Command, CommandManifest, CommandOutput, CommandRegistry, Context, ParametersForm,
    ReturnType,
};
use crate::loader::{NamedModule, load_and_bind};

/// Path of the module describing these commands.
pub const COMPONENTS_MODULE: &str = "atlas.components";

/// Register the load and list commands, one named load per table entry.
pub fn register_component_commands(
    reg: &mut CommandRegistry,
    named: &[NamedModule],
) -> Result<()> {
    for module in named {
        reg.register(Arc::new(LoadNamedCmd::new(module.clone())))?;
    }
    reg.register(Arc::new(LoadCmd::new()))?;
    reg.register(Arc::new(ListModulesCmd::new()))?;
    for kind in [
        ComponentKind::Type,
        ComponentKind::Constraint,
        ComponentKind::Command,
        ComponentKind::Converter,
    ] {
        reg.register(Arc::new(ListComponentsCmd::new(kind)))?;
    }
    Ok(())
}

/// Build the `atlas.components` module: one command component per
/// registered manifest, so the plugin can be listed like any loaded module.
pub fn components_module(reg: &CommandRegistry) -> Result<Arc<Module>> {
    let path: ModulePath = COMPONENTS_MODULE.parse()?;
    let module = Module::new(
        path,
        Component::new("components")
            .with_title("Components")
            .with_description("Load modules and inspect the module registry"),
    );
    for manifest in reg.manifests() {
        module.add_component(
            ComponentKind::Command,
            Component::new(manifest.name.clone())
                .with_title(manifest.title.clone())
                .with_description(manifest.syntax.join(" | ")),
        )?;
    }
    Ok(Arc::new(module))
}

// ---------------------------------------------------------------------------
// load <name>
// ---------------------------------------------------------------------------

struct LoadNamedCmd {
    module: NamedModule,
    manifest: CommandManifest,
}

impl LoadNamedCmd {
    fn new(module: NamedModule) -> Self {
        let manifest = CommandManifest {
            name: module.command_name(),
            title: module.title(),
            syntax: vec![module.syntax()],
            returns: ReturnType::UiMessage,
            parameters_form: ParametersForm::Struct,
            asynchronous: true,
        };
        Self { module, manifest }
    }
}

#[async_trait]
impl Command for LoadNamedCmd {
    fn manifest(&self) -> &CommandManifest {
        &self.manifest
    }

    async fn execute(&self, args: Arguments, ctx: Context) -> Result<CommandOutput> {
        self.module.authenticate(args.get("password"))?;
        let source = self.module.source(ctx.session.origin())?;
        Ok(CommandOutput::Message(load_and_bind(&ctx, &source).await?))
    }
}

// ---------------------------------------------------------------------------
// load module from (url net.url)
// ---------------------------------------------------------------------------

struct LoadCmd {
    manifest: CommandManifest,
}

impl LoadCmd {
    fn new() -> Self {
        Self {
            manifest: CommandManifest {
                name: "load".into(),
                title: "Load Module".into(),
                syntax: vec!["load module from (url net.url)".into()],
                returns: ReturnType::UiMessage,
                parameters_form: ParametersForm::Struct,
                asynchronous: true,
            },
        }
    }
}

#[async_trait]
impl Command for LoadCmd {
    fn manifest(&self) -> &CommandManifest {
        &self.manifest
    }

    async fn execute(&self, args: Arguments, ctx: Context) -> Result<CommandOutput> {
        let url = Url::parse(args.require("url")?)?;
        let source = LoadSource::new(url);
        Ok(CommandOutput::Message(load_and_bind(&ctx, &source).await?))
    }
}

// ---------------------------------------------------------------------------
// list modules [in (path path)]
// ---------------------------------------------------------------------------

struct ListModulesCmd {
    manifest: CommandManifest,
}

impl ListModulesCmd {
    fn new() -> Self {
        Self {
            manifest: CommandManifest {
                name: "listModules".into(),
                title: "List Modules".into(),
                syntax: vec!["list modules".into(), "list modules in (path path)".into()],
                returns: ReturnType::ModuleList,
                parameters_form: ParametersForm::Struct,
                asynchronous: false,
            },
        }
    }
}

#[async_trait]
impl Command for ListModulesCmd {
    fn manifest(&self) -> &CommandManifest {
        &self.manifest
    }

    async fn execute(&self, args: Arguments, ctx: Context) -> Result<CommandOutput> {
        let summaries = ctx
            .registry
            .get_modules(args.get("path"))?
            .iter()
            .map(project_module)
            .collect::<Result<Vec<_>>>()?;
        Ok(CommandOutput::Modules(summaries))
    }
}

// ---------------------------------------------------------------------------
// list <kind>s in (path path)
// ---------------------------------------------------------------------------

struct ListComponentsCmd {
    kind: ComponentKind,
    manifest: CommandManifest,
}

impl ListComponentsCmd {
    fn new(kind: ComponentKind) -> Self {
        let (name, plural) = match kind {
            ComponentKind::Type => ("listTypes", "Types"),
            ComponentKind::Constraint => ("listConstraints", "Constraints"),
            ComponentKind::Command => ("listCommands", "Commands"),
            ComponentKind::Converter => ("listConverters", "Converters"),
        };
        Self {
            kind,
            manifest: CommandManifest {
                name: name.into(),
                title: format!("List {plural}"),
                syntax: vec![format!("list {} in (path path)", plural.to_lowercase())],
                returns: ReturnType::ComponentList,
                parameters_form: ParametersForm::Struct,
                asynchronous: false,
            },
        }
    }
}

#[async_trait]
impl Command for ListComponentsCmd {
    fn manifest(&self) -> &CommandManifest {
        &self.manifest
    }

    async fn execute(&self, args: Arguments, ctx: Context) -> Result<CommandOutput> {
        let module = ctx.registry.get_module(args.require("path")?)?;
        let summaries = module.components(self.kind).iter().map(project).collect();
        Ok(CommandOutput::Components(summaries))
    }
}
