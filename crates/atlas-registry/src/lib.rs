//! Module registry.
//!
//! The registry is a tree of named, documented components. Modules own
//! child modules plus flat lists of types, constraints, commands, and
//! converters. Modules enter the tree by compiling a JSON descriptor
//! (usually fetched from a URL) and binding the result under its dotted
//! path.
//!
//! Projections ([`project`], [`project_module`]) turn live components into
//! plain serializable snapshots for listing.

pub mod descriptor;
pub mod module;
pub mod path;
pub mod projection;
pub mod registry;

pub use descriptor::ModuleDescriptor;
pub use module::{Component, ComponentKind, Module};
pub use path::ModulePath;
pub use projection::{ComponentSummary, ModuleSummary, project, project_module};
pub use registry::{LoadSource, ModuleRegistry, Registry};
