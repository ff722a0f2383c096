//! Command interpreter and terminal session.
//!
//! The terminal is a registry-based dispatch system. Commands implement the
//! `Command` trait and declare syntax forms in their manifest. The
//! interpreter tokenizes input lines, matches them against those forms, and
//! dispatches `execute()`; asynchronous commands run on the tokio runtime.
//!
//! The component commands load remote modules into the module registry and
//! list what it contains.

pub mod component_commands;
mod interpreter;
pub mod loader;
mod session;

/// Path of the module that documents the component commands.
pub use component_commands::COMPONENTS_MODULE;
/// Build the module describing every registered command.
pub use component_commands::components_module;
/// Register the load and list commands into a registry.
pub use component_commands::register_component_commands;
/// Values bound to a command's syntax slots.
pub use interpreter::Arguments;
/// A single executable command trait.
pub use interpreter::Command;
/// Static description of a command (name, title, syntax forms).
pub use interpreter::CommandManifest;
/// Output produced by a command (message, module list, component list).
pub use interpreter::CommandOutput;
/// Registry of available commands with dispatch.
pub use interpreter::CommandRegistry;
/// Services passed to every command.
pub use interpreter::Context;
/// Immediate or pending result of dispatching a line.
pub use interpreter::Dispatch;
/// How slot values reach a handler.
pub use interpreter::ParametersForm;
/// Declared result kind of a command.
pub use interpreter::ReturnType;
/// Split a command line into tokens.
pub use interpreter::tokenize;
/// A module with its own `load <name>` command.
pub use loader::NamedModule;
/// The shell instance loaded modules are bound into.
pub use session::{Session, Terminal};
