//! Command trait, manifests, registry, and dispatch logic.
//!
//! Commands declare one or more syntax forms made of literal words and
//! `(name type)` slots. A line is tokenized (quotes and backslash escapes
//! supported), then matched against every form in registration order; the
//! first form that consumes the whole line wins.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;

use atlas_registry::{ComponentSummary, ModuleSummary, Registry};
use atlas_types::error::{AtlasError, Result};

use crate::session::Session;

/// What a command hands back to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    /// A human-readable message.
    UiMessage,
    /// A list of module summaries.
    ModuleList,
    /// A list of component summaries.
    ComponentList,
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UiMessage => "ui.message",
            Self::ModuleList => "list<module>",
            Self::ComponentList => "list<component>",
        })
    }
}

/// How slot values reach the handler. Slots are bound by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParametersForm {
    Struct,
}

/// Static description of a command as the shell sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandManifest {
    /// Unique identifier (e.g. `listTypes`).
    pub name: String,
    pub title: String,
    /// Accepted syntax forms, tried in order.
    pub syntax: Vec<String>,
    pub returns: ReturnType,
    pub parameters_form: ParametersForm,
    /// Asynchronous commands are spawned and report through
    /// [`Dispatch::Pending`].
    pub asynchronous: bool,
}

/// Output produced by a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    Message(String),
    Modules(Vec<ModuleSummary>),
    Components(Vec<ComponentSummary>),
    /// Command produced no visible output.
    None,
}

impl CommandOutput {
    /// Text form for the terminal: messages verbatim, component lists as a
    /// table, module trees as pretty JSON.
    pub fn render(&self) -> Result<String> {
        Ok(match self {
            Self::Message(text) => text.clone(),
            Self::Modules(_) => serde_json::to_string_pretty(self)?,
            Self::Components(components) => {
                let rows: Vec<[&str; 3]> = components
                    .iter()
                    .map(|c| [c.name.as_str(), c.title.as_str(), c.description.as_str()])
                    .collect();
                format_table(["NAME", "TITLE", "DESCRIPTION"], &rows)
            },
            Self::None => String::new(),
        })
    }
}

fn format_table(headers: [&str; 3], rows: &[[&str; 3]]) -> String {
    // Padding counts chars, so widths must too.
    let mut widths = headers.map(|h| h.chars().count());
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let line = |cells: &[&str; 3]| {
        format!(
            "{:<w0$}  {:<w1$}  {}",
            cells[0],
            cells[1],
            cells[2],
            w0 = widths[0],
            w1 = widths[1],
        )
        .trim_end()
        .to_string()
    };
    let mut out = line(&headers);
    for row in rows {
        out.push('\n');
        out.push_str(&line(row));
    }
    out
}

/// Services handed to every command.
#[derive(Clone)]
pub struct Context {
    pub registry: Arc<dyn Registry>,
    pub session: Arc<dyn Session>,
}

/// Values bound to a command's syntax slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    named: HashMap<String, String>,
}

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Like [`Self::get`] but a missing value is a command error.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| AtlasError::Command(format!("missing argument: {name}")))
    }
}

/// A single executable command.
#[async_trait]
pub trait Command: Send + Sync {
    fn manifest(&self) -> &CommandManifest;

    /// Run the command with the values bound from the matched syntax form.
    async fn execute(&self, args: Arguments, ctx: Context) -> Result<CommandOutput>;
}

/// Result of dispatching a line.
pub enum Dispatch {
    /// A synchronous command finished.
    Ready(CommandOutput),
    /// An asynchronous command is running; the handle settles later.
    Pending(JoinHandle<Result<CommandOutput>>),
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(output) => f.debug_tuple("Ready").field(output).finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}

// ---------------------------------------------------------------------------
// Syntax forms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum SyntaxPart {
    Literal(String),
    /// The declared slot type is not checked here.
    Slot { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Syntax {
    parts: Vec<SyntaxPart>,
}

impl Syntax {
    fn parse(form: &str) -> Result<Self> {
        let mut parts = Vec::new();
        let mut rest = form.trim();
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('(') {
                let close = after
                    .find(')')
                    .ok_or_else(|| AtlasError::Command(format!("unclosed slot in syntax {form:?}")))?;
                let words: Vec<&str> = after[..close].split_whitespace().collect();
                let [name, _ty] = words.as_slice() else {
                    return Err(AtlasError::Command(format!(
                        "slot must be '(name type)' in syntax {form:?}"
                    )));
                };
                parts.push(SyntaxPart::Slot {
                    name: name.to_string(),
                });
                rest = after[close + 1..].trim_start();
            } else {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '(')
                    .unwrap_or(rest.len());
                parts.push(SyntaxPart::Literal(rest[..end].to_string()));
                rest = rest[end..].trim_start();
            }
        }
        if parts.is_empty() {
            return Err(AtlasError::Command("empty syntax form".into()));
        }
        Ok(Self { parts })
    }

    fn matches(&self, tokens: &[String]) -> Option<Arguments> {
        if tokens.len() != self.parts.len() {
            return None;
        }
        let mut named = HashMap::new();
        for (part, token) in self.parts.iter().zip(tokens) {
            match part {
                SyntaxPart::Literal(word) => {
                    if !word.eq_ignore_ascii_case(token) {
                        return None;
                    }
                },
                SyntaxPart::Slot { name } => {
                    named.insert(name.clone(), token.clone());
                },
            }
        }
        Some(Arguments { named })
    }
}

// ---------------------------------------------------------------------------
// CommandRegistry
// ---------------------------------------------------------------------------

/// Maximum number of history entries to retain.
const MAX_HISTORY: usize = 100;

struct Entry {
    command: Arc<dyn Command>,
    syntax: Vec<Syntax>,
}

/// Registry of available commands with dispatch.
pub struct CommandRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    history: Mutex<Vec<String>>,
}

impl CommandRegistry {
    /// Create an empty command registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Register a command. Replaces any existing command with the same name,
    /// keeping its original position.
    pub fn register(&mut self, command: Arc<dyn Command>) -> Result<()> {
        let manifest = command.manifest();
        if manifest.syntax.is_empty() {
            return Err(AtlasError::Command(format!(
                "command {} declares no syntax",
                manifest.name
            )));
        }
        let syntax = manifest
            .syntax
            .iter()
            .map(|form| Syntax::parse(form))
            .collect::<Result<Vec<_>>>()?;
        let name = manifest.name.clone();
        let entry = Entry { command, syntax };
        match self.index.get(&name) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(name, self.entries.len());
                self.entries.push(entry);
            },
        }
        Ok(())
    }

    /// Manifests in registration order.
    pub fn manifests(&self) -> Vec<&CommandManifest> {
        self.entries.iter().map(|e| e.command.manifest()).collect()
    }

    /// Look up a command by manifest name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.index
            .get(name)
            .map(|&i| Arc::clone(&self.entries[i].command))
    }

    /// One line per syntax form (name, form, title), for `help`.
    pub fn help(&self) -> String {
        let mut lines = Vec::new();
        for manifest in self.manifests() {
            for form in &manifest.syntax {
                lines.push(format!("{:<16} {form:<36} {}", manifest.name, manifest.title));
            }
        }
        lines.join("\n")
    }

    /// Dispatched lines, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    fn push_history(&self, line: &str) {
        let mut hist = self.history.lock();
        // Don't duplicate the last entry.
        if hist.last().is_none_or(|last| last != line) {
            hist.push(line.to_string());
            if hist.len() > MAX_HISTORY {
                hist.remove(0);
            }
        }
    }

    /// Find the command and bound arguments for a line.
    pub fn resolve(&self, line: &str) -> Result<(Arc<dyn Command>, Arguments)> {
        let tokens = tokenize(line)?;
        for entry in &self.entries {
            if let Some(args) = entry.syntax.iter().find_map(|s| s.matches(&tokens)) {
                return Ok((Arc::clone(&entry.command), args));
            }
        }
        Err(AtlasError::Command(format!("no command matches '{line}'")))
    }

    /// Parse and run a line.
    ///
    /// Synchronous commands are awaited here. Asynchronous commands are
    /// spawned on the current tokio runtime and returned as
    /// [`Dispatch::Pending`] straight away.
    pub async fn execute(&self, line: &str, ctx: &Context) -> Result<Dispatch> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Dispatch::Ready(CommandOutput::None));
        }
        self.push_history(line);

        let (command, args) = self.resolve(line)?;
        log::debug!("Dispatching {} for '{line}'", command.manifest().name);
        if command.manifest().asynchronous {
            let ctx = ctx.clone();
            let handle = tokio::spawn(async move { command.execute(args, ctx).await });
            Ok(Dispatch::Pending(handle))
        } else {
            Ok(Dispatch::Ready(command.execute(args, ctx.clone()).await?))
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tokenizer: handles single quotes, double quotes, and backslash escapes.
// ---------------------------------------------------------------------------

/// Tokenize a command line respecting quotes and backslash escapes.
///
/// - Single-quoted strings preserve all characters literally.
/// - Double-quoted strings allow `\"` and `\\` escapes.
/// - Backslash escapes the next character outside of quotes.
pub fn tokenize(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;
    // Distinguishes `""` (an empty token) from no token at all.
    let mut quoted = false;

    while let Some(ch) = chars.next() {
        if in_single {
            if ch == '\'' {
                in_single = false;
            } else {
                current.push(ch);
            }
        } else if in_double {
            if ch == '"' {
                in_double = false;
            } else if ch == '\\'
                && let Some(&next) = chars.peek()
                && matches!(next, '"' | '\\')
            {
                current.push(next);
                chars.next();
            } else {
                current.push(ch);
            }
        } else {
            match ch {
                '\'' => {
                    in_single = true;
                    quoted = true;
                },
                '"' => {
                    in_double = true;
                    quoted = true;
                },
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                },
                c if c.is_whitespace() => {
                    if !current.is_empty() || quoted {
                        tokens.push(std::mem::take(&mut current));
                        quoted = false;
                    }
                },
                _ => current.push(ch),
            }
        }
    }

    if in_single {
        return Err(AtlasError::Command("unterminated single quote".to_string()));
    }
    if in_double {
        return Err(AtlasError::Command("unterminated double quote".to_string()));
    }

    if !current.is_empty() || quoted {
        tokens.push(current);
    }

    Ok(tokens)
}
