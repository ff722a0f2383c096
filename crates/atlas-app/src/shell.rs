//! Line handling for the interactive shell.

use std::sync::Arc;

use tokio::task::JoinHandle;

use atlas_registry::Registry;
use atlas_terminal::{CommandOutput, CommandRegistry, Context, Dispatch, Session, Terminal};
use atlas_types::error::Result;

/// What the read loop should do with one input line.
#[derive(Debug)]
pub enum Reply {
    /// Print these lines and read the next one.
    Lines(Vec<String>),
    /// A command is still running; print its result when it settles.
    Pending(JoinHandle<Result<CommandOutput>>),
    /// Leave the shell.
    Exit,
}

/// The interactive front end over a command registry.
pub struct Shell {
    commands: CommandRegistry,
    terminal: Arc<Terminal>,
    ctx: Context,
}

impl Shell {
    pub fn new(
        commands: CommandRegistry,
        registry: Arc<dyn Registry>,
        terminal: Arc<Terminal>,
    ) -> Self {
        let ctx = Context {
            registry,
            session: Arc::clone(&terminal) as Arc<dyn Session>,
        };
        Self {
            commands,
            terminal,
            ctx,
        }
    }

    /// Handle one line of input.
    pub async fn handle(&self, line: &str) -> Reply {
        match line.trim() {
            "exit" | "quit" => Reply::Exit,
            "help" => Reply::Lines(self.help()),
            "history" => Reply::Lines(
                self.commands
                    .history()
                    .iter()
                    .enumerate()
                    .map(|(i, line)| format!("{:>4}  {line}", i + 1))
                    .collect(),
            ),
            line => match self.commands.execute(line, &self.ctx).await {
                Ok(Dispatch::Ready(output)) => Reply::Lines(output_lines(Ok(output))),
                Ok(Dispatch::Pending(handle)) => Reply::Pending(handle),
                Err(e) => Reply::Lines(output_lines(Err(e))),
            },
        }
    }

    /// Command forms, then the commands contributed by loaded modules.
    fn help(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .commands
            .help()
            .lines()
            .map(str::to_string)
            .collect();
        let loaded = self.terminal.available_commands();
        if !loaded.is_empty() {
            lines.push(String::new());
            lines.push("Commands from loaded modules:".to_string());
            lines.extend(loaded.iter().map(|name| format!("  {name}")));
        }
        lines
    }
}

/// Turn a command result into printable lines. Failures become a single
/// `error:` line.
pub fn output_lines(result: Result<CommandOutput>) -> Vec<String> {
    match result.and_then(|output| output.render()) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(e) => vec![format!("error: {e}")],
    }
}

/// Wait for a pending command and print its result.
pub async fn settle(handle: JoinHandle<Result<CommandOutput>>) {
    let lines = match handle.await {
        Ok(result) => output_lines(result),
        Err(e) => {
            log::error!("Command task failed: {e}");
            vec![format!("error: command task failed: {e}")]
        },
    };
    for line in lines {
        println!("{line}");
    }
}
