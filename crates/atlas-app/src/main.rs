//! Atlas shell entry point.
//!
//! Reads commands from stdin and dispatches them through the command
//! registry. Loads run in the background; their results are printed when
//! they settle, so further commands can be typed meanwhile.
//! Type `help` to list commands, `history` to see past lines, and `exit` or
//! `quit` to leave.

mod shell;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;

use atlas_net::HttpFetcher;
use atlas_registry::{ModuleRegistry, Registry};
use atlas_terminal::{
    CommandRegistry, NamedModule, Terminal, components_module, register_component_commands,
};
use atlas_types::config::AtlasConfig;

use shell::{Reply, Shell};

/// Resolve the configuration from the CLI arg, `ATLAS_CONFIG`, or defaults.
fn load_config() -> Result<AtlasConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ATLAS_CONFIG").ok());
    let config = match path {
        Some(path) => AtlasConfig::load(Path::new(&path))?,
        None => {
            let config = AtlasConfig::default();
            config.validate()?;
            config
        },
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_filter))
        .init();

    let origin = config.origin()?;
    log::info!("Starting Atlas shell (origin {origin})");

    let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout())?);
    let registry = Arc::new(ModuleRegistry::new(fetcher));
    let session = Arc::new(Terminal::new(origin));

    let named: Vec<NamedModule> = config.named_modules.iter().map(NamedModule::from).collect();
    let mut commands = CommandRegistry::new();
    register_component_commands(&mut commands, &named)?;
    registry.insert(components_module(&commands)?)?;
    log::info!(
        "Registered {} commands, {} named modules",
        commands.manifests().len(),
        named.len()
    );

    let shell = Shell::new(commands, registry as Arc<dyn Registry>, session);

    let mut printers = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match shell.handle(&line).await {
            Reply::Lines(out) => {
                for l in out {
                    println!("{l}");
                }
            },
            Reply::Pending(handle) => {
                printers.spawn(shell::settle(handle));
            },
            Reply::Exit => {
                printers.shutdown().await;
                return Ok(());
            },
        }
    }

    // Input closed: let in-flight loads report before leaving.
    while printers.join_next().await.is_some() {}
    Ok(())
}
