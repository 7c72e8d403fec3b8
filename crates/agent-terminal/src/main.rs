mod app;
mod config;
mod events;

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use agent_terminal_core::paths::{config_dir, state_dir};
use agent_terminal_core::{ConnectorFactory, SessionManager};
use clap::Parser;

/// Chat with several AI backends side by side in one terminal.
#[derive(Parser)]
#[command(name = "agent-terminal", version)]
struct Cli {
    /// TOML config file [default: ~/.config/agent-terminal/config.toml]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write logs [default: ~/.local/state/agent-terminal/agent-terminal.log]
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn default_path(dir: Result<PathBuf, String>, file: &str) -> io::Result<PathBuf> {
    dir.map(|d| d.join(file))
        .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e))
}

/// Route `log` output to a file; the terminal belongs to the UI.
fn init_logging(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init();
    Ok(())
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    let log_file = match cli.log_file {
        Some(path) => path,
        None => default_path(state_dir(), "agent-terminal.log")?,
    };
    if let Err(e) = init_logging(&log_file) {
        eprintln!("Failed to open log file {}: {e}", log_file.display());
        return Err(e);
    }

    let config_path = match cli.config {
        Some(path) => path,
        None => default_path(config_dir(), "config.toml")?,
    };
    log::info!("starting agent-terminal (config={})", config_path.display());

    let settings = match config::load_settings(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string()));
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let manager = SessionManager::new(ConnectorFactory::new(settings.connectors));
    let result = app::run(manager, settings.mascot, runtime.handle().clone());

    log::info!("agent-terminal exiting");
    runtime.shutdown_background();
    result
}
