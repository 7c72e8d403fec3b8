//! Configuration loading.
//!
//! Settings come from a single TOML file (default
//! `~/.config/agent-terminal/config.toml`). A missing file, missing section
//! or missing key falls back to the built-in default:
//!
//! ```toml
//! [openai]
//! base_url = "https://api.openai.com/v1"
//! api_key_env = "OPENAI_API_KEY"
//!
//! [ollama]
//! host = "http://127.0.0.1:11434"
//!
//! [speech]
//! server_command = "chatterbox-server"
//! port = 8765
//! player = "afplay"
//! log_dir = "~/.local/state/agent-terminal/logs"
//!
//! [ui]
//! mascot = "~/.config/agent-terminal/mascot.txt"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_terminal_core::paths::{expand_tilde, state_dir};
use agent_terminal_core::speech::CommandPlayer;
use agent_terminal_core::ConnectorSettings;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Everything read from the config file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub connectors: ConnectorSettings,
    /// Text file with the mascot art; built-in art when unset.
    pub mascot: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    openai: Option<RawOpenAi>,
    ollama: Option<RawOllama>,
    speech: Option<RawSpeech>,
    ui: Option<RawUi>,
}

#[derive(Debug, Default, Deserialize)]
struct RawOpenAi {
    base_url: Option<String>,
    api_key_env: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawOllama {
    host: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSpeech {
    server_command: Option<String>,
    port: Option<u16>,
    /// Shell prefix used to launch the server, e.g. `/bin/zsh -l -c`.
    shell: Option<String>,
    startup_timeout_secs: Option<u64>,
    player: Option<String>,
    player_args: Option<Vec<String>>,
    log_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUi {
    mascot: Option<String>,
}

/// Load settings from `path`. A file that does not exist yields defaults.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("no config at {}, using defaults", path.display());
            String::new()
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let raw = if contents.trim().is_empty() {
        RawConfig::default()
    } else {
        toml::from_str::<RawConfig>(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    };
    Ok(merge_settings(raw))
}

fn merge_settings(raw: RawConfig) -> Settings {
    let mascot = raw
        .ui
        .and_then(|ui| ui.mascot)
        .filter(|m| !m.trim().is_empty())
        .map(|m| expand_tilde(&m));

    Settings {
        connectors: merge_connectors(raw.openai, raw.ollama, raw.speech),
        mascot,
    }
}

fn merge_connectors(
    openai: Option<RawOpenAi>,
    ollama: Option<RawOllama>,
    speech: Option<RawSpeech>,
) -> ConnectorSettings {
    let mut settings = ConnectorSettings::default();

    if let Some(openai) = openai {
        if let Some(base_url) = openai.base_url {
            settings.openai_base_url = base_url;
        }
        if let Some(env) = openai.api_key_env.filter(|e| !e.trim().is_empty()) {
            settings.api_key_env = env;
        }
    }

    if let Some(host) = ollama.and_then(|o| o.host) {
        settings.ollama_host = host;
    }

    let speech = speech.unwrap_or_default();
    if let Some(command) = speech.server_command {
        settings.speech.command = command;
    }
    if let Some(port) = speech.port {
        settings.speech.port = port;
    }
    settings.speech.shell_prefix = speech.shell;
    if let Some(secs) = speech.startup_timeout_secs {
        settings.speech.startup_timeout = Duration::from_secs(secs);
    }
    settings.speech.log_dir = speech
        .log_dir
        .map(|dir| expand_tilde(&dir))
        .or_else(|| state_dir().ok().map(|dir| dir.join("logs")));
    if let Some(player) = speech.player {
        settings.player = CommandPlayer::new(player, speech.player_args.unwrap_or_default());
    }

    settings
}
