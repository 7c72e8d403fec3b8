use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "agent-terminal";

/// Return the user's home directory path.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn get_home_dir() -> Result<PathBuf, String> {
    for var in ["HOME", "USERPROFILE"] {
        if let Ok(value) = env::var(var) {
            if !value.is_empty() {
                return Ok(PathBuf::from(value));
            }
        }
    }
    Err("Home directory not set".to_string())
}

/// `$XDG_CONFIG_HOME/agent-terminal`, falling back to `~/.config/agent-terminal`.
pub fn config_dir() -> Result<PathBuf, String> {
    if let Some(xdg) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(xdg).join(APP_DIR));
    }
    Ok(get_home_dir()?.join(".config").join(APP_DIR))
}

/// `$XDG_STATE_HOME/agent-terminal`, falling back to `~/.local/state/agent-terminal`.
pub fn state_dir() -> Result<PathBuf, String> {
    if let Some(xdg) = env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(xdg).join(APP_DIR));
    }
    Ok(get_home_dir()?.join(".local").join("state").join(APP_DIR))
}

/// Expand a leading `~/` against the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match get_home_dir() {
            Ok(home) => home.join(rest),
            Err(_) => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
