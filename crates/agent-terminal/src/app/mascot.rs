//! Project mascot, drawn beside the tabs.
//!
//! The art is produced once per process, on first draw, and every later
//! frame reuses it. A missing or unreadable art file is not fatal: the
//! panel shows a short bracketed notice instead, cached the same way.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

const BUILT_IN: &str = include_str!("../../assets/mascot.txt");

static MASCOT: OnceLock<String> = OnceLock::new();

/// Panel width, art plus border.
pub const PANEL_WIDTH: u16 = 32;

/// Narrowest terminal that still gets the panel.
pub const MIN_TERMINAL_WIDTH: u16 = 80;

/// The mascot art. `path` is only consulted on the first call.
pub fn art(path: Option<&Path>) -> &'static str {
    cached(&MASCOT, || load(path))
}

fn cached(cell: &OnceLock<String>, load: impl FnOnce() -> String) -> &str {
    cell.get_or_init(load).as_str()
}

fn load(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return BUILT_IN.trim_end().to_string();
    };

    match fs::read_to_string(path) {
        Ok(art) if !art.trim().is_empty() => {
            log::info!("mascot art loaded from {}", path.display());
            art.trim_end().to_string()
        }
        Ok(_) => {
            log::warn!("mascot file {} is empty, using built-in art", path.display());
            BUILT_IN.trim_end().to_string()
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::error!("mascot art not found at {}", path.display());
            "[Mascot art not found]".to_string()
        }
        Err(e) => {
            log::error!("failed to read mascot art {}: {e}", path.display());
            format!("[Mascot error: {e}]")
        }
    }
}
