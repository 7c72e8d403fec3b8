//! Detached audio playback.

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

use tempfile::TempPath;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Failed to start player {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Player {program} exited with status {code:?}")]
    Failed { program: String, code: Option<i32> },
}

/// Plays an audio file to completion. Blocks.
pub trait AudioPlayer: Send + Sync {
    fn play(&self, path: &Path) -> Result<(), PlaybackError>;
}

/// Plays audio by running an external player program on the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlayer {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `afplay` on macOS, quiet `aplay` elsewhere.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("afplay", Vec::new())
        } else {
            Self::new("aplay", vec!["-q".to_string()])
        }
    }
}

impl Default for CommandPlayer {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl AudioPlayer for CommandPlayer {
    fn play(&self, path: &Path) -> Result<(), PlaybackError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| PlaybackError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(PlaybackError::Failed {
                program: self.program.clone(),
                code: status.code(),
            })
        }
    }
}

/// Play `audio` on a detached task, then delete it.
///
/// The caller is not expected to await the handle. Failures are logged.
/// The file is removed whether playback succeeds, fails or panics.
pub fn spawn_playback(player: Arc<dyn AudioPlayer>, audio: TempPath) -> JoinHandle<()> {
    tokio::spawn(async move {
        let path = audio.to_path_buf();
        let result = tokio::task::spawn_blocking(move || player.play(&path)).await;

        match result {
            Ok(Ok(())) => log::debug!("playback finished: {}", audio.display()),
            Ok(Err(e)) => log::warn!("playback failed: {e}"),
            Err(e) => log::error!("playback task panicked: {e}"),
        }

        let location = audio.to_path_buf();
        if let Err(e) = audio.close() {
            log::warn!("failed to remove {}: {e}", location.display());
        }
    })
}
