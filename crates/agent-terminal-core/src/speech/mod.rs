//! Speech synthesis and playback for the voice-cloning connector.
//!
//! Loading a synthesis engine is expensive (model weights, a helper server),
//! so it is split from synthesis: a [`SpeechLoader`] produces a
//! [`SpeechEngine`] once, and the engine is reused for every reply.

mod playback;
mod server;

pub use playback::{spawn_playback, AudioPlayer, CommandPlayer, PlaybackError};
pub use server::{ServerSpeechConfig, ServerSpeechEngine, ServerSpeechLoader};

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempPath;
use thiserror::Error;

use crate::shell::find_on_path;

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Failed to load speech model: {0}")]
    Load(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Failed to write audio: {0}")]
    Io(#[from] std::io::Error),
}

/// Compute device the synthesis model runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda,
    Mps,
    Cpu,
}

impl Device {
    /// Prefer an accelerator when one is present, else the CPU.
    pub fn detect() -> Self {
        if find_on_path("nvidia-smi").is_some() {
            Device::Cuda
        } else if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
            Device::Mps
        } else {
            Device::Cpu
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Mps => "mps",
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded audio produced by an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    /// A complete WAV file.
    pub wav: Vec<u8>,
}

impl SynthesizedAudio {
    /// Write the audio to a fresh temporary `.wav` file.
    ///
    /// The file is deleted when the returned path is dropped or closed.
    pub fn persist_temp(&self) -> Result<TempPath, SpeechError> {
        let mut file = tempfile::Builder::new()
            .prefix("agent-terminal-")
            .suffix(".wav")
            .tempfile()?;
        file.write_all(&self.wav)?;
        file.flush()?;
        Ok(file.into_temp_path())
    }
}

/// A loaded synthesis model. Calls block.
pub trait SpeechEngine: Send + Sync {
    /// Speak `text` in the voice of the `reference` clip.
    fn synthesize(&self, text: &str, reference: &Path) -> Result<SynthesizedAudio, SpeechError>;
}

/// The heavyweight step that makes an engine available. Blocks.
pub trait SpeechLoader: Send + Sync {
    fn load(&self, device: Device) -> Result<Arc<dyn SpeechEngine>, SpeechError>;
}
