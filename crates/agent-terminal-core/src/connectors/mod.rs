//! Backend connectors.
//!
//! Every AI backend is reached through the same capability: hand it a prompt,
//! get back a [`Reply`]. Connectors never fail to the caller. Missing
//! credentials at call time, unreachable services, unknown models, upstream
//! API errors and synthesis failures all come back as a reply flagged as an
//! error so the session can style it and carry on.
//!
//! - [`OpenAiConnector`] - remote chat-completions API
//! - [`OllamaConnector`] - local Ollama daemon
//! - [`VoiceCloneConnector`] - OpenAI text, then speech synthesis and playback

pub mod http;
mod ollama;
mod openai;
mod voice;

pub use ollama::{OllamaConnector, DEFAULT_HOST as DEFAULT_OLLAMA_HOST};
pub use openai::{OpenAiConnector, DEFAULT_BASE_URL as DEFAULT_OPENAI_BASE_URL};
pub use voice::VoiceCloneConnector;

use async_trait::async_trait;
use std::fmt;

/// Output of a single `respond` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Set when `text` describes a failure rather than a model answer.
    pub is_error: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// The uniform prompt-to-reply capability of an AI backend.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Sender name shown next to this connector's replies.
    fn name(&self) -> &str;

    /// Answer `prompt`. Failures are folded into the reply.
    async fn respond(&self, prompt: &str) -> Reply;
}

/// Symbolic backend identifier used by the factory and the UI presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    OpenAi,
    Ollama,
    Voice,
}

impl BackendKind {
    /// Display label, also used as the connector's sender name.
    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "OpenAIAgent",
            BackendKind::Ollama => "OllamaAgent",
            BackendKind::Voice => "VoiceCloningAgent",
        }
    }

    /// Whether this backend needs a reference audio clip.
    pub fn needs_audio(&self) -> bool {
        matches!(self, BackendKind::Voice)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Run blocking connector work off the async executor.
///
/// A panic inside `work` becomes an error reply instead of tearing down the
/// caller.
pub(crate) async fn run_blocking<F>(work: F) -> Reply
where
    F: FnOnce() -> Reply + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(reply) => reply,
        Err(e) => {
            log::error!("connector task failed: {e}");
            Reply::error(format!("An unexpected error occurred: {e}"))
        }
    }
}
