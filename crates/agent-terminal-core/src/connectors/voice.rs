//! Voice-cloning connector: OpenAI text, spoken in a cloned voice.
//!
//! The speech engine is loaded lazily on the first `respond` and reused
//! afterwards. Concurrent first calls share a single load. Synthesized audio
//! is played on a detached task so the reply is not held up by playback.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::{BackendKind, Connector, Reply};
use crate::factory::ConfigError;
use crate::speech::{spawn_playback, AudioPlayer, Device, SpeechEngine, SpeechError, SpeechLoader};

pub struct VoiceCloneConnector {
    text: Arc<dyn Connector>,
    reference_audio: PathBuf,
    loader: Arc<dyn SpeechLoader>,
    engine: OnceCell<Arc<dyn SpeechEngine>>,
    player: Arc<dyn AudioPlayer>,
}

impl VoiceCloneConnector {
    /// Build a connector speaking `text`'s replies in the voice of
    /// `reference_audio`.
    ///
    /// Fails when the reference clip does not exist. Nothing is loaded yet.
    pub fn new(
        text: impl Connector + 'static,
        reference_audio: impl Into<PathBuf>,
        loader: Arc<dyn SpeechLoader>,
        player: Arc<dyn AudioPlayer>,
    ) -> Result<Self, ConfigError> {
        let reference_audio = reference_audio.into();
        if !reference_audio.is_file() {
            return Err(ConfigError::AudioFileNotFound(reference_audio));
        }

        Ok(Self {
            text: Arc::new(text),
            reference_audio,
            loader,
            engine: OnceCell::new(),
            player,
        })
    }

    pub fn reference_audio(&self) -> &Path {
        &self.reference_audio
    }

    /// Whether the speech engine has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }

    async fn engine(&self) -> Result<Arc<dyn SpeechEngine>, SpeechError> {
        self.engine
            .get_or_try_init(|| {
                let loader = Arc::clone(&self.loader);
                async move {
                    let device = Device::detect();
                    log::info!("loading speech engine on {}", device);
                    tokio::task::spawn_blocking(move || loader.load(device))
                        .await
                        .map_err(|e| SpeechError::Load(e.to_string()))?
                }
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl Connector for VoiceCloneConnector {
    fn name(&self) -> &str {
        BackendKind::Voice.label()
    }

    async fn respond(&self, prompt: &str) -> Reply {
        let engine = match self.engine().await {
            Ok(engine) => engine,
            Err(e) => {
                log::error!("speech engine unavailable: {e}");
                return Reply::error(e.to_string());
            }
        };

        let answer = self.text.respond(prompt).await;
        if answer.is_error {
            return answer;
        }

        let reference = self.reference_audio.clone();
        let synthesized = tokio::task::spawn_blocking(move || {
            engine.synthesize(&answer.text, &reference)?.persist_temp()
        })
        .await;

        let audio = match synthesized {
            Ok(Ok(audio)) => audio,
            Ok(Err(e)) => {
                log::warn!("synthesis failed: {e}");
                return Reply::error(e.to_string());
            }
            Err(e) => return Reply::error(format!("An unexpected error occurred: {e}")),
        };

        spawn_playback(Arc::clone(&self.player), audio);
        Reply::text(format!("Playing audio response for: '{prompt}'"))
    }
}
