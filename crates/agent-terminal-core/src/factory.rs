//! Connector construction from a symbolic backend spec.
//!
//! The factory validates what it can without touching the network: the
//! credential must be present, a model must be named and a voice backend
//! needs an existing reference clip. Everything else is discovered on the
//! first `respond`.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::connectors::{
    BackendKind, Connector, OllamaConnector, OpenAiConnector, VoiceCloneConnector,
    DEFAULT_OLLAMA_HOST, DEFAULT_OPENAI_BASE_URL,
};
use crate::speech::{
    AudioPlayer, CommandPlayer, ServerSpeechConfig, ServerSpeechLoader, SpeechLoader,
};

pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{env} environment variable not set.")]
    MissingCredential { env: String },

    #[error("A reference audio file is required for voice cloning.")]
    MissingAudioPath,

    #[error("Audio file not found at: {}", .0.display())]
    AudioFileNotFound(PathBuf),

    #[error("A model name is required.")]
    MissingModel,
}

/// Which backend to build, and with what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorSpec {
    pub kind: BackendKind,
    pub model: String,
    /// Reference voice clip; only used by [`BackendKind::Voice`].
    pub audio_path: Option<PathBuf>,
}

impl ConnectorSpec {
    pub fn new(kind: BackendKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            audio_path: None,
        }
    }

    pub fn audio_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.audio_path = Some(path.into());
        self
    }

    /// Tab title of a session built from this spec.
    pub fn title(&self) -> String {
        format!("{}: {}", self.kind, self.model)
    }
}

/// Endpoints and helper programs the connectors are built with.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    pub openai_base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub ollama_host: String,
    pub speech: ServerSpeechConfig,
    pub player: CommandPlayer,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            speech: ServerSpeechConfig::default(),
            player: CommandPlayer::default(),
        }
    }
}

type CredentialLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Builds connectors from [`ConnectorSpec`]s.
pub struct ConnectorFactory {
    settings: ConnectorSettings,
    credential: Box<CredentialLookup>,
    loader: Arc<dyn SpeechLoader>,
    player: Arc<dyn AudioPlayer>,
}

impl ConnectorFactory {
    /// Factory reading the credential from the process environment and using
    /// the speech server and player named in `settings`.
    pub fn new(settings: ConnectorSettings) -> Self {
        let loader: Arc<dyn SpeechLoader> =
            Arc::new(ServerSpeechLoader::new(settings.speech.clone()));
        let player: Arc<dyn AudioPlayer> = Arc::new(settings.player.clone());
        Self {
            settings,
            credential: Box::new(|name| std::env::var(name).ok()),
            loader,
            player,
        }
    }

    /// Replace how the credential variable is resolved.
    pub fn credential_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.credential = Box::new(lookup);
        self
    }

    /// Replace the speech loader and audio player handed to voice connectors.
    pub fn speech(
        mut self,
        loader: Arc<dyn SpeechLoader>,
        player: Arc<dyn AudioPlayer>,
    ) -> Self {
        self.loader = loader;
        self.player = player;
        self
    }

    pub fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    pub fn create(&self, spec: &ConnectorSpec) -> Result<Box<dyn Connector>, ConfigError> {
        let model = spec.model.trim();
        if model.is_empty() {
            return Err(ConfigError::MissingModel);
        }

        match spec.kind {
            BackendKind::OpenAi => Ok(Box::new(self.openai(model)?)),
            BackendKind::Ollama => Ok(Box::new(OllamaConnector::with_host(
                model,
                self.settings.ollama_host.clone(),
            ))),
            BackendKind::Voice => {
                let audio = spec
                    .audio_path
                    .as_ref()
                    .filter(|p| !p.as_os_str().is_empty())
                    .ok_or(ConfigError::MissingAudioPath)?;
                if !audio.is_file() {
                    return Err(ConfigError::AudioFileNotFound(audio.clone()));
                }
                let text = self.openai(model)?;
                let connector = VoiceCloneConnector::new(
                    text,
                    audio.clone(),
                    Arc::clone(&self.loader),
                    Arc::clone(&self.player),
                )?;
                Ok(Box::new(connector))
            }
        }
    }

    fn openai(&self, model: &str) -> Result<OpenAiConnector, ConfigError> {
        let env = &self.settings.api_key_env;
        let key = (self.credential)(env)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingCredential { env: env.clone() })?;
        Ok(OpenAiConnector::with_base_url(
            key,
            model,
            self.settings.openai_base_url.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::{Device, PlaybackError, SpeechEngine, SpeechError};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NeverLoader(AtomicUsize);

    impl SpeechLoader for NeverLoader {
        fn load(&self, _device: Device) -> Result<Arc<dyn SpeechEngine>, SpeechError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(SpeechError::Load("not in tests".to_string()))
        }
    }

    struct SilentPlayer;

    impl AudioPlayer for SilentPlayer {
        fn play(&self, _path: &Path) -> Result<(), PlaybackError> {
            Ok(())
        }
    }

    fn factory_with_key(key: Option<&'static str>) -> (ConnectorFactory, Arc<NeverLoader>) {
        let loader = Arc::new(NeverLoader(AtomicUsize::new(0)));
        let factory = ConnectorFactory::new(ConnectorSettings::default())
            .credential_lookup(move |name| {
                assert_eq!(name, DEFAULT_API_KEY_ENV);
                key.map(str::to_string)
            })
            .speech(loader.clone(), Arc::new(SilentPlayer));
        (factory, loader)
    }

    mod spec {
        use super::*;

        #[test]
        fn title_uses_kind_label_and_model() {
            let spec = ConnectorSpec::new(BackendKind::Ollama, "llama3");
            assert_eq!(spec.title(), "OllamaAgent: llama3");
        }

        #[test]
        fn audio_path_builder() {
            let spec = ConnectorSpec::new(BackendKind::Voice, "gpt-4o").audio_path("/v.wav");
            assert_eq!(spec.audio_path, Some(PathBuf::from("/v.wav")));
        }
    }

    mod openai {
        use super::*;

        #[test]
        fn builds_with_credential() {
            let (factory, _) = factory_with_key(Some("sk-test"));
            let connector = factory
                .create(&ConnectorSpec::new(BackendKind::OpenAi, "gpt-4o"))
                .unwrap();
            assert_eq!(connector.name(), "OpenAIAgent");
        }

        #[test]
        fn missing_credential_is_error() {
            let (factory, _) = factory_with_key(None);
            let err = factory
                .create(&ConnectorSpec::new(BackendKind::OpenAi, "gpt-4o"))
                .err()
                .unwrap();
            assert_eq!(err.to_string(), "OPENAI_API_KEY environment variable not set.");
        }

        #[test]
        fn blank_credential_counts_as_missing() {
            let (factory, _) = factory_with_key(Some("   "));
            assert!(matches!(
                factory.create(&ConnectorSpec::new(BackendKind::OpenAi, "gpt-4o")),
                Err(ConfigError::MissingCredential { .. })
            ));
        }

        #[test]
        fn custom_credential_variable_is_reported() {
            let mut settings = ConnectorSettings::default();
            settings.api_key_env = "MY_KEY".to_string();
            let factory = ConnectorFactory::new(settings).credential_lookup(|_| None);

            let err = factory
                .create(&ConnectorSpec::new(BackendKind::OpenAi, "gpt-4o"))
                .err()
                .unwrap();
            assert_eq!(err.to_string(), "MY_KEY environment variable not set.");
        }
    }

    mod ollama {
        use super::*;

        #[test]
        fn needs_no_credential() {
            let (factory, _) = factory_with_key(None);
            let connector = factory
                .create(&ConnectorSpec::new(BackendKind::Ollama, "llama3"))
                .unwrap();
            assert_eq!(connector.name(), "OllamaAgent");
        }

        #[test]
        fn empty_model_is_rejected() {
            let (factory, _) = factory_with_key(None);
            assert!(matches!(
                factory.create(&ConnectorSpec::new(BackendKind::Ollama, "  ")),
                Err(ConfigError::MissingModel)
            ));
        }
    }

    mod voice {
        use super::*;

        #[test]
        fn builds_without_loading_engine() {
            let clip = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
            let (factory, loader) = factory_with_key(Some("sk-test"));

            let connector = factory
                .create(&ConnectorSpec::new(BackendKind::Voice, "gpt-4o").audio_path(clip.path()))
                .unwrap();

            assert_eq!(connector.name(), "VoiceCloningAgent");
            assert_eq!(loader.0.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn missing_audio_path_is_error() {
            let (factory, _) = factory_with_key(Some("sk-test"));
            assert!(matches!(
                factory.create(&ConnectorSpec::new(BackendKind::Voice, "gpt-4o")),
                Err(ConfigError::MissingAudioPath)
            ));
        }

        #[test]
        fn nonexistent_audio_file_is_error() {
            let (factory, _) = factory_with_key(Some("sk-test"));
            let err = factory
                .create(
                    &ConnectorSpec::new(BackendKind::Voice, "gpt-4o")
                        .audio_path("/no/such/voice.wav"),
                )
                .err()
                .unwrap();
            assert_eq!(err.to_string(), "Audio file not found at: /no/such/voice.wav");
        }

        #[test]
        fn directory_is_not_an_audio_file() {
            let dir = tempfile::tempdir().unwrap();
            let (factory, _) = factory_with_key(Some("sk-test"));
            let spec = ConnectorSpec::new(BackendKind::Voice, "gpt-4o").audio_path(dir.path());
            assert!(matches!(
                factory.create(&spec),
                Err(ConfigError::AudioFileNotFound(_))
            ));
        }

        #[test]
        fn voice_needs_credential_too() {
            let clip = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
            let (factory, _) = factory_with_key(None);
            let spec = ConnectorSpec::new(BackendKind::Voice, "gpt-4o").audio_path(clip.path());
            assert!(matches!(
                factory.create(&spec),
                Err(ConfigError::MissingCredential { .. })
            ));
        }
    }
}
