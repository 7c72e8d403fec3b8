//! Speech engine backed by a local synthesis server.
//!
//! The model runs in a separate helper process that speaks a tiny HTTP
//! protocol on a loopback port:
//!
//! - `GET /health` answers 200 with `{"token": ...}` once the model weights
//!   are loaded. The token echoes the one the server was started with.
//! - `POST /synthesize` with `{"text": ..., "audio_prompt_path": ...}`
//!   answers with the WAV bytes.
//!
//! The server is started as
//! `<command> --port <port> --device <device> --token <token>`.
//!
//! One server is shared by every voice session built from the same loader.
//! It stops when the last engine handle is dropped.

use std::io::Read;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{Device, SpeechEngine, SpeechError, SpeechLoader, SynthesizedAudio};
use crate::connectors::http::error_message_from_body;
use crate::logging::{log_line, open_log_file};
use crate::spawn::{HelperProcess, ProcessEvent, SpawnConfig};

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(250);
const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_AUDIO_BYTES: u64 = 256 * 1024 * 1024;
const PORT_SEARCH_SPAN: u16 = 100;

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How to start the synthesis server.
#[derive(Debug, Clone)]
pub struct ServerSpeechConfig {
    /// Server executable, resolved through the login shell.
    pub command: String,
    /// First port to try; the next free one is used.
    pub port: u16,
    pub shell_prefix: Option<String>,
    /// Directory for the server's own log file.
    pub log_dir: Option<PathBuf>,
    /// How long to wait for `/health` before giving up.
    pub startup_timeout: Duration,
}

impl Default for ServerSpeechConfig {
    fn default() -> Self {
        Self {
            command: "chatterbox-server".to_string(),
            port: 8765,
            shell_prefix: None,
            log_dir: None,
            startup_timeout: Duration::from_secs(30),
        }
    }
}

/// Starts the synthesis server on first use and hands the same running
/// server to every later caller.
pub struct ServerSpeechLoader {
    config: ServerSpeechConfig,
    /// Held weakly: the voice connectors own the server, not the loader.
    shared: Mutex<Weak<ServerSpeechEngine>>,
}

impl ServerSpeechLoader {
    pub fn new(config: ServerSpeechConfig) -> Self {
        Self {
            config,
            shared: Mutex::new(Weak::new()),
        }
    }

    /// Return the live shared engine, or build one with `start`.
    ///
    /// The lock is held while starting, so concurrent callers wait for the
    /// first start instead of racing it for a port.
    fn shared_or_start<F>(&self, start: F) -> Result<Arc<ServerSpeechEngine>, SpeechError>
    where
        F: FnOnce() -> Result<ServerSpeechEngine, SpeechError>,
    {
        let mut shared = self
            .shared
            .lock()
            .map_err(|_| SpeechError::Load("speech loader lock poisoned".to_string()))?;

        if let Some(engine) = shared.upgrade() {
            if engine.is_running() {
                log::debug!("reusing speech server at {}", engine.base_url);
                return Ok(engine);
            }
            log::warn!("speech server at {} is gone, starting a new one", engine.base_url);
        }

        let engine = Arc::new(start()?);
        *shared = Arc::downgrade(&engine);
        Ok(engine)
    }

    fn start(&self, device: Device) -> Result<ServerSpeechEngine, SpeechError> {
        let port = find_available_port(self.config.port).map_err(SpeechError::Load)?;
        let token = new_token();

        let mut spawn = SpawnConfig::new(
            self.config.command.clone(),
            vec![
                "--port".to_string(),
                port.to_string(),
                "--device".to_string(),
                device.as_str().to_string(),
                "--token".to_string(),
                token.clone(),
            ],
        );
        if let Some(prefix) = &self.config.shell_prefix {
            spawn = spawn.shell_prefix(prefix.clone());
        }

        log::info!(
            "starting speech server {} on port {} ({})",
            self.config.command,
            port,
            device
        );
        let process = HelperProcess::spawn(spawn).map_err(SpeechError::Load)?;

        if let Some(events) = process.take_events() {
            let log_file = open_log_file(self.config.log_dir.as_deref(), "speech-server");
            thread::spawn(move || {
                while let Ok(event) = events.recv() {
                    match event {
                        ProcessEvent::Stdout(line) => {
                            log::debug!("speech server stdout: {}", line);
                            log_line(&log_file, "STDOUT", &line);
                        }
                        ProcessEvent::Stderr(line) => {
                            log::debug!("speech server stderr: {}", line);
                            log_line(&log_file, "STDERR", &line);
                        }
                        ProcessEvent::Exit(exit) => {
                            log::info!("speech server exited: {:?}", exit);
                            log_line(&log_file, "EXIT", &format!("{:?}", exit));
                            break;
                        }
                    }
                }
            });
        }

        let base_url = format!("http://127.0.0.1:{port}");
        self.wait_until_ready(&process, &base_url, &token)?;

        log::info!("speech server ready at {}", base_url);
        Ok(ServerSpeechEngine {
            base_url,
            process: Some(process),
        })
    }

    /// Poll `/health` until our own server answers with `token`.
    ///
    /// Kills `process` when the startup timeout runs out.
    fn wait_until_ready(
        &self,
        process: &HelperProcess,
        base_url: &str,
        token: &str,
    ) -> Result<(), SpeechError> {
        let deadline = Instant::now() + self.config.startup_timeout;
        let mut warned = false;
        loop {
            if !process.is_running() {
                return Err(SpeechError::Load(format!(
                    "{} exited before becoming ready",
                    self.config.command
                )));
            }
            match health_token(base_url) {
                Some(answered) if answered == token => return Ok(()),
                Some(_) if !warned => {
                    log::warn!("{} is answered by another speech server", base_url);
                    warned = true;
                }
                _ => {}
            }
            if Instant::now() >= deadline {
                process.kill();
                return Err(SpeechError::Load(format!(
                    "{} did not become ready within {}s",
                    self.config.command,
                    self.config.startup_timeout.as_secs()
                )));
            }
            thread::sleep(HEALTH_POLL_INTERVAL);
        }
    }
}

impl SpeechLoader for ServerSpeechLoader {
    fn load(&self, device: Device) -> Result<Arc<dyn SpeechEngine>, SpeechError> {
        let engine: Arc<dyn SpeechEngine> = self.shared_or_start(|| self.start(device))?;
        Ok(engine)
    }
}

/// A healthy synthesis server. Stops the server when dropped.
pub struct ServerSpeechEngine {
    base_url: String,
    process: Option<HelperProcess>,
}

impl ServerSpeechEngine {
    /// Use an already running server without owning its process.
    pub fn connect(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            process: None,
        }
    }

    /// False once an owned server process has exited.
    pub fn is_running(&self) -> bool {
        self.process.as_ref().map_or(true, HelperProcess::is_running)
    }
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    audio_prompt_path: &'a str,
}

impl SpeechEngine for ServerSpeechEngine {
    fn synthesize(&self, text: &str, reference: &Path) -> Result<SynthesizedAudio, SpeechError> {
        let reference = reference.to_string_lossy();
        let request = SynthesizeRequest {
            text,
            audio_prompt_path: &reference,
        };

        let url = format!("{}/synthesize", self.base_url);
        let response = match ureq::post(&url).timeout(SYNTHESIS_TIMEOUT).send_json(&request) {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let raw = response.into_string().unwrap_or_default();
                return Err(SpeechError::Synthesis(format!(
                    "HTTP {code}: {}",
                    error_message_from_body(&raw)
                )));
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(SpeechError::Synthesis(transport.to_string()));
            }
        };

        let mut wav = Vec::new();
        response
            .into_reader()
            .take(MAX_AUDIO_BYTES)
            .read_to_end(&mut wav)?;

        if wav.is_empty() {
            return Err(SpeechError::Synthesis("server returned no audio".to_string()));
        }
        Ok(SynthesizedAudio { wav })
    }
}

impl Drop for ServerSpeechEngine {
    fn drop(&mut self) {
        if let Some(process) = self.process.take() {
            log::info!("stopping speech server at {}", self.base_url);
            process.stop();
        }
    }
}

#[derive(Deserialize)]
struct HealthResponse {
    token: Option<String>,
}

/// Token reported by whatever answers `/health`, or `None` when nothing
/// healthy answers. A server without a token reports an empty one.
fn health_token(base_url: &str) -> Option<String> {
    let response = ureq::get(&format!("{base_url}/health"))
        .timeout(HEALTH_REQUEST_TIMEOUT)
        .call()
        .ok()?;
    let health = response.into_json::<HealthResponse>().ok();
    Some(health.and_then(|h| h.token).unwrap_or_default())
}

/// Unique per started server within this process.
fn new_token() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let count = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}-{:x}", std::process::id(), nanos, count)
}

/// First free loopback port at or after `start_port`.
fn find_available_port(start_port: u16) -> Result<u16, String> {
    let end = start_port.saturating_add(PORT_SEARCH_SPAN);
    for port in start_port..end {
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return Ok(port);
        }
    }
    Err(format!("Could not find an available port in {start_port}..{end}"))
}
