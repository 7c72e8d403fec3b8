//! Per-session state.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connectors::{Connector, Reply};

/// Unique identifier for a session. Minted by the manager, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a transcript line should be styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emphasis {
    /// The user's own input.
    Plain,
    /// Lifecycle notices such as "agent started".
    Notice,
    /// Transient status, e.g. the thinking marker.
    Dim,
    /// A model answer.
    Agent,
    Error,
}

impl Emphasis {
    pub fn for_reply(reply: &Reply) -> Self {
        if reply.is_error {
            Emphasis::Error
        } else {
            Emphasis::Agent
        }
    }
}

pub const USER_SENDER: &str = "User";
pub const SYSTEM_SENDER: &str = "System";

/// One line of a session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub sender: String,
    pub text: String,
    pub emphasis: Emphasis,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(sender: impl Into<String>, text: impl Into<String>, emphasis: Emphasis) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            emphasis,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// A request to the connector is outstanding.
    Busy,
    /// The connector could not be built; the session never accepts input.
    Errored(String),
}

/// One conversation tab: a connector plus its transcript.
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub(crate) connector: Option<Arc<dyn Connector>>,
    pub(crate) transcript: Vec<TranscriptEntry>,
    pub(crate) state: SessionState,
}

impl Session {
    pub(crate) fn ready(id: SessionId, title: String, connector: Arc<dyn Connector>) -> Self {
        Self {
            id,
            title,
            connector: Some(connector),
            transcript: Vec::new(),
            state: SessionState::Idle,
        }
    }

    pub(crate) fn errored(id: SessionId, title: String, reason: String) -> Self {
        Self {
            id,
            title,
            connector: None,
            transcript: Vec::new(),
            state: SessionState::Errored(reason),
        }
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    pub fn is_busy(&self) -> bool {
        self.state == SessionState::Busy
    }

    /// Sender name of the connector's replies, if there is a connector.
    pub fn agent_name(&self) -> Option<&str> {
        self.connector.as_deref().map(|c| c.name())
    }

    pub(crate) fn push(
        &mut self,
        sender: impl Into<String>,
        text: impl Into<String>,
        emphasis: Emphasis,
    ) {
        self.transcript.push(TranscriptEntry::new(sender, text, emphasis));
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("agent", &self.agent_name())
            .field("state", &self.state)
            .field("transcript_len", &self.transcript.len())
            .finish()
    }
}
