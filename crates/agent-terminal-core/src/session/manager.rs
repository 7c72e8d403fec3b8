//! SessionManager - owns every open conversation and decides which one
//! receives input.

use std::sync::Arc;

use thiserror::Error;

use super::state::{Emphasis, Session, SessionId, SessionState, SYSTEM_SENDER, USER_SENDER};
use crate::connectors::{Connector, Reply};
use crate::factory::{ConfigError, ConnectorFactory, ConnectorSpec};

pub const THINKING_NOTICE: &str = "Agent is thinking...";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),
}

/// The detached half of a submission.
///
/// Holds its own handle to the session's connector, so the manager stays
/// free to handle other events (or remove the session) while it runs.
pub struct PendingTurn {
    session_id: SessionId,
    connector: Arc<dyn Connector>,
    prompt: String,
}

impl PendingTurn {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Ask the connector. Never fails; failures come back as error replies.
    pub async fn run(self) -> (SessionId, Reply) {
        let reply = self.connector.respond(&self.prompt).await;
        (self.session_id, reply)
    }
}

/// Ordered collection of sessions plus the focus pointer.
///
/// Tab order is creation order. Input is enabled only while the focused
/// session is idle.
pub struct SessionManager {
    factory: ConnectorFactory,
    sessions: Vec<Session>,
    focused: Option<SessionId>,
    next_id: u64,
}

impl SessionManager {
    pub fn new(factory: ConnectorFactory) -> Self {
        Self {
            factory,
            sessions: Vec::new(),
            focused: None,
            next_id: 1,
        }
    }

    /// Build a connector for `spec` and open a focused session for it.
    ///
    /// A factory failure still opens a session, in the errored state, so the
    /// failure is visible where the user asked for the agent.
    pub fn create_session(&mut self, spec: &ConnectorSpec) -> SessionId {
        let built = self.factory.create(spec);
        self.add_session(spec, built.map(Arc::from))
    }

    fn add_session(
        &mut self,
        spec: &ConnectorSpec,
        built: Result<Arc<dyn Connector>, ConfigError>,
    ) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id += 1;

        let session = match built {
            Ok(connector) => {
                let title = spec.title();
                log::info!("session {} started: {}", id, title);
                let mut session = Session::ready(id, title.clone(), connector);
                session.push(
                    SYSTEM_SENDER,
                    format!("Agent '{title}' started."),
                    Emphasis::Notice,
                );
                session
            }
            Err(e) => {
                log::warn!("session {} failed to start {}: {}", id, spec.kind, e);
                let reason = e.to_string();
                let mut session =
                    Session::errored(id, format!("Error: {}", spec.kind), reason.clone());
                session.push(
                    SYSTEM_SENDER,
                    format!("Failed to create agent: {reason}"),
                    Emphasis::Error,
                );
                session
            }
        };

        self.sessions.push(session);
        self.focused = Some(id);
        id
    }

    /// Close a session. An in-flight turn for it is discarded on arrival.
    ///
    /// When the focused session is removed, focus moves to the most recently
    /// created session that remains.
    pub fn remove_session(&mut self, id: SessionId) -> Result<Session, SessionError> {
        let index = self.index_of(id).ok_or(SessionError::NotFound(id))?;
        let removed = self.sessions.remove(index);
        log::info!("session {} removed", id);

        if self.focused == Some(id) {
            self.focused = self.sessions.iter().map(|s| s.id).max();
        }
        Ok(removed)
    }

    pub fn remove_focused(&mut self) -> Option<Session> {
        let id = self.focused?;
        self.remove_session(id).ok()
    }

    pub fn focus(&mut self, id: SessionId) -> Result<(), SessionError> {
        if self.index_of(id).is_none() {
            return Err(SessionError::NotFound(id));
        }
        self.focused = Some(id);
        Ok(())
    }

    /// Focus the next tab, wrapping around.
    pub fn focus_next(&mut self) {
        self.step_focus(1);
    }

    /// Focus the previous tab, wrapping around.
    pub fn focus_previous(&mut self) {
        self.step_focus(-1);
    }

    fn step_focus(&mut self, delta: isize) {
        let count = self.sessions.len() as isize;
        if count == 0 {
            return;
        }
        let current = self
            .focused
            .and_then(|id| self.index_of(id))
            .unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(count) as usize;
        self.focused = Some(self.sessions[next].id);
    }

    /// Focus the tab at `index` (0-based), if there is one.
    pub fn focus_index(&mut self, index: usize) -> bool {
        match self.sessions.get(index) {
            Some(session) => {
                self.focused = Some(session.id);
                true
            }
            None => false,
        }
    }

    pub fn focused(&self) -> Option<SessionId> {
        self.focused
    }

    pub fn focused_session(&self) -> Option<&Session> {
        self.focused.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Sessions in tab order.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Whether the prompt input should accept text.
    pub fn input_enabled(&self) -> bool {
        self.focused_session().is_some_and(Session::is_idle)
    }

    /// Start a turn on the focused session.
    ///
    /// Returns `None` (and changes nothing) for blank text, no focused
    /// session, or a focused session that is busy or errored. Otherwise the
    /// user's text and the thinking notice are recorded, the session is
    /// marked busy and the returned turn must be run and handed back to
    /// [`finish_turn`](Self::finish_turn).
    pub fn begin_turn(&mut self, text: &str) -> Option<PendingTurn> {
        if text.trim().is_empty() {
            return None;
        }

        let id = self.focused?;
        let session = self.get_mut(id)?;
        if !session.is_idle() {
            return None;
        }
        let connector = Arc::clone(session.connector.as_ref()?);

        session.push(USER_SENDER, text, Emphasis::Plain);
        session.state = SessionState::Busy;
        session.push(SYSTEM_SENDER, THINKING_NOTICE, Emphasis::Dim);
        log::debug!("session {} busy", id);

        Some(PendingTurn {
            session_id: id,
            connector,
            prompt: text.to_string(),
        })
    }

    /// Record the reply of a turn started by [`begin_turn`](Self::begin_turn).
    ///
    /// Returns `false` when the session was removed in the meantime; the
    /// reply is dropped.
    pub fn finish_turn(&mut self, id: SessionId, reply: Reply) -> bool {
        let Some(session) = self.get_mut(id) else {
            log::debug!("dropping reply for removed session {}", id);
            return false;
        };

        let sender = session
            .agent_name()
            .unwrap_or(SYSTEM_SENDER)
            .to_string();
        let emphasis = Emphasis::for_reply(&reply);
        session.push(sender, reply.text, emphasis);
        session.state = SessionState::Idle;
        log::debug!("session {} idle", id);
        true
    }

    /// Submit `text` to the focused session and wait for the reply.
    ///
    /// Returns whether a turn actually ran.
    pub async fn submit(&mut self, text: &str) -> bool {
        let Some(turn) = self.begin_turn(text) else {
            return false;
        };
        let (id, reply) = turn.run().await;
        self.finish_turn(id, reply)
    }

    fn index_of(&self, id: SessionId) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }
}
