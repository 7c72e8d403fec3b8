//! Conversation sessions.
//!
//! Each session is one tab in the terminal: a connector, its transcript and
//! whether a request is in flight. The manager keeps them in tab order and
//! tracks which one has focus.

mod manager;
mod state;

pub use manager::{PendingTurn, SessionError, SessionManager, THINKING_NOTICE};
pub use state::{
    Emphasis, Session, SessionId, SessionState, TranscriptEntry, SYSTEM_SENDER, USER_SENDER,
};
