//! # agent-terminal-core
//!
//! Core logic for agent-terminal, a multi-session terminal for chatting with
//! AI backends.
//!
//! This crate has no UI. The `agent-terminal` binary drives it from a
//! terminal interface, but everything here can be used on its own.
//!
//! ## Key Concepts
//!
//! - **Connector**: one AI backend behind a uniform prompt-to-reply call
//! - **Session**: a connector plus its transcript and busy state
//! - **SessionManager**: the ordered set of sessions and the focused one

pub mod connectors;
pub mod factory;
pub mod logging;
pub mod paths;
pub mod session;
pub mod shell;
pub mod spawn;
pub mod speech;

// Re-export commonly used types
pub use connectors::{BackendKind, Connector, Reply};
pub use factory::{ConfigError, ConnectorFactory, ConnectorSettings, ConnectorSpec};
pub use session::{Emphasis, PendingTurn, Session, SessionId, SessionManager};
