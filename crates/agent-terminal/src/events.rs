//! Application event types.
//!
//! The input thread and the tasks running agent turns both feed the main
//! loop through one mpsc channel; events are handled strictly in order.

use agent_terminal_core::{Reply, SessionId};
use crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum AppEvent {
    Input(KeyEvent),
    Resize,
    /// A turn started by `begin_turn` has its reply.
    TurnFinished { session: SessionId, reply: Reply },
}
