//! Application state.

use std::path::PathBuf;

use agent_terminal_core::{PendingTurn, SessionManager};

use super::selection::SelectionDialog;

/// All mutable UI state. Input handling and rendering live in sibling
/// modules; the runner owns the terminal and the event channel.
pub struct App {
    pub manager: SessionManager,
    /// Text typed into the prompt box.
    pub input: String,
    /// Open agent selection dialog, if any.
    pub dialog: Option<SelectionDialog>,
    /// Turns begun by input handling, waiting to be spawned by the runner.
    pub outgoing: Vec<PendingTurn>,
    pub should_quit: bool,
    /// Ring the terminal bell on the next draw.
    pub bell: bool,
    /// Mascot art file; built-in art when `None`.
    pub mascot: Option<PathBuf>,
}

impl App {
    /// New app with the selection dialog already open.
    pub fn new(manager: SessionManager) -> Self {
        Self {
            manager,
            input: String::new(),
            dialog: Some(SelectionDialog::new()),
            outgoing: Vec::new(),
            should_quit: false,
            bell: false,
            mascot: None,
        }
    }

    pub fn with_mascot(mut self, mascot: Option<PathBuf>) -> Self {
        self.mascot = mascot;
        self
    }

    pub fn open_dialog(&mut self) {
        self.dialog = Some(SelectionDialog::new());
    }

    /// Close the dialog. With no sessions left there is nothing to show, so
    /// the app quits.
    pub fn cancel_dialog(&mut self) {
        self.dialog = None;
        if self.manager.is_empty() {
            log::info!("selection cancelled with no sessions, quitting");
            self.should_quit = true;
        }
    }

    pub fn take_outgoing(&mut self) -> Vec<PendingTurn> {
        std::mem::take(&mut self.outgoing)
    }
}
