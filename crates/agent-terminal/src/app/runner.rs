//! Application runner and event loop.
//!
//! Handles terminal setup/teardown and the main event loop. Agent turns run
//! on the tokio runtime and report back through the same channel as input.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};

use agent_terminal_core::{PendingTurn, SessionManager};
use crossterm::event::{self, Event};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::runtime::Handle;

use crate::events::AppEvent;

use super::state::App;

/// Entry point: set up the terminal, run the loop, restore the terminal.
pub fn run(manager: SessionManager, mascot: Option<PathBuf>, runtime: Handle) -> io::Result<()> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    stdout.execute(EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let app = App::new(manager).with_mascot(mascot);
    let result = run_loop(&mut terminal, app, &runtime);

    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Main event loop: process events until quit.
fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    runtime: &Handle,
) -> io::Result<()> {
    let (event_tx, event_rx) = mpsc::channel::<AppEvent>();
    spawn_input_thread(event_tx.clone());

    terminal.clear()?;
    terminal.draw(|frame| super::render::render(&app, frame))?;

    while !app.should_quit {
        let event = match event_rx.recv() {
            Ok(event) => event,
            Err(_) => break,
        };
        super::input::handle_event(&mut app, event);
        // Drain any pending events before redraw
        while let Ok(event) = event_rx.try_recv() {
            super::input::handle_event(&mut app, event);
        }

        for turn in app.take_outgoing() {
            dispatch_turn(runtime, turn, event_tx.clone());
        }

        if app.bell {
            app.bell = false;
            let backend = terminal.backend_mut();
            backend.write_all(b"\x07")?;
            backend.flush()?;
        }

        terminal.draw(|frame| super::render::render(&app, frame))?;
    }
    Ok(())
}

/// Run a turn on the runtime and post its reply back to the loop.
fn dispatch_turn(runtime: &Handle, turn: PendingTurn, sender: Sender<AppEvent>) {
    let session = turn.session_id();
    log::debug!("dispatching turn for session {}", session);
    runtime.spawn(async move {
        let (session, reply) = turn.run().await;
        if sender.send(AppEvent::TurnFinished { session, reply }).is_err() {
            log::debug!("event loop gone, dropping reply for session {}", session);
        }
    });
}

/// Spawn a thread to read terminal input events.
fn spawn_input_thread(sender: Sender<AppEvent>) {
    std::thread::spawn(move || loop {
        match event::read() {
            Ok(Event::Key(key)) => {
                if sender.send(AppEvent::Input(key)).is_err() {
                    break;
                }
            }
            Ok(Event::Resize(_, _)) => {
                if sender.send(AppEvent::Resize).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
    });
}
