//! Keyboard and event handling.
//!
//! Key bindings:
//! - `Ctrl+T` add agent, `Ctrl+W` remove agent
//! - `Ctrl+Left`/`Ctrl+Right` or `Alt+1..9` switch tabs
//! - `Enter` submit, `Ctrl+Q`/`Esc` quit
//!
//! While the selection dialog is open it takes every key: Up/Down pick a
//! preset, Tab moves between fields, Enter creates, Esc cancels.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::events::AppEvent;

use super::state::App;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Input(key) => handle_key(app, key),
        AppEvent::Resize => {}
        AppEvent::TurnFinished { session, reply } => {
            app.manager.finish_turn(session, reply);
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.kind == KeyEventKind::Release {
        return;
    }
    if app.dialog.is_some() {
        handle_dialog_key(app, key);
    } else {
        handle_main_key(app, key);
    }
}

fn handle_dialog_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c')) {
        app.should_quit = true;
        return;
    }

    let Some(dialog) = app.dialog.as_mut() else {
        return;
    };

    match key.code {
        KeyCode::Esc => app.cancel_dialog(),
        KeyCode::Up => dialog.select_previous(),
        KeyCode::Down => dialog.select_next(),
        KeyCode::Tab => dialog.next_field(),
        KeyCode::Backspace => dialog.backspace(),
        KeyCode::Enter => match dialog.build_spec() {
            Ok(spec) => {
                app.dialog = None;
                app.manager.create_session(&spec);
            }
            Err(missing) => {
                log::debug!("selection incomplete: {:?}", missing);
                app.bell = true;
            }
        },
        KeyCode::Char(c) if !ctrl => dialog.push_char(c),
        _ => {}
    }
}

fn handle_main_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('q') | KeyCode::Char('c') if ctrl => app.should_quit = true,
        KeyCode::Char('t') if ctrl => app.open_dialog(),
        KeyCode::Char('w') if ctrl => {
            app.manager.remove_focused();
            if app.manager.is_empty() {
                app.input.clear();
            }
        }
        KeyCode::Left if ctrl => app.manager.focus_previous(),
        KeyCode::Right if ctrl => app.manager.focus_next(),
        KeyCode::Char(c @ '1'..='9') if alt => {
            let index = c as usize - '1' as usize;
            app.manager.focus_index(index);
        }
        KeyCode::Enter => submit(app),
        KeyCode::Backspace => {
            if app.manager.input_enabled() {
                app.input.pop();
            }
        }
        KeyCode::Char(c) if !ctrl && !alt => {
            if app.manager.input_enabled() {
                app.input.push(c);
            }
        }
        _ => {}
    }
}

fn submit(app: &mut App) {
    if let Some(turn) = app.manager.begin_turn(&app.input) {
        app.input.clear();
        app.outgoing.push(turn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_terminal_core::session::{SessionState, THINKING_NOTICE};
    use agent_terminal_core::{ConnectorFactory, ConnectorSettings, Reply, SessionManager};

    fn app() -> App {
        let factory =
            ConnectorFactory::new(ConnectorSettings::default()).credential_lookup(|_| None);
        App::new(SessionManager::new(factory))
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_event(app, AppEvent::Input(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    fn press_with(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
        handle_event(app, AppEvent::Input(KeyEvent::new(code, modifiers)));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    /// Open an Ollama session through the dialog (no credential needed).
    fn add_llama(app: &mut App) {
        if app.dialog.is_none() {
            press_with(app, KeyCode::Char('t'), KeyModifiers::CONTROL);
        }
        press(app, KeyCode::Down);
        press(app, KeyCode::Down);
        press(app, KeyCode::Enter);
    }

    mod dialog {
        use super::*;

        #[test]
        fn opens_on_startup() {
            assert!(app().dialog.is_some());
        }

        #[test]
        fn cancel_with_no_sessions_quits() {
            let mut app = app();
            press(&mut app, KeyCode::Esc);
            assert!(app.dialog.is_none());
            assert!(app.should_quit);
        }

        #[test]
        fn cancel_with_sessions_keeps_running() {
            let mut app = app();
            add_llama(&mut app);
            press_with(&mut app, KeyCode::Char('t'), KeyModifiers::CONTROL);
            press(&mut app, KeyCode::Esc);

            assert!(app.dialog.is_none());
            assert!(!app.should_quit);
        }

        #[test]
        fn enter_creates_focused_session() {
            let mut app = app();
            add_llama(&mut app);

            assert!(app.dialog.is_none());
            let session = app.manager.focused_session().unwrap();
            assert_eq!(session.title, "OllamaAgent: llama3");
            assert!(app.manager.input_enabled());
        }

        #[test]
        fn incomplete_custom_model_rings_bell_and_stays_open() {
            let mut app = app();
            for _ in 0..3 {
                press(&mut app, KeyCode::Down);
            }
            press(&mut app, KeyCode::Enter);

            assert!(app.bell);
            assert!(app.dialog.is_some());
            assert!(app.manager.is_empty());

            type_text(&mut app, "phi3");
            press(&mut app, KeyCode::Enter);
            assert!(app.dialog.is_none());
            assert_eq!(app.manager.focused_session().unwrap().title, "OllamaAgent: phi3");
        }

        #[test]
        fn missing_credential_creates_errored_tab() {
            let mut app = app();
            press(&mut app, KeyCode::Enter);

            let session = app.manager.focused_session().unwrap();
            assert_eq!(session.title, "Error: OpenAIAgent");
            assert!(matches!(session.state(), SessionState::Errored(_)));
            assert!(!app.manager.input_enabled());
        }
    }

    mod prompt {
        use super::*;

        #[test]
        fn typing_and_enter_begins_turn() {
            let mut app = app();
            add_llama(&mut app);

            type_text(&mut app, "Hello");
            assert_eq!(app.input, "Hello");
            press(&mut app, KeyCode::Enter);

            assert!(app.input.is_empty());
            let turns = app.take_outgoing();
            assert_eq!(turns.len(), 1);
            assert_eq!(turns[0].prompt(), "Hello");

            let session = app.manager.focused_session().unwrap();
            assert!(session.is_busy());
            assert_eq!(session.transcript().last().unwrap().text, THINKING_NOTICE);
            assert!(!app.manager.input_enabled());
        }

        #[test]
        fn typing_is_ignored_while_busy() {
            let mut app = app();
            add_llama(&mut app);
            type_text(&mut app, "Hi");
            press(&mut app, KeyCode::Enter);

            type_text(&mut app, "more");
            assert!(app.input.is_empty());
        }

        #[test]
        fn turn_finished_event_restores_input() {
            let mut app = app();
            add_llama(&mut app);
            type_text(&mut app, "Hi");
            press(&mut app, KeyCode::Enter);
            let turn = app.take_outgoing().pop().unwrap();

            handle_event(
                &mut app,
                AppEvent::TurnFinished {
                    session: turn.session_id(),
                    reply: Reply::text("Hello!"),
                },
            );

            let session = app.manager.focused_session().unwrap();
            assert!(session.is_idle());
            assert_eq!(session.transcript().last().unwrap().text, "Hello!");
            assert!(app.manager.input_enabled());
        }

        #[test]
        fn empty_enter_is_noop() {
            let mut app = app();
            add_llama(&mut app);
            press(&mut app, KeyCode::Enter);
            assert!(app.take_outgoing().is_empty());
        }

        #[test]
        fn ctrl_w_removes_focused_tab() {
            let mut app = app();
            add_llama(&mut app);
            add_llama(&mut app);
            assert_eq!(app.manager.len(), 2);

            press_with(&mut app, KeyCode::Char('w'), KeyModifiers::CONTROL);
            assert_eq!(app.manager.len(), 1);
            press_with(&mut app, KeyCode::Char('w'), KeyModifiers::CONTROL);
            assert!(app.manager.is_empty());
            assert!(!app.manager.input_enabled());
        }

        #[test]
        fn tab_switching() {
            let mut app = app();
            add_llama(&mut app);
            add_llama(&mut app);
            let ids: Vec<_> = app.manager.sessions().iter().map(|s| s.id).collect();

            press_with(&mut app, KeyCode::Char('1'), KeyModifiers::ALT);
            assert_eq!(app.manager.focused(), Some(ids[0]));
            press_with(&mut app, KeyCode::Right, KeyModifiers::CONTROL);
            assert_eq!(app.manager.focused(), Some(ids[1]));
            press_with(&mut app, KeyCode::Left, KeyModifiers::CONTROL);
            assert_eq!(app.manager.focused(), Some(ids[0]));
        }

        #[test]
        fn quit_bindings() {
            let mut app = app();
            add_llama(&mut app);
            press_with(&mut app, KeyCode::Char('q'), KeyModifiers::CONTROL);
            assert!(app.should_quit);

            let mut app = super::app();
            add_llama(&mut app);
            press(&mut app, KeyCode::Esc);
            assert!(app.should_quit);
        }
    }
}
