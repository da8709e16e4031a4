use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, InputMode, INPUT_CHAR_LIMIT};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Health(healthy) => {
            app.session.set_connected(healthy);
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Back to the input
        KeyCode::Char('i') | KeyCode::Char('/') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            // Cursor at end of existing text
            app.input_cursor = app.input.chars().count();
        }

        // Chat scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        // Half-page scroll
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_up();
        }

        // Dismiss the error banner
        KeyCode::Char('x') => app.dismiss_error(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.submit_message();
        }
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            // Soft cap on message length
            if app.input.chars().count() < INPUT_CHAR_LIMIT {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.insert(byte_pos, c);
                app.input_cursor += 1;
            }
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => {
            app.scroll_down();
            app.scroll_down();
            app.scroll_down();
        }
        MouseEventKind::ScrollUp => {
            app.scroll_up();
            app.scroll_up();
            app.scroll_up();
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ChatTransport};
    use crate::state::Message;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StubTransport;

    #[async_trait]
    impl ChatTransport for StubTransport {
        async fn send_message(&self, _message: &str, _history: &[Message]) -> Result<String, ApiError> {
            Ok("ok".to_string())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn app() -> App {
        App::new(Arc::new(StubTransport))
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[tokio::test]
    async fn typing_edits_the_draft_at_the_cursor() {
        let mut app = app();

        for c in "héllo".chars() {
            handle_key(&mut app, press(KeyCode::Char(c)));
        }
        assert_eq!(app.input, "héllo");
        assert_eq!(app.input_cursor, 5);

        handle_key(&mut app, press(KeyCode::Left));
        handle_key(&mut app, press(KeyCode::Left));
        handle_key(&mut app, press(KeyCode::Backspace));
        assert_eq!(app.input, "hélo");
        assert_eq!(app.input_cursor, 2);

        handle_key(&mut app, press(KeyCode::Home));
        handle_key(&mut app, press(KeyCode::Delete));
        assert_eq!(app.input, "élo");
    }

    #[tokio::test]
    async fn input_stops_at_the_character_cap() {
        let mut app = app();
        app.input = "x".repeat(INPUT_CHAR_LIMIT);
        app.input_cursor = INPUT_CHAR_LIMIT;

        handle_key(&mut app, press(KeyCode::Char('y')));

        assert_eq!(app.input.chars().count(), INPUT_CHAR_LIMIT);
        assert!(!app.input.contains('y'));
    }

    #[tokio::test]
    async fn health_event_updates_connected() {
        let mut app = app();
        assert!(app.session.connected);

        handle_event(&mut app, AppEvent::Health(false)).await.unwrap();
        assert!(!app.session.connected);

        handle_event(&mut app, AppEvent::Health(true)).await.unwrap();
        assert!(app.session.connected);
    }

    #[tokio::test]
    async fn ctrl_c_quits_from_any_mode() {
        let mut app = app();
        handle_key(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn escape_and_q_leave_and_quit() {
        let mut app = app();
        assert_eq!(app.input_mode, InputMode::Editing);

        handle_key(&mut app, press(KeyCode::Esc));
        assert_eq!(app.input_mode, InputMode::Normal);

        handle_key(&mut app, press(KeyCode::Char('q')));
        assert!(app.should_quit);
    }
}
