use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => app.scroll_chat_to_bottom(),
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('o') => {
                app.open_attach_prompt();
                return;
            }
            KeyCode::Char('x') => {
                app.clear_attachment();
                return;
            }
            _ => {}
        }
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
        InputMode::AttachPath => handle_attach_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Enter | KeyCode::Tab => {
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('a') => app.open_attach_prompt(),
        KeyCode::Char('x') => app.clear_attachment(),

        // Transcript scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') | KeyCode::PageDown => app.scroll_down(app.chat_height / 2),
        KeyCode::Char('u') | KeyCode::PageUp => app.scroll_up(app.chat_height / 2),
        KeyCode::Char('g') | KeyCode::Home => app.chat_scroll = 0,
        KeyCode::Char('G') | KeyCode::End => app.scroll_chat_to_bottom(),
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        // Alt+Enter inserts a newline; plain Enter sends
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => app.insert_char('\n'),
        KeyCode::Enter => {
            if app.send_message() {
                app.input_mode = InputMode::Normal;
            }
        }
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::Char(c) => app.insert_char(c),
        _ => {}
    }
}

fn handle_attach_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.path_input.clear();
            app.path_cursor = 0;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Enter => app.attach_from_prompt(),
        KeyCode::Backspace => app.path_backspace(),
        KeyCode::Left => app.path_cursor = app.path_cursor.saturating_sub(1),
        KeyCode::Right => {
            let len = app.path_input.chars().count();
            app.path_cursor = (app.path_cursor + 1).min(len);
        }
        KeyCode::Char(c) => app.path_insert(c),
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    match app.input_mode {
        InputMode::AttachPath => {
            for c in text.chars().filter(|c| !c.is_control()) {
                app.path_insert(c);
            }
        }
        InputMode::Editing => app.insert_str(text),
        InputMode::Normal => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .is_some_and(|r| point_in_rect(mouse.column, mouse.row, r));
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}
