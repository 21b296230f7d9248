use std::io;
use std::time::Duration;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Tick,
    Quit,
    NextPane,
    PrevPane,
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    CursorLeft,
    CursorRight,
    CursorUp,
    CursorDown,
    InputChar(char),
    Newline,
    Paste(String),
    Backspace,
    Submit,
    Cancel,
    NextModel,
    LoadTextFile,
    LoadImageFile,
    ClearSession,
    CopyCommand,
    MouseScrollUp,
    MouseScrollDown,
    MouseLeftClick(u16, u16),
}

fn map_key_event(key_event: KeyEvent) -> AppEvent {
    if key_event.kind != KeyEventKind::Press {
        return AppEvent::Tick;
    }

    let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && let KeyCode::Char(c) = key_event.code {
        return match c.to_ascii_lowercase() {
            'c' => AppEvent::Quit,
            'n' => AppEvent::NextModel,
            't' => AppEvent::LoadTextFile,
            'o' => AppEvent::LoadImageFile,
            'l' => AppEvent::ClearSession,
            'y' => AppEvent::CopyCommand,
            'u' => AppEvent::PageUp,
            'd' => AppEvent::PageDown,
            _ => AppEvent::Tick,
        };
    }

    match key_event.code {
        KeyCode::Enter
            if key_event.modifiers.contains(KeyModifiers::SHIFT)
                || key_event.modifiers.contains(KeyModifiers::ALT) =>
        {
            AppEvent::Newline
        }
        KeyCode::Enter => AppEvent::Submit,
        KeyCode::Tab => AppEvent::NextPane,
        KeyCode::BackTab => AppEvent::PrevPane,
        KeyCode::Esc => AppEvent::Cancel,
        KeyCode::Up
            if key_event.modifiers.contains(KeyModifiers::SHIFT) || ctrl =>
        {
            AppEvent::ScrollUp
        }
        KeyCode::Down
            if key_event.modifiers.contains(KeyModifiers::SHIFT) || ctrl =>
        {
            AppEvent::ScrollDown
        }
        KeyCode::PageUp => AppEvent::PageUp,
        KeyCode::PageDown => AppEvent::PageDown,
        KeyCode::Up => AppEvent::CursorUp,
        KeyCode::Down => AppEvent::CursorDown,
        KeyCode::Left => AppEvent::CursorLeft,
        KeyCode::Right => AppEvent::CursorRight,
        KeyCode::Backspace => AppEvent::Backspace,
        KeyCode::Char(c) => AppEvent::InputChar(c),
        _ => AppEvent::Tick,
    }
}

fn map_mouse_event(kind: MouseEventKind, column: u16, row: u16) -> AppEvent {
    match kind {
        MouseEventKind::ScrollUp => AppEvent::MouseScrollUp,
        MouseEventKind::ScrollDown => AppEvent::MouseScrollDown,
        MouseEventKind::Down(MouseButton::Left) => AppEvent::MouseLeftClick(column, row),
        _ => AppEvent::Tick,
    }
}

pub fn next_event() -> io::Result<AppEvent> {
    if event::poll(Duration::from_millis(16))? {
        return Ok(match event::read()? {
            Event::Key(key_event) => map_key_event(key_event),
            Event::Mouse(mouse_event) => {
                map_mouse_event(mouse_event.kind, mouse_event.column, mouse_event.row)
            }
            Event::Paste(text) => AppEvent::Paste(text),
            _ => AppEvent::Tick,
        });
    }

    Ok(AppEvent::Tick)
}
