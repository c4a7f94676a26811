use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;

use agent_chat_core::dispatch;
use crate::app::App;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent, events: &UnboundedSender<AppEvent>) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key, events),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse, events),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Reply(outcome) => app.finish_turn(outcome),
    }
    Ok(())
}

/// Submit the input box and, if a turn started, dispatch it in the background.
///
/// Enter and a click on Send both land here.
fn send(app: &mut App, events: &UnboundedSender<AppEvent>) {
    let Some(query) = app.submit() else {
        return;
    };

    let client = app.client.clone();
    let tx = events.clone();
    tokio::spawn(async move {
        let outcome = dispatch(&client, &query).await;
        // The receiver is gone only when the app is shutting down.
        let _ = tx.send(AppEvent::Reply(outcome));
    });
}

fn handle_key(app: &mut App, key: KeyEvent, events: &UnboundedSender<AppEvent>) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        // Quit
        KeyCode::Char('c') if ctrl => app.should_quit = true,
        KeyCode::Esc => app.should_quit = true,

        // Save images of the latest reply
        KeyCode::Char('s') if ctrl => app.save_latest_images(),

        // Half-page scroll
        KeyCode::Char('u') if ctrl => app.scroll_half_page_up(),
        KeyCode::Char('d') if ctrl => app.scroll_half_page_down(),
        KeyCode::PageUp => app.scroll_half_page_up(),
        KeyCode::PageDown => app.scroll_half_page_down(),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),

        KeyCode::Enter => send(app, events),

        // Line editing
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),

        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent, events: &UnboundedSender<AppEvent>) {
    let x = mouse.column;
    let y = mouse.row;

    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let on_send = app.send_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) if on_send => send(app, events),
        MouseEventKind::ScrollUp if in_chat => app.scroll_up(3),
        MouseEventKind::ScrollDown if in_chat => app.scroll_down(3),
        _ => {}
    }
}
