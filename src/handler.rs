use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, FocusPane, InputMode};
use crate::config::Config;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),

        // Background task results
        AppEvent::StatusLoaded { tables, running } => app.apply_status(tables, running),
        AppEvent::StatusLoadFailed => app.fail_status(),
        AppEvent::ChatChunk(text) => app.append_chat_chunk(&text),
        AppEvent::ChatAnswer(answer) => app.resolve_chat(answer),
        AppEvent::ChatDone => app.finish_chat(),
        AppEvent::ChatError(reason) => app.fail_chat(&reason),
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

        // Tab cycles focus through the panes
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::ChatInput => FocusPane::Tone,
                FocusPane::Tone => FocusPane::Training,
                FocusPane::Training => FocusPane::Tables,
                FocusPane::Tables => FocusPane::Chat,
                FocusPane::Chat => FocusPane::ChatInput,
            };
        }

        // Edit the focused text field
        KeyCode::Char('i') | KeyCode::Enter => {
            if matches!(
                app.focus,
                FocusPane::ChatInput | FocusPane::Tone | FocusPane::Training
            ) {
                app.input_mode = InputMode::Editing;
                if app.focus == FocusPane::ChatInput {
                    app.chat_cursor = app.chat_input.chars().count();
                }
            }
        }

        // Navigation / scrolling based on focus
        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Tables => app.tables_nav_down(),
            _ => app.scroll_chat_down(),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Tables => app.tables_nav_up(),
            _ => app.scroll_chat_up(),
        },

        // Row scrolling within the selected table
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if app.focus == FocusPane::Tables {
                app.scroll_rows_down();
            }
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if app.focus == FocusPane::Tables {
                app.scroll_rows_up();
            }
        }

        // Jump to top/bottom of the chat history
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        // Toggle streaming vs one-shot chat, persisted for next run
        KeyCode::Char('S') => {
            app.use_streaming = !app.use_streaming;
            let _ = Config::save_streaming(app.use_streaming);
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    // The chat input keeps a movable cursor; tone and training data are
    // simple append/truncate fields.
    if app.focus == FocusPane::ChatInput {
        handle_chat_input_editing(app, key);
        return;
    }

    let field = match app.focus {
        FocusPane::Tone => &mut app.tone_input,
        FocusPane::Training => &mut app.training_input,
        _ => {
            app.input_mode = InputMode::Normal;
            return;
        }
    };

    match key.code {
        KeyCode::Esc | KeyCode::Enter => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Backspace => {
            field.pop();
        }
        KeyCode::Char(c) => {
            field.push(c);
        }
        _ => {}
    }
}

fn handle_chat_input_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            submit_chat(app);
        }
        KeyCode::Backspace => {
            if app.chat_cursor > 0 {
                app.chat_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.chat_input.chars().count();
            if app.chat_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.chat_cursor = app.chat_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.chat_input.chars().count();
            app.chat_cursor = (app.chat_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.chat_cursor = 0;
        }
        KeyCode::End => {
            app.chat_cursor = app.chat_input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
            app.chat_input.insert(byte_pos, c);
            app.chat_cursor += 1;
        }
        _ => {}
    }
}

/// Stage the send and spawn the request task. `begin_chat` enforces the
/// non-empty input and single-outstanding-request guards.
fn submit_chat(app: &mut App) {
    let Some(request) = app.begin_chat() else {
        return;
    };

    let client = app.client.clone();
    let tx = app.events_tx.clone();
    let streaming = app.use_streaming;

    tokio::spawn(async move {
        if streaming {
            match client.stream_chat(&request, &tx).await {
                Ok(()) => {
                    let _ = tx.send(AppEvent::ChatDone);
                }
                Err(e) => {
                    let _ = tx.send(AppEvent::ChatError(e.to_string()));
                }
            }
        } else {
            match client.chat(&request).await {
                Ok(answer) => {
                    let _ = tx.send(AppEvent::ChatAnswer(answer));
                }
                Err(e) => {
                    let _ = tx.send(AppEvent::ChatError(e.to_string()));
                }
            }
        }
    });
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    // Position-based scrolling over the recorded pane areas
    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_tables = app.tables_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_tables {
                app.scroll_rows_down();
            } else if in_chat {
                app.scroll_chat_down();
                app.scroll_chat_down();
                app.scroll_chat_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if in_tables {
                app.scroll_rows_up();
            } else if in_chat {
                app.scroll_chat_up();
                app.scroll_chat_up();
                app.scroll_chat_up();
            }
        }
        _ => {}
    }
}
