use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use std::collections::BTreeMap;
use tokio::sync::mpsc::UnboundedSender;
use crate::api::{BackendClient, ChatRequest, TableData};
use crate::config::Config;
use crate::tui::AppEvent;

pub const CHAT_ERROR_PREFIX: &str = "Failed to get response: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    ChatInput,
    Tone,
    Training,
    Tables,
    Chat,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Marks the single in-progress model reply while its stream is open.
    pub streaming: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
    Error,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Initial load state
    pub loading: bool,
    pub tables: BTreeMap<String, TableData>,
    pub model_running: bool,

    // Chat state
    pub chat_messages: Vec<ChatMessage>,
    pub chat_input: String,
    pub chat_cursor: usize, // cursor position in chat_input (chars)
    pub tone_input: String,
    pub training_input: String,
    pub chat_loading: bool,
    pub use_streaming: bool,
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Tables state
    pub table_state: ListState,
    pub row_scroll: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub tables_area: Option<Rect>,

    // Backend
    pub client: BackendClient,
    pub events_tx: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(client: BackendClient, events_tx: UnboundedSender<AppEvent>, config: &Config) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: FocusPane::ChatInput,

            loading: true,
            tables: BTreeMap::new(),
            model_running: false,

            chat_messages: Vec::new(),
            chat_input: String::new(),
            chat_cursor: 0,
            tone_input: String::new(),
            training_input: String::new(),
            chat_loading: false,
            use_streaming: config.streaming.unwrap_or(true),
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            table_state: ListState::default(),
            row_scroll: 0,

            animation_frame: 0,

            chat_area: None,
            tables_area: None,

            client,
            events_tx,
        }
    }

    /// Kick off the two startup fetches. They run concurrently and are
    /// joined; one failure downgrades the whole load to an empty dashboard.
    pub fn spawn_initial_load(&self) {
        let client = self.client.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            match tokio::try_join!(client.fetch_tables(), client.fetch_model_status()) {
                Ok((tables, running)) => {
                    let _ = tx.send(AppEvent::StatusLoaded { tables, running });
                }
                Err(_) => {
                    let _ = tx.send(AppEvent::StatusLoadFailed);
                }
            }
        });
    }

    pub fn apply_status(&mut self, tables: BTreeMap<String, TableData>, running: bool) {
        self.tables = tables;
        self.model_running = running;
        self.loading = false;
        if !self.tables.is_empty() {
            self.table_state.select(Some(0));
        }
    }

    pub fn fail_status(&mut self) {
        // Terminal for this run: tables stay empty, status stays stopped.
        self.loading = false;
    }

    // Chat lifecycle. The placeholder pushed by `begin_chat` is always the
    // last message while `chat_loading` holds, so the later transitions
    // address it as such.

    /// Validate and stage a send: returns the request to issue, or None if
    /// the input is blank or a request is already outstanding.
    pub fn begin_chat(&mut self) -> Option<ChatRequest> {
        let message = self.chat_input.trim();
        if message.is_empty() || self.chat_loading {
            return None;
        }

        let request = ChatRequest {
            message: message.to_string(),
            tone: self.tone_input.clone(),
            training_data: self.training_input.clone(),
        };

        self.chat_messages.push(ChatMessage {
            role: ChatRole::User,
            content: request.message.clone(),
            streaming: false,
        });
        self.chat_messages.push(ChatMessage {
            role: ChatRole::Model,
            content: String::new(),
            streaming: true,
        });

        self.chat_input.clear();
        self.chat_cursor = 0;
        self.chat_loading = true;
        self.scroll_chat_to_bottom();

        Some(request)
    }

    fn placeholder_mut(&mut self) -> Option<&mut ChatMessage> {
        self.chat_messages.last_mut().filter(|m| m.streaming)
    }

    /// Append one streamed content frame to the in-progress reply.
    pub fn append_chat_chunk(&mut self, text: &str) {
        if let Some(message) = self.placeholder_mut() {
            message.content.push_str(text);
        }
        self.scroll_chat_to_bottom();
    }

    /// Non-streaming completion: the whole answer arrives at once.
    pub fn resolve_chat(&mut self, answer: String) {
        if let Some(message) = self.placeholder_mut() {
            message.content = answer;
            message.streaming = false;
        }
        self.chat_loading = false;
        self.scroll_chat_to_bottom();
    }

    /// Clean end of stream: keep the accumulated content.
    pub fn finish_chat(&mut self) {
        if let Some(message) = self.placeholder_mut() {
            message.streaming = false;
        }
        self.chat_loading = false;
    }

    /// Any chat failure (transport, non-2xx, in-stream error): the
    /// placeholder becomes an error entry and sending is re-enabled.
    pub fn fail_chat(&mut self, reason: &str) {
        let content = format!("{CHAT_ERROR_PREFIX}{reason}");
        if let Some(message) = self.placeholder_mut() {
            message.role = ChatRole::Error;
            message.content = content;
            message.streaming = false;
        } else {
            self.chat_messages.push(ChatMessage {
                role: ChatRole::Error,
                content,
                streaming: false,
            });
        }
        self.chat_loading = false;
        self.scroll_chat_to_bottom();
    }

    // Tables navigation
    pub fn selected_table(&self) -> Option<(&String, &TableData)> {
        let i = self.table_state.selected()?;
        self.tables.iter().nth(i)
    }

    pub fn tables_nav_down(&mut self) {
        let len = self.tables.len();
        if len > 0 {
            let i = self.table_state.selected().unwrap_or(0);
            self.table_state.select(Some((i + 1).min(len - 1)));
            self.row_scroll = 0;
        }
    }

    pub fn tables_nav_up(&mut self) {
        let i = self.table_state.selected().unwrap_or(0);
        self.table_state.select(Some(i.saturating_sub(1)));
        self.row_scroll = 0;
    }

    pub fn scroll_rows_down(&mut self) {
        if let Some((_, table)) = self.selected_table() {
            let max = table.rows.len().saturating_sub(1) as u16;
            self.row_scroll = self.row_scroll.saturating_add(1).min(max);
        }
    }

    pub fn scroll_rows_up(&mut self) {
        self.row_scroll = self.row_scroll.saturating_sub(1);
    }

    // Chat scrolling
    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_chat_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat_loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll chat so the newest message (or the typing indicator) is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.chat_messages {
            total_lines += 1; // Role line ("You:", "Model:", "Error:")
            // Calculate wrapped lines for each line of content
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1; // Empty line still takes one line
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        // Room for the "Typing..." indicator while a reply is outstanding
        if self.chat_loading {
            total_lines += 1;
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn test_app() -> App {
        // Receiver dropped: state tests never send on the channel.
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(BackendClient::new("http://localhost:3000"), tx, &Config::new())
    }

    fn streaming_count(app: &App) -> usize {
        app.chat_messages.iter().filter(|m| m.streaming).count()
    }

    #[test]
    fn blank_input_does_not_send() {
        let mut app = test_app();
        app.chat_input = "   \t ".to_string();
        assert!(app.begin_chat().is_none());
        assert!(app.chat_messages.is_empty());
        assert!(!app.chat_loading);
    }

    #[test]
    fn begin_chat_stages_user_and_placeholder() {
        let mut app = test_app();
        app.chat_input = "  hello  ".to_string();
        app.tone_input = "Pirate".to_string();
        app.training_input = "You are a helpful assistant".to_string();

        let request = app.begin_chat().expect("send should be staged");
        assert_eq!(request.message, "hello");
        assert_eq!(request.tone, "Pirate");
        assert_eq!(request.training_data, "You are a helpful assistant");

        assert_eq!(app.chat_messages.len(), 2);
        assert_eq!(app.chat_messages[0].role, ChatRole::User);
        assert_eq!(app.chat_messages[0].content, "hello");
        assert_eq!(app.chat_messages[1].role, ChatRole::Model);
        assert!(app.chat_messages[1].content.is_empty());
        assert!(app.chat_messages[1].streaming);

        assert!(app.chat_input.is_empty());
        assert!(app.chat_loading);
    }

    #[test]
    fn second_send_blocked_while_outstanding() {
        let mut app = test_app();
        app.chat_input = "first".to_string();
        assert!(app.begin_chat().is_some());

        app.chat_input = "second".to_string();
        assert!(app.begin_chat().is_none());
        assert_eq!(app.chat_messages.len(), 2);

        // After the first send resolves, the second goes through.
        app.finish_chat();
        assert!(app.begin_chat().is_some());
        assert_eq!(app.chat_messages.len(), 4);
    }

    #[test]
    fn chunks_accumulate_into_growing_prefixes() {
        let mut app = test_app();
        app.chat_input = "hi".to_string();
        app.begin_chat().unwrap();

        let mut previous = String::new();
        for chunk in ["Hel", "lo", " there"] {
            app.append_chat_chunk(chunk);
            let current = &app.chat_messages[1].content;
            assert!(current.starts_with(&previous));
            assert!(current.len() > previous.len());
            previous = current.clone();
        }

        assert_eq!(app.chat_messages[1].content, "Hello there");
        assert!(app.chat_messages[1].streaming);
        assert_eq!(streaming_count(&app), 1);

        app.finish_chat();
        assert_eq!(app.chat_messages[1].content, "Hello there");
        assert!(!app.chat_messages[1].streaming);
        assert!(!app.chat_loading);
        assert_eq!(streaming_count(&app), 0);
    }

    #[test]
    fn failure_replaces_placeholder_with_error_entry() {
        let mut app = test_app();
        app.chat_input = "hi".to_string();
        app.begin_chat().unwrap();
        app.append_chat_chunk("partial answer");

        app.fail_chat("boom");

        let errors: Vec<_> = app
            .chat_messages
            .iter()
            .filter(|m| m.role == ChatRole::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].content.ends_with("boom"));
        assert!(errors[0].content.starts_with(CHAT_ERROR_PREFIX));

        assert_eq!(streaming_count(&app), 0);
        assert!(!app.chat_loading);

        // Guard cleared: the next send is permitted.
        app.chat_input = "again".to_string();
        assert!(app.begin_chat().is_some());
    }

    #[test]
    fn one_shot_answer_fills_placeholder() {
        let mut app = test_app();
        app.use_streaming = false;
        app.chat_input = "hi".to_string();
        app.begin_chat().unwrap();

        app.resolve_chat("full answer".to_string());
        assert_eq!(app.chat_messages[1].content, "full answer");
        assert!(!app.chat_messages[1].streaming);
        assert!(!app.chat_loading);
    }

    #[test]
    fn load_success_populates_tables_and_status() {
        let mut app = test_app();
        let tables: BTreeMap<String, TableData> = serde_json::from_value(json!({
            "users": { "columns": ["id"], "rows": [[1], [2]] },
            "orders": { "columns": ["id", "total"], "rows": [[1, 9.5]] }
        }))
        .unwrap();

        app.apply_status(tables, true);
        assert!(!app.loading);
        assert!(app.model_running);
        assert_eq!(app.tables.len(), 2);
        assert_eq!(app.table_state.selected(), Some(0));
        for table in app.tables.values() {
            for row in &table.rows {
                assert_eq!(row.len(), table.columns.len());
            }
        }
    }

    #[test]
    fn load_failure_leaves_empty_dashboard() {
        let mut app = test_app();
        app.fail_status();
        assert!(!app.loading);
        assert!(app.tables.is_empty());
        assert!(!app.model_running);
        assert!(app.chat_messages.is_empty());
    }

    #[test]
    fn table_navigation_clamps_and_resets_row_scroll() {
        let mut app = test_app();
        let tables: BTreeMap<String, TableData> = serde_json::from_value(json!({
            "a": { "columns": ["x"], "rows": [[1], [2], [3]] },
            "b": { "columns": ["y"], "rows": [[1]] }
        }))
        .unwrap();
        app.apply_status(tables, false);

        app.scroll_rows_down();
        assert_eq!(app.row_scroll, 1);

        app.tables_nav_down();
        assert_eq!(app.selected_table().unwrap().0, "b");
        assert_eq!(app.row_scroll, 0);

        app.tables_nav_down();
        assert_eq!(app.selected_table().unwrap().0, "b");

        app.tables_nav_up();
        assert_eq!(app.selected_table().unwrap().0, "a");
    }
}
