use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::tui::AppEvent;

/// One table from the backend snapshot: ordered columns, rows of scalar cells.
#[derive(Debug, Clone, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct TablesResponse {
    #[serde(default)]
    tables: BTreeMap<String, TableData>,
}

#[derive(Deserialize)]
struct ModelStatusResponse {
    running: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub tone: String,
    pub training_data: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    answer: String,
}

/// Payload of one `data: {...}` stream line. The server emits either
/// incremental text or an in-stream error, never both.
#[derive(Deserialize)]
struct StreamPayload {
    content: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Content(String),
    Error(String),
}

/// Incremental parser for the chat stream body.
///
/// Transport chunk boundaries do not line up with frame boundaries: one read
/// may carry several `data:` lines, or a single line split anywhere,
/// including mid-byte of a UTF-8 sequence. Bytes accumulate in `buf`; only
/// complete newline-terminated lines are parsed, and the trailing partial
/// line is kept for the next read.
#[derive(Default)]
pub struct FrameParser {
    buf: Vec<u8>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk, returning every frame completed by it.
    /// Lines without the `data: ` prefix or with unparseable JSON are
    /// expected protocol noise (keep-alives, split fragments) and skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            let Some(payload) = line.strip_prefix(b"data: ") else {
                continue;
            };
            match serde_json::from_slice::<StreamPayload>(payload) {
                Ok(StreamPayload { error: Some(message), .. }) => {
                    frames.push(StreamFrame::Error(message));
                }
                Ok(StreamPayload { content: Some(text), .. }) => {
                    frames.push(StreamFrame::Content(text));
                }
                Ok(_) | Err(_) => {}
            }
        }
        frames
    }
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_tables(&self) -> Result<BTreeMap<String, TableData>> {
        let url = format!("{}/api/tables", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to fetch tables: {}", response.status()));
        }

        let tables_response: TablesResponse = response.json().await?;
        Ok(tables_response.tables)
    }

    pub async fn fetch_model_status(&self) -> Result<bool> {
        let url = format!("{}/api/model-status", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to fetch model status: {}", response.status()));
        }

        let status_response: ModelStatusResponse = response.json().await?;
        Ok(status_response.running)
    }

    /// One-shot chat: the whole answer in a single response body.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Chat request failed with status: {}",
                response.status()
            ));
        }

        let chat_response: ChatResponse = response.json().await?;
        Ok(chat_response.answer)
    }

    /// Streaming chat: forwards each content frame as a `ChatChunk` event as
    /// it arrives. Returns once the body ends; an in-stream `{error}` frame
    /// or transport failure becomes the returned error.
    pub async fn stream_chat(
        &self,
        request: &ChatRequest,
        tx: &UnboundedSender<AppEvent>,
    ) -> Result<()> {
        let url = format!("{}/api/chat/stream", self.base_url);

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Chat request failed with status: {}",
                response.status()
            ));
        }

        let mut stream = response.bytes_stream();
        let mut parser = FrameParser::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for frame in parser.push(&chunk) {
                match frame {
                    StreamFrame::Content(text) => {
                        // Receiver gone means the UI is shutting down.
                        if tx.send(AppEvent::ChatChunk(text)).is_err() {
                            return Ok(());
                        }
                    }
                    StreamFrame::Error(message) => return Err(anyhow!(message)),
                }
            }
        }

        Ok(())
    }
}

/// Render one table cell the way the dashboard shows it: strings verbatim,
/// null empty, everything else via its JSON text.
pub fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contents(frames: &[StreamFrame]) -> Vec<&str> {
        frames
            .iter()
            .map(|f| match f {
                StreamFrame::Content(s) => s.as_str(),
                StreamFrame::Error(s) => panic!("unexpected error frame: {s}"),
            })
            .collect()
    }

    #[test]
    fn parses_single_complete_frame() {
        let mut parser = FrameParser::new();
        let frames = parser.push(b"data: {\"content\":\"Hi\"}\n");
        assert_eq!(frames, vec![StreamFrame::Content("Hi".into())]);
    }

    #[test]
    fn parses_multiple_frames_in_one_chunk() {
        let mut parser = FrameParser::new();
        let frames =
            parser.push(b"data: {\"content\":\"a\"}\n\ndata: {\"content\":\"b\"}\n\n");
        assert_eq!(contents(&frames), vec!["a", "b"]);
    }

    #[test]
    fn reassembles_frame_split_byte_by_byte() {
        let mut parser = FrameParser::new();
        let wire = b"data: {\"content\":\"Hi\"}\n";

        let mut frames = Vec::new();
        for byte in wire {
            frames.extend(parser.push(std::slice::from_ref(byte)));
        }
        assert_eq!(frames, vec![StreamFrame::Content("Hi".into())]);
    }

    #[test]
    fn carries_partial_line_across_reads() {
        let mut parser = FrameParser::new();
        // Split exactly inside the JSON body, then inside the next prefix.
        assert!(parser.push(b"data: {\"cont").is_empty());
        let frames = parser.push(b"ent\":\"hello\"}\nda");
        assert_eq!(contents(&frames), vec!["hello"]);
        let frames = parser.push(b"ta: {\"content\":\" world\"}\n");
        assert_eq!(contents(&frames), vec![" world"]);
    }

    #[test]
    fn skips_malformed_lines_without_aborting() {
        let mut parser = FrameParser::new();
        let frames = parser.push(
            b"data: {partial\nnoise line\ndata: {\"content\":\"ok\"}\n",
        );
        assert_eq!(contents(&frames), vec!["ok"]);
    }

    #[test]
    fn surfaces_error_frame() {
        let mut parser = FrameParser::new();
        let frames = parser.push(b"data: {\"error\":\"boom\"}\n");
        assert_eq!(frames, vec![StreamFrame::Error("boom".into())]);
    }

    #[test]
    fn handles_crlf_line_endings() {
        let mut parser = FrameParser::new();
        let frames = parser.push(b"data: {\"content\":\"x\"}\r\n");
        assert_eq!(contents(&frames), vec!["x"]);
    }

    #[test]
    fn reassembles_multibyte_content_split_mid_character() {
        let mut parser = FrameParser::new();
        let wire = "data: {\"content\":\"héllo\"}\n".as_bytes();
        // Split between the two bytes of the é
        let split = wire.iter().position(|&b| b >= 0x80).unwrap() + 1;
        let (head, tail) = wire.split_at(split);
        assert!(parser.push(head).is_empty());
        let frames = parser.push(tail);
        assert_eq!(contents(&frames), vec!["héllo"]);
    }

    #[test]
    fn tables_default_to_empty_when_key_absent() {
        let parsed: TablesResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.tables.is_empty());
    }

    #[test]
    fn table_rows_keep_cell_counts() {
        let parsed: TablesResponse = serde_json::from_value(json!({
            "tables": {
                "users": {
                    "columns": ["id", "name"],
                    "rows": [[1, "ada"], [2, "grace"]]
                }
            }
        }))
        .unwrap();

        let users = &parsed.tables["users"];
        assert_eq!(parsed.tables.len(), 1);
        for row in &users.rows {
            assert_eq!(row.len(), users.columns.len());
        }
    }

    #[test]
    fn cell_text_matches_dashboard_rendering() {
        assert_eq!(cell_text(&json!("ada")), "ada");
        assert_eq!(cell_text(&json!(null)), "");
        assert_eq!(cell_text(&json!(42)), "42");
        assert_eq!(cell_text(&json!(true)), "true");
    }
}
