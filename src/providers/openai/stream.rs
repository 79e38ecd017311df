//! Server-sent events from `POST /responses` with `stream: true`.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::QxError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StreamEvent {
    TextDelta(String),
    Completed,
    Failed(String),
    Done,
    Ignored(String),
}

/// Buffers partial frames across network chunks.
#[derive(Debug, Default)]
pub(crate) struct SseParser {
    buffer: String,
}

impl SseParser {
    pub fn feed(&mut self, chunk: &str) -> Vec<StreamEvent> {
        self.buffer.push_str(chunk);
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_frame(&frame) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_frame(frame: &str) -> Option<StreamEvent> {
    let data: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if data.is_empty() {
        return None;
    }

    let data = data.join("\n");
    if data == "[DONE]" {
        return Some(StreamEvent::Done);
    }

    let json: Value = serde_json::from_str(&data).ok()?;
    let event_type = json.get("type").and_then(Value::as_str).unwrap_or("");
    let event = match event_type {
        "response.output_text.delta" => StreamEvent::TextDelta(
            json.get("delta")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        ),
        "response.completed" => StreamEvent::Completed,
        "response.failed" | "error" => StreamEvent::Failed(error_message(&json)),
        "" => return None,
        other => StreamEvent::Ignored(other.to_string()),
    };
    Some(event)
}

fn error_message(json: &Value) -> String {
    let error = json
        .get("error")
        .or_else(|| json.get("response").and_then(|response| response.get("error")));
    error
        .and_then(|error| error.get("message").and_then(Value::as_str).or(error.as_str()))
        .or_else(|| json.get("message").and_then(Value::as_str))
        .unwrap_or("stream reported an error")
        .to_string()
}

pub(crate) type ByteStream =
    Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>;

/// Text chunks of a streamed response, yielded in arrival order.
pub struct TextStream {
    bytes: ByteStream,
    parser: SseParser,
    pending: VecDeque<StreamEvent>,
    utf8_carry: Vec<u8>,
    finished: bool,
}

impl fmt::Debug for TextStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextStream")
            .field("pending", &self.pending.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl TextStream {
    pub(crate) fn new(bytes: ByteStream) -> Self {
        Self {
            bytes,
            parser: SseParser::default(),
            pending: VecDeque::new(),
            utf8_carry: Vec::new(),
            finished: false,
        }
    }

    /// Next non-empty text delta, or `None` once the response has completed.
    pub async fn next_chunk(&mut self) -> Result<Option<String>, QxError> {
        loop {
            while let Some(event) = self.pending.pop_front() {
                match event {
                    StreamEvent::TextDelta(delta) if delta.is_empty() => {}
                    StreamEvent::TextDelta(delta) => return Ok(Some(delta)),
                    StreamEvent::Completed | StreamEvent::Done => {
                        self.finished = true;
                        self.pending.clear();
                        return Ok(None);
                    }
                    StreamEvent::Failed(message) => {
                        self.finished = true;
                        warn!(error = %message, "streamed response failed");
                        return Err(QxError::ModelFailed(message));
                    }
                    StreamEvent::Ignored(event_type) => {
                        debug!(event_type = %event_type, "ignoring stream event");
                    }
                }
            }

            if self.finished {
                return Ok(None);
            }

            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    let text = self.decode(&chunk)?;
                    self.pending.extend(self.parser.feed(&text));
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Err(QxError::Network(format!(
                        "OpenAI stream interrupted: {err}"
                    )));
                }
                None => {
                    self.finished = true;
                    self.pending.extend(self.parser.feed("\n\n"));
                    if self.pending.is_empty() {
                        debug!("stream closed without completion event");
                    }
                }
            }
        }
    }

    /// Drains the stream into one string.
    pub async fn collect_text(mut self) -> Result<String, QxError> {
        let mut text = String::new();
        while let Some(chunk) = self.next_chunk().await? {
            text.push_str(&chunk);
        }
        Ok(text)
    }

    /// Decodes as much UTF-8 as is complete, carrying a split code point over.
    fn decode(&mut self, chunk: &[u8]) -> Result<String, QxError> {
        self.utf8_carry.extend_from_slice(chunk);
        match std::str::from_utf8(&self.utf8_carry) {
            Ok(text) => {
                let text = text.to_string();
                self.utf8_carry.clear();
                Ok(text)
            }
            Err(err) if err.error_len().is_none() => {
                let valid = err.valid_up_to();
                let tail = self.utf8_carry.split_off(valid);
                let text = String::from_utf8_lossy(&self.utf8_carry).into_owned();
                self.utf8_carry = tail;
                Ok(text)
            }
            Err(err) => Err(QxError::InvalidResponse(format!(
                "stream contained invalid UTF-8: {err}"
            ))),
        }
    }
}
