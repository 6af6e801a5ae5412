//! Server-sent-event parsing for streaming chat completions.
//!
//! The response body is newline-delimited. Data records look like
//! `data: {"choices":[{"delta":{"content":"Hi"}}]}` and the body ends with
//! `data: [DONE]`. Network reads may split a record anywhere, including in
//! the middle of a multi-byte character, so raw bytes are buffered and only
//! complete lines are decoded.

use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use parley_types::llm::{LlmError, StreamItem, StreamRecord};

use super::request_error;
use super::types::StreamChunk;

/// Field name of data records.
const DATA_FIELD: &str = "data:";

/// Payload of the terminal record.
const DONE_SENTINEL: &str = "[DONE]";

/// Longest payload excerpt quoted in a malformed-record report.
const EXCERPT_CHARS: usize = 120;

/// Incremental line splitter over raw response bytes.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return the records of every line they complete.
    ///
    /// Blank lines, comments, and non-data fields produce no record.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamRecord> {
        self.buffer.extend_from_slice(bytes);

        let mut records = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|b| *b == b'\n') {
            let line = &self.buffer[consumed..consumed + offset];
            if let Some(record) = decode_line(line) {
                records.push(record);
            }
            consumed += offset + 1;
        }
        self.buffer.drain(..consumed);
        records
    }

    /// Decode a trailing line that was never newline-terminated.
    pub fn finish(&mut self) -> Option<StreamRecord> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line)
    }

    /// Bytes held back waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(line: &[u8]) -> Option<StreamRecord> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    match std::str::from_utf8(line) {
        Ok(text) => parse_record(text),
        Err(e) => Some(StreamRecord::Malformed(format!("invalid UTF-8 in record: {e}"))),
    }
}

/// Classify one complete line of the response body.
pub fn parse_record(line: &str) -> Option<StreamRecord> {
    if line.trim().is_empty() || line.starts_with(':') {
        return None;
    }

    let Some(payload) = line.strip_prefix(DATA_FIELD) else {
        debug!(line = %excerpt(line), "ignoring non-data stream line");
        return None;
    };
    let payload = payload.trim();

    if payload == DONE_SENTINEL {
        return Some(StreamRecord::StreamEnd);
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => Some(StreamRecord::DataFragment(chunk.into_text())),
        Err(e) => Some(StreamRecord::Malformed(format!("{e} in `{}`", excerpt(payload)))),
    }
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(EXCERPT_CHARS).collect();
    format!("{cut}...")
}

/// Send the request lazily and turn the response body into stream items.
///
/// Nothing is sent until the returned stream is first polled.
pub fn completion_stream(request: reqwest::RequestBuilder) -> impl Stream<Item = StreamItem> + Send + 'static {
    async_stream::stream! {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                yield StreamItem::Error(LlmError::Stream(format!("HTTP request failed: {e}")));
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %excerpt(&body), "completion stream error response");
            yield StreamItem::Error(request_error(status.as_u16(), &body));
            return;
        }

        let mut body = response.bytes_stream();
        let mut decoder = LineDecoder::new();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield StreamItem::Error(LlmError::Stream(format!("response body read: {e}")));
                    return;
                }
            };

            for record in decoder.push(&chunk) {
                match record {
                    StreamRecord::DataFragment(text) => {
                        if !text.is_empty() {
                            yield StreamItem::Fragment(text);
                        }
                    }
                    StreamRecord::StreamEnd => {
                        yield StreamItem::Complete;
                        return;
                    }
                    StreamRecord::Malformed(reason) => {
                        let error = LlmError::Decode(reason);
                        warn!(error = %error, "skipping malformed stream record");
                    }
                }
            }
        }

        match decoder.finish() {
            Some(StreamRecord::DataFragment(text)) if !text.is_empty() => {
                yield StreamItem::Fragment(text);
            }
            Some(StreamRecord::Malformed(reason)) => {
                let error = LlmError::Decode(reason);
                warn!(error = %error, "skipping malformed trailing record");
            }
            _ => {}
        }
        debug!("stream body ended without sentinel");
        yield StreamItem::Complete;
    }
}
