//! The line-oriented data stream protocol spoken between the server and the chat page
//!
//! Every part is a single line `<type>:<json>\n`. We only produce and consume the
//! handful of part types a plain text chat needs; anything else is skipped on read.
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::ChatError;

/// Header announcing the protocol version on streaming responses
pub const STREAM_HEADER: &str = "x-vercel-ai-data-stream";
pub const STREAM_VERSION: &str = "v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishPart {
    pub finish_reason: String,
    #[serde(default)]
    pub usage: Option<Value>,
}

/// One decoded part of the response body
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    Text(String),
    Error(String),
    Finish(FinishPart),
}

// Protocol-specific message formatting
pub struct ProtocolFormatter;

impl ProtocolFormatter {
    pub fn format_text(text: &str) -> String {
        let encoded_text = serde_json::to_string(text).unwrap_or_else(|_| String::from("\"\""));
        format!("0:{}\n", encoded_text)
    }

    pub fn format_error(message: &str) -> String {
        // Errors start with "3:"
        let encoded = serde_json::to_string(message).unwrap_or_else(|_| String::from("\"\""));
        format!("3:{}\n", encoded)
    }

    pub fn format_finish(reason: &str) -> String {
        // Finish messages start with "d:"
        let finish = json!({
            "finishReason": reason,
            "usage": {
                "promptTokens": 0,
                "completionTokens": 0
            }
        });
        format!("d:{}\n", finish)
    }
}

/// Incremental decoder for a data stream body
///
/// Bytes can be pushed in whatever chunks the network delivers; a part is only
/// decoded once its terminating newline has arrived.
#[derive(Debug, Default)]
pub struct DataStreamDecoder {
    buffer: Vec<u8>,
}

impl DataStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every part completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<StreamPart>, ChatError> {
        self.buffer.extend_from_slice(chunk);

        let mut parts = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = std::str::from_utf8(&line[..newline_pos])
                .map_err(|e| ChatError::Decode(format!("invalid UTF-8: {}", e)))?;
            if let Some(part) = decode_line(line)? {
                parts.push(part);
            }
        }
        Ok(parts)
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Result<Option<StreamPart>, ChatError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let rest = std::mem::take(&mut self.buffer);
        let line = std::str::from_utf8(&rest)
            .map_err(|e| ChatError::Decode(format!("invalid UTF-8: {}", e)))?;
        decode_line(line)
    }
}

/// Decode one protocol line; blank lines and unknown part types yield `None`
pub fn decode_line(line: &str) -> Result<Option<StreamPart>, ChatError> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return Ok(None);
    }

    let (kind, payload) = line
        .split_once(':')
        .ok_or_else(|| ChatError::Decode(line.to_string()))?;

    let part = match kind {
        "0" => StreamPart::Text(parse_string(payload)?),
        "3" => StreamPart::Error(parse_string(payload)?),
        "d" => StreamPart::Finish(
            serde_json::from_str(payload).map_err(|e| ChatError::Decode(e.to_string()))?,
        ),
        other => {
            tracing::trace!("Skipping stream part of type {}", other);
            return Ok(None);
        }
    };
    Ok(Some(part))
}

fn parse_string(payload: &str) -> Result<String, ChatError> {
    serde_json::from_str::<String>(payload).map_err(|e| ChatError::Decode(e.to_string()))
}
