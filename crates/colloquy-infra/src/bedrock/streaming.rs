//! AWS Bedrock event stream parser and chunk stream adapter.
//!
//! Bedrock streaming uses the AWS event stream binary protocol (not SSE).
//! Each frame has the layout:
//!
//! ```text
//! [total_len:4][headers_len:4][prelude_crc:4][headers...][payload...][msg_crc:4]
//! ```
//!
//! For `chunk` frames the payload is `{"bytes":"<base64>"}` where the
//! base64-decoded content is a provider JSON event (e.g.
//! `{"type":"content_block_delta","delta":{"type":"text_delta","text":"Hi"}}`).
//! Text deltas are forwarded immediately as incremental chunks; the closing
//! event becomes one terminal chunk carrying the usage totals. Frame and
//! event types this parser does not recognize are skipped, never fatal.
//!
//! This is a minimal parser that extracts events without pulling in the
//! full AWS SDK.

use base64::Engine;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};

use colloquy_core::adapter::contract::ChunkStream;
use colloquy_types::adapter::{AdapterChunk, AdapterError, Usage};

use super::claude::{
    ContentBlockDeltaPayload, ErrorPayload, MessageDeltaPayload, MessageStartPayload,
    StreamEnvelope,
};

/// Parsed header from a binary event stream frame.
#[derive(Debug)]
struct EventHeader {
    name: String,
    value: String,
}

/// Parse binary headers from an AWS event stream frame.
///
/// Header format: `[name_len:1][name:N][type:1][value_len:2][value:M]`.
/// Only type 7 (string) is handled, which is what Bedrock sends.
fn parse_headers(mut buf: &[u8]) -> Vec<EventHeader> {
    let mut headers = Vec::new();
    while !buf.is_empty() {
        let name_len = buf[0] as usize;
        buf = &buf[1..];
        if buf.len() < name_len {
            break;
        }
        let name = String::from_utf8_lossy(&buf[..name_len]).to_string();
        buf = &buf[name_len..];

        if buf.is_empty() {
            break;
        }
        let header_type = buf[0];
        buf = &buf[1..];

        if header_type == 7 {
            // String type: [value_len:2][value:M]
            if buf.len() < 2 {
                break;
            }
            let value_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
            buf = &buf[2..];
            if buf.len() < value_len {
                break;
            }
            let value = String::from_utf8_lossy(&buf[..value_len]).to_string();
            buf = &buf[value_len..];
            headers.push(EventHeader { name, value });
        } else {
            // Unknown header types carry no length we can trust; bail.
            break;
        }
    }
    headers
}

/// Parse one binary event stream frame from the buffer.
///
/// Returns `Some((event_type, payload_bytes, bytes_consumed))` on success,
/// or `None` if the buffer doesn't contain a complete frame yet.
fn parse_frame(buf: &[u8]) -> Option<(String, Vec<u8>, usize)> {
    if buf.len() < 12 {
        return None; // Need at least the prelude
    }

    let total_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let headers_len = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
    // bytes 8..12 = prelude CRC (skip)

    if buf.len() < total_len {
        return None; // Incomplete frame
    }

    let headers_start = 12;
    let headers_end = headers_start + headers_len;
    let payload_end = total_len.checked_sub(4)?; // last 4 bytes = message CRC

    if headers_end > payload_end || payload_end > buf.len() {
        return None;
    }

    let headers = parse_headers(&buf[headers_start..headers_end]);
    let payload = buf[headers_end..payload_end].to_vec();

    let event_type = headers
        .iter()
        .find(|h| h.name == ":event-type" || h.name == ":exception-type")
        .map(|h| h.value.clone())
        .unwrap_or_default();

    Some((event_type, payload, total_len))
}

/// Running usage totals across the streamed events.
#[derive(Default)]
struct UsageTally {
    usage: Usage,
    reported: bool,
}

impl UsageTally {
    fn record_input(&mut self, tokens: u32) {
        if tokens > 0 {
            self.usage.input_tokens = tokens;
            self.reported = true;
        }
    }

    fn record_output(&mut self, tokens: u32) {
        if tokens > 0 {
            self.usage.output_tokens = tokens;
            self.reported = true;
        }
    }

    fn total(&self) -> Option<Usage> {
        self.reported.then_some(self.usage)
    }
}

/// Decode one inner provider event into at most one chunk.
///
/// `message_start` and `message_delta` feed the usage tally; text deltas
/// become incremental chunks; `message_stop` closes the stream with the
/// terminal chunk. Unrecognized event types are skipped for forward
/// compatibility.
fn decode_event(
    event_type: &str,
    json_data: &str,
    tally: &mut UsageTally,
) -> Result<Option<AdapterChunk>, AdapterError> {
    match event_type {
        "message_start" => {
            let payload: MessageStartPayload = serde_json::from_str(json_data)
                .map_err(|e| AdapterError::Deserialization(format!("message_start: {e}")))?;
            tally.record_input(payload.message.usage.input_tokens);
            tally.record_output(payload.message.usage.output_tokens);
            Ok(None)
        }

        "content_block_delta" => {
            let payload: ContentBlockDeltaPayload = serde_json::from_str(json_data)
                .map_err(|e| AdapterError::Deserialization(format!("content_block_delta: {e}")))?;
            if payload.delta.kind == "text_delta" && !payload.delta.text.is_empty() {
                Ok(Some(AdapterChunk::delta(payload.delta.text)))
            } else {
                Ok(None)
            }
        }

        "message_delta" => {
            let payload: MessageDeltaPayload = serde_json::from_str(json_data)
                .map_err(|e| AdapterError::Deserialization(format!("message_delta: {e}")))?;
            tally.record_input(payload.usage.input_tokens);
            tally.record_output(payload.usage.output_tokens);
            Ok(None)
        }

        "message_stop" => Ok(Some(AdapterChunk::terminal(tally.total()))),

        "ping" | "content_block_start" | "content_block_stop" => Ok(None),

        "error" => {
            let payload: ErrorPayload = serde_json::from_str(json_data)
                .map_err(|e| AdapterError::Deserialization(format!("error event: {e}")))?;
            Err(AdapterError::Stream(format!(
                "{}: {}",
                payload.error.kind, payload.error.message
            )))
        }

        unknown => {
            tracing::debug!(event_type = unknown, "unrecognized stream event, skipping");
            Ok(None)
        }
    }
}

/// Open a streaming connection to the Bedrock Runtime API.
///
/// Sends the HTTP request, checks the response status, then reads the
/// binary event stream body, base64-decoding each `chunk` frame into the
/// inner provider event. The returned stream ends after the terminal chunk
/// or an error; dropping it mid-flight drops the HTTP response and stops
/// frame consumption.
pub fn open_stream(
    client: &reqwest::Client,
    url: &str,
    body: serde_json::Value,
    api_key: &SecretString,
) -> ChunkStream {
    let client = client.clone();
    let url = url.to_string();
    let bearer = api_key.expose_secret().to_string();

    Box::pin(async_stream::try_stream! {
        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {bearer}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Upstream {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        let response = if status.is_success() {
            response
        } else {
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %error_body, "Bedrock stream API error response");
            Err(AdapterError::Upstream {
                message: format!("HTTP {status}: {error_body}"),
            })?;
            unreachable!()
        };

        let mut byte_stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut tally = UsageTally::default();

        'outer: while let Some(bytes) = byte_stream.next().await {
            let bytes = bytes.map_err(|e| AdapterError::Stream(format!("response body read: {e}")))?;
            buffer.extend_from_slice(&bytes);

            // Drain as many complete frames as the buffer holds.
            while let Some((event_type, payload, consumed)) = parse_frame(&buffer) {
                buffer.drain(..consumed);

                if event_type != "chunk" {
                    if !event_type.is_empty() {
                        tracing::debug!(event_type = %event_type, "non-chunk frame, skipping");
                    }
                    continue;
                }

                let envelope: StreamEnvelope = serde_json::from_slice(&payload)
                    .map_err(|e| AdapterError::Deserialization(format!("chunk envelope: {e}")))?;
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(&envelope.bytes)
                    .map_err(|e| AdapterError::Deserialization(format!("base64 decode: {e}")))?;
                let json_str = String::from_utf8(decoded)
                    .map_err(|e| AdapterError::Deserialization(format!("utf8 decode: {e}")))?;

                let event_json: serde_json::Value = serde_json::from_str(&json_str)
                    .map_err(|e| AdapterError::Deserialization(format!("inner json: {e}")))?;
                let inner_type = event_json
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string();

                if let Some(chunk) = decode_event(&inner_type, &json_str, &mut tally)? {
                    let complete = chunk.is_complete;
                    yield chunk;
                    if complete {
                        break 'outer;
                    }
                }
            }
        }
    })
}
