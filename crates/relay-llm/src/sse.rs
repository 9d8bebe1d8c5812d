//! # SSE Parser
//!
//! Server-Sent Events line parser for streaming chat completions:
//! - Line buffering across chunk boundaries
//! - `data: ` prefix extraction
//! - `[DONE]` marker filtering
//! - Trailing buffer processing when the body ends without a newline
//!
//! Transport errors are surfaced as stream items rather than ending the
//! stream quietly, so a truncated answer is never mistaken for a complete one.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

use crate::producer::{ProducerError, ProducerResult};

/// Parse SSE lines from a byte stream and yield the `data` payloads.
pub fn parse_sse_lines<S, E>(byte_stream: S) -> impl Stream<Item = ProducerResult<String>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Into<ProducerError> + Send + 'static,
{
    futures::stream::unfold(
        (byte_stream, BytesMut::with_capacity(8192), false),
        |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }

            loop {
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes = buffer.split_to(newline_pos + 1);
                    line_bytes.truncate(line_bytes.len() - 1);
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.truncate(line_bytes.len() - 1);
                    }

                    let Ok(line) = std::str::from_utf8(&line_bytes) else {
                        continue; // skip invalid UTF-8 lines
                    };

                    if let Some(data) = extract_sse_data(line) {
                        return Some((Ok(data), (stream, buffer, false)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => return Some((Err(e.into()), (stream, buffer, true))),
                    None => {
                        if buffer.is_empty() {
                            return None;
                        }
                        let data = std::str::from_utf8(&buffer)
                            .ok()
                            .and_then(|s| extract_sse_data(s.trim()));
                        buffer.clear();
                        return data.map(|d| (Ok(d), (stream, buffer, true)));
                    }
                }
            }
        },
    )
}

/// Extract the data payload from an SSE line.
///
/// Returns `None` for comments, empty lines, other fields, and `[DONE]`.
fn extract_sse_data(line: &str) -> Option<String> {
    let trimmed = line.trim();

    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    let data = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))?
        .trim();

    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    Some(data.to_string())
}
