//! Raw line-stream decoding for providers without SSE framing.
//!
//! The body is buffered as bytes and split on `\n`, so a line (or a UTF-8
//! sequence) broken across network chunks is reassembled before it is
//! yielded. Blank lines are skipped. A line longer than [`MAX_LINE_BYTES`]
//! ends the stream with an error.

use async_stream::try_stream;
use bytes::Bytes;
use futures::Stream;
use futures_util::StreamExt;
use gateway_core::{GatewayError, GatewayResult, NativeStream, ProviderId};
use std::fmt::Display;

/// Longest line accepted before the stream is abandoned
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Split a byte stream into trimmed, non-empty text lines.
///
/// A transport error, invalid UTF-8 or an oversized line ends the stream
/// with a [`GatewayError::Stream`].
pub fn line_stream<S, E>(provider: ProviderId, body: S) -> NativeStream<String>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let stream = try_stream! {
        let mut body = Box::pin(body);
        let mut buffer: Vec<u8> = Vec::new();
        // Bytes of `buffer` already known to contain no newline
        let mut scanned = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                GatewayError::stream(provider, format!("Failed to read response body: {e}"))
            })?;
            buffer.extend_from_slice(&chunk);

            while let Some(offset) = buffer[scanned..].iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=scanned + offset).collect();
                scanned = 0;
                if let Some(line) = decode_line(provider, &raw)? {
                    yield line;
                }
            }
            scanned = buffer.len();

            if buffer.len() > MAX_LINE_BYTES {
                Err::<(), _>(GatewayError::stream(
                    provider,
                    format!("Stream line exceeds {MAX_LINE_BYTES} bytes"),
                ))?;
            }
        }

        // Final line without a trailing newline
        if let Some(line) = decode_line(provider, &buffer)? {
            yield line;
        }
    };

    Box::pin(stream)
}

fn decode_line(provider: ProviderId, raw: &[u8]) -> GatewayResult<Option<String>> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| GatewayError::stream(provider, format!("Invalid UTF-8 in stream: {e}")))?;
    let line = text.trim();
    Ok((!line.is_empty()).then(|| line.to_string()))
}
