use crate::error::{LlmError, Result};
use crate::types::Provider;
use bytes::Bytes;
use futures_util::Stream;
use futures_util::StreamExt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    /// `message` when the frame carried no `event:` line.
    pub event: String,
    pub data: String,
}

/// Splits a response body into server-sent-event frames.
///
/// Buffers raw bytes so multi-byte characters split across chunks decode intact. A trailing
/// frame without the blank-line terminator is still emitted when the body ends.
pub(crate) fn decode_sse<S>(
    provider: Provider,
    bytes_stream: S,
) -> impl Stream<Item = Result<SseEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    futures_util::stream::unfold(
        (bytes_stream, Vec::<u8>::new(), false),
        move |(mut stream, mut buffer, mut finished)| async move {
            loop {
                if let Some((idx, sep_len)) = find_frame_end(&buffer) {
                    let raw: Vec<u8> = buffer.drain(..idx + sep_len).collect();
                    if let Some(event) = parse_frame(&raw[..idx]) {
                        return Some((Ok(event), (stream, buffer, finished)));
                    }
                    continue;
                }

                if finished {
                    if buffer.is_empty() {
                        return None;
                    }
                    let raw = std::mem::take(&mut buffer);
                    return parse_frame(&raw).map(|event| (Ok(event), (stream, buffer, finished)));
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        finished = true;
                        buffer.clear();
                        return Some((
                            Err(LlmError::transport(provider, e)),
                            (stream, buffer, finished),
                        ));
                    }
                    None => finished = true,
                }
            }
        },
    )
}

fn find_frame_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_frame(raw: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(raw);
    let mut event = String::new();
    let mut data_lines = Vec::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("event:") {
            event = rest.trim_start().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
    }

    if event.is_empty() && data_lines.is_empty() {
        return None;
    }
    if event.is_empty() {
        event = "message".to_string();
    }
    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}
