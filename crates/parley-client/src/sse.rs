//! Server-sent-event parsing for the streaming proxy path.
//!
//! Events are separated by blank lines; payload lines carry a `data: `
//! prefix. Text arrives as `content_block_delta` events with
//! `delta.text`. Malformed chunks are skipped without aborting the stream;
//! only transport-level failures end it early.

use futures_core::Stream;
use parley_schema::ClientError;
use tokio_stream::StreamExt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub delta: String,
    pub is_final: bool,
}

/// Extract the text delta from one SSE event payload, if it carries one.
fn parse_sse_event(event: &serde_json::Value) -> Option<StreamChunk> {
    match event.get("type")?.as_str()? {
        "content_block_delta" => {
            let text = event.get("delta")?.get("text")?.as_str()?.to_string();
            Some(StreamChunk {
                delta: text,
                is_final: false,
            })
        }
        "message_stop" => Some(StreamChunk {
            delta: String::new(),
            is_final: true,
        }),
        _ => None,
    }
}

/// Parse a chunked SSE body into text deltas.
pub fn parse_sse_stream(
    byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = Result<StreamChunk, ClientError>> + Send {
    async_stream::stream! {
        tokio::pin!(byte_stream);
        let mut buffer = String::new();

        while let Some(chunk_result) = byte_stream.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));

                    while let Some(pos) = buffer.find("\n\n") {
                        let event_text = buffer[..pos].to_string();
                        buffer = buffer[pos + 2..].to_string();

                        for line in event_text.lines() {
                            let Some(data) = line.strip_prefix("data: ") else {
                                continue;
                            };
                            if data == "[DONE]" {
                                continue;
                            }

                            match serde_json::from_str::<serde_json::Value>(data) {
                                Ok(event) => {
                                    if let Some(chunk) = parse_sse_event(&event) {
                                        yield Ok(chunk);
                                    }
                                }
                                Err(e) => {
                                    // Tolerant parsing: a malformed chunk is
                                    // dropped, the stream continues.
                                    tracing::debug!("skipping malformed sse chunk: {e}");
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(ClientError::Stream(e.to_string()));
                    return;
                }
            }
        }
    }
}
