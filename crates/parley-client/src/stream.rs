//! Streaming response assembly.
//!
//! The assembler consumes parsed SSE chunks, keeps the running text, and
//! hands the caller the full accumulated content after every delta plus
//! exactly one completion callback. Nothing on this path returns an error
//! to the caller directly; failures arrive inside the final update.

use futures_core::Stream;
use parley_schema::{ClientError, DispatchOptions, QueuedRequest, StreamingUpdate};
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::dispatch::Dispatcher;
use crate::sse::{parse_sse_stream, StreamChunk};
use crate::EndpointAdapter;

/// Drive `on_update` from a chunk stream. Emits `is_complete=false` with
/// the accumulated text after every delta and exactly one final update,
/// carrying the error when the stream failed mid-flight.
pub async fn assemble<S, F>(stream: S, mut on_update: F)
where
    S: Stream<Item = Result<StreamChunk, ClientError>>,
    F: FnMut(StreamingUpdate),
{
    tokio::pin!(stream);
    let mut content = String::new();

    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) if chunk.is_final => break,
            Ok(chunk) => {
                if chunk.delta.is_empty() {
                    continue;
                }
                content.push_str(&chunk.delta);
                on_update(StreamingUpdate {
                    content: content.clone(),
                    is_complete: false,
                    error: None,
                });
            }
            Err(err) => {
                tracing::warn!("stream failed mid-flight: {err}");
                on_update(StreamingUpdate {
                    content,
                    is_complete: true,
                    error: Some(err.user_message().to_string()),
                });
                return;
            }
        }
    }

    on_update(StreamingUpdate {
        content,
        is_complete: true,
        error: None,
    });
}

/// Terminal update for failures before or during stream setup. `error`
/// carries the user-facing string; the technical detail goes to the log.
fn failed(error: ClientError) -> StreamingUpdate {
    tracing::warn!("stream not opened: {error}");
    StreamingUpdate {
        content: String::new(),
        is_complete: true,
        error: Some(error.user_message().to_string()),
    }
}

impl Dispatcher {
    /// Open a streaming exchange. Never fails synchronously; configuration,
    /// connectivity, and HTTP errors all arrive through the final
    /// `on_update`. Once opened, the reader runs to natural completion;
    /// there is no mid-flight cancellation.
    pub async fn stream(
        &self,
        adapter: &dyn EndpointAdapter,
        request_id: Uuid,
        payload: serde_json::Value,
        mut on_update: impl FnMut(StreamingUpdate),
    ) {
        if !adapter.is_configured() {
            on_update(failed(ClientError::NotConfigured(
                adapter.name().to_string(),
            )));
            return;
        }
        if !self.monitor().is_online() {
            // Parked for non-streaming replay once connectivity returns.
            self.queue()
                .enqueue(QueuedRequest::new(
                    request_id,
                    adapter.endpoint(),
                    payload,
                    DispatchOptions::default(),
                ))
                .await;
            on_update(failed(ClientError::Queued { id: request_id }));
            return;
        }

        tracing::debug!(endpoint = adapter.name(), %request_id, "opening stream");
        let resp = match adapter
            .apply_auth(self.http().post(adapter.endpoint()))
            .json(&payload)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                on_update(failed(ClientError::Transport(e.to_string())));
                return;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            on_update(failed(ClientError::from_status(status.as_u16(), body)));
            return;
        }

        assemble(parse_sse_stream(resp.bytes_stream()), on_update).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(delta: &str) -> Result<StreamChunk, ClientError> {
        Ok(StreamChunk {
            delta: delta.to_string(),
            is_final: false,
        })
    }

    #[tokio::test]
    async fn assembly_accumulates_and_completes() {
        let chunks = tokio_stream::iter(vec![chunk("Hel"), chunk("lo")]);
        let mut updates = Vec::new();
        assemble(chunks, |u| updates.push(u)).await;

        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].content, "Hel");
        assert!(!updates[0].is_complete);
        assert_eq!(updates[1].content, "Hello");
        assert!(!updates[1].is_complete);
        assert_eq!(updates[2].content, "Hello");
        assert!(updates[2].is_complete);
        assert!(updates[2].error.is_none());
    }

    #[tokio::test]
    async fn final_chunk_ends_assembly() {
        let chunks = tokio_stream::iter(vec![
            chunk("done"),
            Ok(StreamChunk {
                delta: String::new(),
                is_final: true,
            }),
            chunk("never seen"),
        ]);
        let mut updates = Vec::new();
        assemble(chunks, |u| updates.push(u)).await;

        let last = updates.last().unwrap();
        assert!(last.is_complete);
        assert_eq!(last.content, "done");
    }

    #[tokio::test]
    async fn transport_error_arrives_in_final_update() {
        let chunks = tokio_stream::iter(vec![
            chunk("partial"),
            Err(ClientError::Stream("connection reset".into())),
        ]);
        let mut updates = Vec::new();
        assemble(chunks, |u| updates.push(u)).await;

        assert_eq!(updates.len(), 2);
        let last = updates.last().unwrap();
        assert!(last.is_complete);
        assert_eq!(last.content, "partial");
        // User-facing string, not the transport detail.
        assert_eq!(last.error.as_deref(), Some("failed to send, try again"));
    }

    #[tokio::test]
    async fn empty_stream_completes_once() {
        let chunks = tokio_stream::iter(Vec::<Result<StreamChunk, ClientError>>::new());
        let mut updates = Vec::new();
        assemble(chunks, |u| updates.push(u)).await;

        assert_eq!(updates.len(), 1);
        assert!(updates[0].is_complete);
        assert!(updates[0].content.is_empty());
    }
}
