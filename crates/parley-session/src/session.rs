//! Drives one exchange at a time through the client: build the wire list,
//! dispatch (plain or streaming), fold the reply back into the context,
//! and log the exchange.

use std::time::Instant;

use parley_client::{ChatPayload, ClaudeProxyAdapter, CoachClient};
use parley_schema::{
    ConversationMessage, DispatchOptions, StreamingUpdate, UsageRecord, WireMessage,
};
use uuid::Uuid;

use crate::context::{ConversationContext, DeviceProfile, ExchangeState};
use crate::prompts;

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Token usage as reported in a non-streaming proxy response, zero when
/// the field is absent.
fn response_tokens(value: &serde_json::Value) -> u64 {
    let usage = match value.get("usage") {
        Some(usage) => usage,
        None => return 0,
    };
    ["input_tokens", "output_tokens"]
        .iter()
        .filter_map(|k| usage.get(k).and_then(|v| v.as_u64()))
        .sum()
}

pub struct SessionManager {
    client: CoachClient,
    device: DeviceProfile,
    model: String,
}

impl SessionManager {
    pub fn new(client: CoachClient, device: DeviceProfile) -> Self {
        Self {
            client,
            device,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn client(&self) -> &CoachClient {
        &self.client
    }

    fn build_payload(&self, context: &ConversationContext, stream: bool) -> ChatPayload {
        let mode_profile = prompts::profile(context.mode.clone());
        let (system, messages) = crate::context::prepare_messages(context, self.device);
        ChatPayload {
            model: self.model.clone(),
            max_tokens: mode_profile.max_tokens,
            messages,
            temperature: mode_profile.temperature,
            stream,
            system: Some(system),
        }
    }

    fn record_usage(&self, context: &ConversationContext, started: Instant) {
        self.client.usage.record(UsageRecord {
            session_id: context.session_id,
            mode: context.mode.clone(),
            message_count: context.message_count(),
            response_time_ms: started.elapsed().as_millis() as u64,
            at: chrono::Utc::now(),
            speed: self.client.monitor.current().speed,
            platform: self.device.as_str().to_string(),
        });
    }

    /// One request/response exchange. Appends the user turn, dispatches,
    /// and appends the assistant turn on success. Failures land in
    /// `context.error` as display text; the returned state says which way
    /// it went.
    pub async fn send_message(
        &self,
        context: &mut ConversationContext,
        text: &str,
    ) -> ExchangeState {
        context.error = None;
        context.state = ExchangeState::Sending;
        if !text.trim().is_empty() {
            context.push(ConversationMessage::user(text));
        }

        let payload = self.build_payload(context, false);
        let payload = match serde_json::to_value(&payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("chat payload failed to serialize: {e}");
                context.error = Some("failed to send, try again".to_string());
                context.state = ExchangeState::Failed;
                return context.state;
            }
        };

        let started = Instant::now();
        let result = self
            .client
            .dispatcher
            .dispatch(
                self.client.chat.as_ref(),
                Uuid::new_v4(),
                payload,
                DispatchOptions::default(),
            )
            .await;

        match result {
            Ok(value) => {
                let reply = ClaudeProxyAdapter::response_text(&value).unwrap_or_default();
                context.total_tokens += response_tokens(&value);
                context.push(ConversationMessage::assistant(reply));
                context.state = ExchangeState::Complete;
                self.record_usage(context, started);
            }
            Err(err) => {
                tracing::warn!(session = %context.session_id, "exchange failed: {err}");
                context.error = Some(err.user_message().to_string());
                context.state = ExchangeState::Failed;
            }
        }
        context.state
    }

    /// Streaming variant. `on_update` sees every accumulated snapshot; the
    /// context is updated with the final text (or error) once the stream
    /// ends.
    pub async fn send_message_streaming(
        &self,
        context: &mut ConversationContext,
        text: &str,
        mut on_update: impl FnMut(StreamingUpdate),
    ) -> ExchangeState {
        context.error = None;
        context.state = ExchangeState::Sending;
        if !text.trim().is_empty() {
            context.push(ConversationMessage::user(text));
        }

        let payload = self.build_payload(context, true);
        let payload = match serde_json::to_value(&payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("chat payload failed to serialize: {e}");
                context.error = Some("failed to send, try again".to_string());
                context.state = ExchangeState::Failed;
                return context.state;
            }
        };

        let started = Instant::now();
        let mut last = StreamingUpdate {
            content: String::new(),
            is_complete: false,
            error: None,
        };
        let mut streaming = false;
        let state = &mut context.state;
        self.client
            .dispatcher
            .stream(
                self.client.chat.as_ref(),
                Uuid::new_v4(),
                payload,
                |update| {
                    streaming = true;
                    *state = ExchangeState::Streaming;
                    last = update.clone();
                    on_update(update);
                },
            )
            .await;

        if !streaming || last.error.is_some() {
            context.error = Some(
                last.error
                    .unwrap_or_else(|| "failed to send, try again".to_string()),
            );
            context.state = ExchangeState::Failed;
            return context.state;
        }

        context.push(ConversationMessage::assistant(last.content));
        context.state = ExchangeState::Complete;
        self.record_usage(context, started);
        context.state
    }

    /// Wire list the next exchange would send, for inspection.
    pub fn preview(&self, context: &ConversationContext) -> (String, Vec<WireMessage>) {
        crate::context::prepare_messages(context, self.device)
    }
}
