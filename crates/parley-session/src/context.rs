//! Per-session conversation state and message-list preparation.

use chrono::{DateTime, Utc};
use parley_schema::{ConversationMessage, PracticeMode, Role, WireMessage};
use uuid::Uuid;

use crate::prompts;

/// History ceiling when running in a browser.
const WEB_HISTORY_LIMIT: usize = 50;
/// History ceiling when no memory estimate is available on native.
const DEFAULT_HISTORY_LIMIT: usize = 30;

/// Where the app is running, for history sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProfile {
    Web,
    /// Native target with an approximate available-memory reading in MB,
    /// when the platform exposes one.
    Native { available_memory_mb: Option<u64> },
}

impl DeviceProfile {
    /// Most recent messages kept when building the wire list. Native
    /// scales with available memory, one message per 100 MB, clamped to
    /// [10, 50].
    pub fn history_limit(&self) -> usize {
        match self {
            Self::Web => WEB_HISTORY_LIMIT,
            Self::Native {
                available_memory_mb: Some(mb),
            } => ((mb / 100) as usize).clamp(10, 50),
            Self::Native {
                available_memory_mb: None,
            } => DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Native { .. } => "native",
        }
    }
}

/// Where an exchange currently stands. One machine per context; concurrent
/// sends on the same context are not de-duplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Sending,
    Streaming,
    Complete,
    Failed,
}

/// Rolling state for one practice session. Lives for the session only;
/// nothing here is persisted across restarts.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub session_id: Uuid,
    pub user_id: Option<String>,
    pub mode: PracticeMode,
    pub messages: Vec<ConversationMessage>,
    /// Interview background (resume analysis etc.) folded into the system
    /// prompt when present.
    pub analysis: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Running token total reported by the upstream, when it reports one.
    pub total_tokens: u64,
    pub state: ExchangeState,
    /// Last failure, already phrased for display. Cleared on the next send.
    pub error: Option<String>,
}

impl ConversationContext {
    pub fn new(mode: PracticeMode) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            user_id: None,
            mode,
            messages: Vec::new(),
            analysis: None,
            started_at: now,
            last_activity: now,
            total_tokens: 0,
            state: ExchangeState::Idle,
            error: None,
        }
    }

    pub fn with_analysis(mut self, analysis: serde_json::Value) -> Self {
        self.analysis = Some(analysis);
        self
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.last_activity = Utc::now();
        self.messages.push(message);
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// Build the out-of-band system prompt and the bounded wire message list.
///
/// System-role history entries are filtered out (the prompt travels once,
/// outside the list), empty turns are dropped, and the remainder is
/// truncated to the device's most recent N preserving order. Truncated
/// messages are dropped silently, with no summarization. An otherwise
/// empty interview session with analysis data yields a synthetic opener
/// rather than an empty list.
pub fn prepare_messages(
    context: &ConversationContext,
    device: DeviceProfile,
) -> (String, Vec<WireMessage>) {
    let mode_profile = prompts::profile(context.mode.clone());
    let mut system_prompt = mode_profile.system_prompt.to_string();
    if let Some(analysis) = &context.analysis {
        system_prompt.push_str("\n\nCandidate background:\n");
        system_prompt.push_str(&analysis.to_string());
    }

    let kept: Vec<&ConversationMessage> = context
        .messages
        .iter()
        .filter(|m| m.role != Role::System && !m.content.trim().is_empty())
        .collect();

    let limit = device.history_limit();
    let skip = kept.len().saturating_sub(limit);
    let mut wire: Vec<WireMessage> = kept[skip..].iter().map(|m| WireMessage::from(*m)).collect();

    if wire.is_empty() && context.analysis.is_some() {
        wire.push(WireMessage {
            role: Role::User.as_str().to_string(),
            content: "Please start the interview.".to_string(),
        });
    }

    (system_prompt, wire)
}
