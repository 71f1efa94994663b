pub mod error;

pub use error::ClientError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// A single turn in a conversation. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
    /// Local path/URL of synthesized audio for this turn, if any.
    #[serde(default)]
    pub audio_url: Option<String>,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            at: Utc::now(),
            audio_url: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Wire-shape message for the upstream proxy call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl From<&ConversationMessage> for WireMessage {
    fn from(msg: &ConversationMessage) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

/// Named practice scenario. Selects system prompt and generation defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PracticeMode {
    InterviewPractice,
    DebateChallenge,
    PresentationPractice,
    LanguagePractice,
    General,
}

impl PracticeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InterviewPractice => "interview-practice",
            Self::DebateChallenge => "debate-challenge",
            Self::PresentationPractice => "presentation-practice",
            Self::LanguagePractice => "language-practice",
            Self::General => "general",
        }
    }

    /// Unknown mode tags fall back to the general coach.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "interview-practice" => Self::InterviewPractice,
            "debate-challenge" => Self::DebateChallenge,
            "presentation-practice" => Self::PresentationPractice,
            "language-practice" => Self::LanguagePractice,
            _ => Self::General,
        }
    }
}

impl Default for PracticeMode {
    fn default() -> Self {
        Self::General
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Wifi,
    Cellular,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkSpeed {
    Fast,
    Medium,
    Slow,
}

impl LinkSpeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
        }
    }
}

/// Current link state, recomputed on every connectivity change event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkQuality {
    pub link: LinkType,
    pub speed: LinkSpeed,
    pub online: bool,
}

impl NetworkQuality {
    /// Permanently-online profile used where no OS monitor exists (web).
    pub fn always_online() -> Self {
        Self {
            link: LinkType::Unknown,
            speed: LinkSpeed::Fast,
            online: true,
        }
    }

    /// Scale factor the dispatcher applies to its base timeout.
    pub fn timeout_multiplier(&self) -> f64 {
        match self.speed {
            LinkSpeed::Fast => 1.0,
            LinkSpeed::Medium => 1.5,
            LinkSpeed::Slow => 2.0,
        }
    }
}

impl Default for NetworkQuality {
    fn default() -> Self {
        Self::always_online()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Per-call dispatch knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOptions {
    pub timeout_ms: u64,
    pub retries: u32,
    pub use_cache: bool,
    pub priority: Priority,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            retries: 3,
            use_cache: true,
            priority: Priority::Normal,
        }
    }
}

/// A request parked while offline, replayed when connectivity returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: Uuid,
    pub endpoint: String,
    pub payload: serde_json::Value,
    pub options: DispatchOptions,
    pub at: DateTime<Utc>,
    pub retry_count: u32,
}

impl QueuedRequest {
    pub fn new(id: Uuid, endpoint: impl Into<String>, payload: serde_json::Value, options: DispatchOptions) -> Self {
        Self {
            id,
            endpoint: endpoint.into(),
            payload,
            options,
            at: Utc::now(),
            retry_count: 0,
        }
    }
}

/// Snapshot handed to the streaming callback after every delta and once on
/// completion. `content` is the full accumulated text so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingUpdate {
    pub content: String,
    pub is_complete: bool,
    pub error: Option<String>,
}

/// One line of the local diagnostics ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub session_id: Uuid,
    pub mode: PracticeMode,
    pub message_count: usize,
    pub response_time_ms: u64,
    pub at: DateTime<Utc>,
    pub speed: LinkSpeed,
    pub platform: String,
}
