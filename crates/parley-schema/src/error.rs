//! Client error taxonomy.
//!
//! Every failure the dispatcher or stream assembler can produce is one of
//! these variants. Retryability drives the backoff loop; `user_message`
//! is what the UI layer renders.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone)]
pub enum ClientError {
    /// Required credentials are missing; callers check `is_configured()`
    /// before use, so hitting this means they did not.
    #[error("integration not configured: {0}")]
    NotConfigured(String),

    /// 401. Never retried; the user must reauthenticate.
    #[error("unauthorized")]
    Unauthorized,

    /// 429. Retryable with backoff.
    #[error("rate limited")]
    RateLimited,

    /// 5xx. Retryable with backoff.
    #[error("server error ({0})")]
    Server(u16),

    /// Any other 4xx. Fatal, surfaced as-is.
    #[error("request rejected ({status}): {message}")]
    Client { status: u16, message: String },

    /// Offline at dispatch time; the request was parked on the offline
    /// queue and the caller is told immediately rather than blocked.
    #[error("offline, request {id} queued for replay")]
    Queued { id: Uuid },

    /// Adaptive timeout fired. Treated as transient.
    #[error("request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Connection-level failure (connect refused, reset, DNS).
    #[error("transport error: {0}")]
    Transport(String),

    /// Streaming body failed mid-flight.
    #[error("stream error: {0}")]
    Stream(String),

    /// A request with this id is already outstanding.
    #[error("request {id} already in flight")]
    InFlight { id: Uuid },
}

impl ClientError {
    /// Map a non-2xx status to its class. 401 is fatal, 429/5xx transient,
    /// everything else in the 4xx range is a caller bug.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 => Self::Unauthorized,
            429 => Self::RateLimited,
            500..=599 => Self::Server(status),
            _ => Self::Client {
                status,
                message: message.into(),
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Server(_) | Self::Timeout { .. } | Self::Transport(_)
        )
    }

    /// User-visible failure string for the conversation error field.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Queued { .. } => "message queued, will send when back online",
            Self::RateLimited => "rate limited, try again shortly",
            Self::Unauthorized | Self::NotConfigured(_) => "unauthorized — check configuration",
            _ => "failed to send, try again",
        }
    }
}
