pub mod cache;
pub mod key;
pub mod queue;
pub mod usage;

pub use cache::{chat_response_ttl, synth_audio_ttl, CacheEntry, ResponseCache};
pub use key::payload_key;
pub use queue::{DrainReport, OfflineQueue, ReplayOutcome, MAX_REPLAY_ATTEMPTS};
pub use usage::UsageLog;
