pub mod adapters;
pub mod client;
pub mod dispatch;
pub mod sse;
pub mod stream;

pub use adapters::claude_proxy::{ChatPayload, ClaudeProxyAdapter, ProxyConfig};
pub use adapters::speech::{SpeechAdapter, SpeechConfig};
pub use adapters::EndpointAdapter;
pub use client::CoachClient;
pub use dispatch::{backoff_delay, Dispatcher};
pub use sse::{parse_sse_stream, StreamChunk};
pub use stream::assemble;
