//! Conversation session layer: mode profiles, rolling context with
//! device-aware truncation, and the exchange state machine on top of the
//! dispatching client.

pub mod context;
pub mod prompts;
pub mod session;

pub use context::{prepare_messages, ConversationContext, DeviceProfile, ExchangeState};
pub use prompts::{profile, ModeProfile};
pub use session::{SessionManager, DEFAULT_MODEL};
