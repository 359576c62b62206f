pub mod ai;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod indicator;
pub mod session;
pub mod single;
pub mod state;
pub mod store;
pub mod stream;
pub mod update;

// Re-export main types for convenience
pub use ai::{ChatBackend, ChatReply, ChatRequest, FragmentStream, OllamaClient, DEFAULT_MODEL};
pub use controller::{BackendEvent, ChatController, TurnEvent};
pub use dispatch::{ChatSettings, SYSTEM_PREAMBLE};
pub use error::{ChatError, TransportError};
pub use session::ConversationSession;
pub use state::{ChatEntry, ChatRole, Message, Participant};
pub use stream::{StreamState, SERVICE_UNAVAILABLE};
pub use update::{ChatUpdate, SessionStatus};
