//! Assistant backend seam
//!
//! The controller only sees [`ChatBackend`]; [`OllamaClient`] is the HTTP
//! implementation and tests substitute scripted ones.

pub mod ollama;
pub mod sse;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use serde::Serialize;

use crate::error::TransportError;
use crate::state::ChatEntry;

pub use ollama::OllamaClient;
pub use sse::SseDecoder;

/// Model every turn is sent to unless configured otherwise
pub const DEFAULT_MODEL: &str = "deepseek-r1:70b";

/// Incremental text fragments of a streamed reply, in arrival order
pub type FragmentStream = BoxStream<'static, Result<String, TransportError>>;

/// One outgoing turn, built fresh per send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub model: String,
    pub thread_id: i64,
    pub stream: bool,
    pub messages: Vec<ChatEntry>,
}

/// A complete non-streamed reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Allocate a conversation thread
    async fn create_thread(&self) -> Result<i64, TransportError>;

    /// Single-shot turn
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, TransportError>;

    /// Streamed turn. Resolves once the connection is open; the stream ends
    /// when the backend finishes and yields an error if the transport fails.
    async fn open_stream(&self, request: ChatRequest) -> Result<FragmentStream, TransportError>;
}
