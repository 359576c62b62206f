//! Single-shot reply consumption

use tracing::{debug, warn};

use crate::ai::ChatReply;
use crate::error::TransportError;
use crate::indicator::ComposingIndicator;
use crate::state::{Message, Participant};
use crate::store::MessageStore;

/// Closing marker of a reasoning segment
pub const THINK_END: &str = "</think>";

/// Drop everything up to and including the closing reasoning marker.
/// Content without the marker is returned unchanged.
pub fn strip_thinking(content: &str) -> &str {
    match content.find(THINK_END) {
        Some(pos) => {
            debug!("Stripped {} bytes of reasoning", pos + THINK_END.len());
            &content[pos + THINK_END.len()..]
        }
        None => content,
    }
}

/// Record the outcome of a non-streamed turn and end it.
pub fn consume_reply(
    result: Result<ChatReply, TransportError>,
    store: &mut MessageStore,
    indicator: &mut ComposingIndicator,
) {
    match result {
        Ok(reply) => {
            let text = strip_thinking(&reply.content);
            store.append(Message::at(Participant::Assistant, text, reply.created_at));
        }
        Err(e) => {
            warn!("Chat request failed: {}", e);
            store.append(Message::new(Participant::Server, e.to_string()));
        }
    }
    indicator.clear();
}
