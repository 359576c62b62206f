//! Outgoing turn framing

use crate::ai::{ChatRequest, DEFAULT_MODEL};
use crate::error::ChatError;
use crate::state::ChatEntry;

/// Instruction injected ahead of the very first user turn
pub const SYSTEM_PREAMBLE: &str = "You are a helpful, respectful and honest assistant.";

/// Transcript length right after the first user turn is appended:
/// the greeting plus that turn.
const FIRST_TURN_LEN: usize = 2;

/// How turns are sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub model: String,
    pub stream: bool,
    pub system_prompt: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            stream: true,
            system_prompt: SYSTEM_PREAMBLE.to_string(),
        }
    }
}

/// Reject text with nothing to send.
pub fn validate(text: &str) -> Result<(), ChatError> {
    if text.trim().is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    Ok(())
}

/// Build the request for a user turn.
///
/// `transcript_len` is the number of messages in the store after the user
/// turn was appended; the system preamble goes out only when it is the first.
pub fn build_request(
    settings: &ChatSettings,
    thread_id: i64,
    text: &str,
    transcript_len: usize,
) -> ChatRequest {
    let mut messages = Vec::with_capacity(2);
    if transcript_len == FIRST_TURN_LEN {
        messages.push(ChatEntry::system(settings.system_prompt.as_str()));
    }
    messages.push(ChatEntry::user(text));

    ChatRequest {
        model: settings.model.clone(),
        thread_id,
        stream: settings.stream,
        messages,
    }
}
