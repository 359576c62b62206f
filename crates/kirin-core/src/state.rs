//! UI-agnostic conversation state types
//!
//! Participants, transcript messages and the role-tagged entries sent to the
//! backend. Nothing here depends on a particular front-end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Avatar shown when a participant has none of its own.
pub const DEFAULT_AVATAR: &str = "profile.svg";

/// Greeting the assistant opens every conversation with.
pub const GREETING: &str =
    "Hello! How are you today? As a helpful, respectful and honest assistant, I am happy to serve you.";

/// The author of a transcript message.
///
/// Only three participants exist: the local user, the assistant and a
/// synthetic server participant that reports transport failures in-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Participant {
    User,
    Assistant,
    Server,
}

impl Participant {
    pub fn id(&self) -> &'static str {
        match self {
            Participant::User => "user",
            Participant::Assistant => "smile",
            Participant::Server => "server",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Participant::User => "You",
            Participant::Assistant => "Kirin",
            Participant::Server => "Server",
        }
    }

    pub fn avatar(&self) -> Option<&'static str> {
        match self {
            Participant::User => None,
            Participant::Assistant => Some("llama.svg"),
            Participant::Server => Some("internet.svg"),
        }
    }

    /// Avatar reference, falling back to the generic profile picture when
    /// the participant has none or it is blank.
    pub fn avatar_or_default(&self) -> &'static str {
        self.avatar()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(DEFAULT_AVATAR)
    }

    pub fn all() -> [Participant; 3] {
        [Participant::User, Participant::Assistant, Participant::Server]
    }
}

/// One entry in the transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub author: Participant,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(author: Participant, text: impl Into<String>) -> Self {
        Self::at(author, text, Utc::now())
    }

    pub fn at(author: Participant, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            author,
            text: text.into(),
            created_at,
        }
    }

    pub fn greeting() -> Self {
        Self::new(Participant::Assistant, GREETING)
    }
}

/// Role of an entry in an outgoing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

/// A role-tagged content entry of an outgoing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
}

impl ChatEntry {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}
