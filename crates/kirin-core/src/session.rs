//! Conversation identity
//!
//! The backend correlates turns through a thread id allocated once per
//! controller. Until it arrives (or if allocation fails) turns carry the
//! sentinel `0`.

use tracing::{error, info};

use crate::ai::ChatBackend;
use crate::error::{ChatError, TransportError};
use crate::update::SessionStatus;

/// Wire value sent while no thread id has been acquired
pub const UNSET_THREAD_ID: i64 = 0;

#[derive(Debug, Clone, Default)]
pub struct ConversationSession {
    thread_id: Option<i64>,
    failed: bool,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that already has its thread, so no initialization is needed
    pub fn with_thread(thread_id: i64) -> Self {
        Self {
            thread_id: (thread_id > UNSET_THREAD_ID).then_some(thread_id),
            failed: false,
        }
    }

    pub fn thread_id(&self) -> Option<i64> {
        self.thread_id
    }

    /// Value to put in outgoing requests
    pub fn wire_id(&self) -> i64 {
        self.thread_id.unwrap_or(UNSET_THREAD_ID)
    }

    pub fn is_initialized(&self) -> bool {
        self.thread_id.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        match (self.thread_id, self.failed) {
            (Some(id), _) => SessionStatus::Ready(id),
            (None, true) => SessionStatus::Unavailable,
            (None, false) => SessionStatus::Pending,
        }
    }

    /// Record the outcome of initialization. A set id is never replaced.
    pub fn resolve(&mut self, result: Result<i64, TransportError>) -> SessionStatus {
        if let Some(id) = self.thread_id {
            info!("Ignoring late session result, thread {} already set", id);
            return self.status();
        }

        match result {
            Ok(id) => {
                info!("Conversation thread {} acquired", id);
                self.thread_id = Some(id);
            }
            Err(e) => {
                let err = ChatError::Initialization(e);
                error!("{}; continuing without conversation context", err);
                self.failed = true;
            }
        }
        self.status()
    }
}

/// Allocate a new conversation thread on the backend.
pub async fn initialize(backend: &dyn ChatBackend) -> Result<i64, TransportError> {
    let id = backend.create_thread().await?;
    if id <= UNSET_THREAD_ID {
        return Err(TransportError::Decode(format!(
            "thread id must be positive, got {}",
            id
        )));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_session_uses_sentinel() {
        let session = ConversationSession::new();
        assert_eq!(session.wire_id(), UNSET_THREAD_ID);
        assert_eq!(session.status(), SessionStatus::Pending);
    }

    #[test]
    fn test_resolve_sets_once() {
        let mut session = ConversationSession::new();
        assert_eq!(session.resolve(Ok(7)), SessionStatus::Ready(7));
        assert_eq!(session.resolve(Ok(9)), SessionStatus::Ready(7));
        assert_eq!(session.wire_id(), 7);
    }

    #[test]
    fn test_failed_resolve_leaves_id_unset() {
        let mut session = ConversationSession::new();
        let status = session.resolve(Err(TransportError::Connection("refused".into())));
        assert_eq!(status, SessionStatus::Unavailable);
        assert!(!session.is_initialized());
        assert_eq!(session.wire_id(), UNSET_THREAD_ID);
    }

    #[test]
    fn test_with_thread_ignores_sentinel() {
        assert!(!ConversationSession::with_thread(0).is_initialized());
        assert_eq!(ConversationSession::with_thread(3).thread_id(), Some(3));
    }
}
