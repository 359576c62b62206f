//! Updates pushed from the controller to the presentation layer

use tokio::sync::mpsc;
use tracing::debug;

use crate::state::Message;

/// Whether the conversation has a backend thread yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Ready(i64),
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatUpdate {
    /// Full transcript as it should be displayed now
    Messages(Vec<Message>),
    /// Assistant-is-composing indicator changed
    Composing(bool),
    Session(SessionStatus),
}

/// Sending half shared by the store, the indicator and the controller.
///
/// A dropped receiver only means nobody is rendering any more, so sends never fail.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::UnboundedSender<ChatUpdate>,
}

impl Publisher {
    pub fn new(tx: mpsc::UnboundedSender<ChatUpdate>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChatUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn publish(&self, update: ChatUpdate) {
        if self.tx.send(update).is_err() {
            debug!("Update receiver dropped");
        }
    }
}
