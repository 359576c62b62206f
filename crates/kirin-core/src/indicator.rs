use crate::update::{ChatUpdate, Publisher};

/// "Assistant is composing" flag.
///
/// Set by the dispatcher when a turn goes out, cleared by whichever consumer
/// reaches the turn's terminal outcome.
pub struct ComposingIndicator {
    composing: bool,
    publisher: Publisher,
}

impl ComposingIndicator {
    pub fn new(publisher: Publisher) -> Self {
        Self {
            composing: false,
            publisher,
        }
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    pub fn set(&mut self) {
        self.update(true);
    }

    /// Returns whether the flag actually went from true to false.
    pub fn clear(&mut self) -> bool {
        self.update(false)
    }

    fn update(&mut self, composing: bool) -> bool {
        if self.composing == composing {
            return false;
        }
        self.composing = composing;
        self.publisher.publish(ChatUpdate::Composing(composing));
        true
    }
}
