//! Streamed reply consumption
//!
//! One [`StreamConsumer`] per streamed turn. Fragments accumulate into a
//! single active assistant message that lives in the store's in-flight slot
//! until a terminal transition seals it into the log.
//!
//! ```text
//! Idle -> Opened -> Receiving -> Completed
//!                            \-> Aborted
//!   (any non-terminal)       \-> Failed
//! ```

use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::indicator::ComposingIndicator;
use crate::state::{Message, Participant};
use crate::store::MessageStore;

/// Shown by the server participant when a streamed turn fails
pub const SERVICE_UNAVAILABLE: &str =
    "Sorry, the service isn't available right now. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Opened,
    Receiving,
    Completed,
    Aborted,
    Failed,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Aborted | StreamState::Failed
        )
    }
}

#[derive(Debug)]
pub struct StreamConsumer {
    state: StreamState,
    active: Option<Message>,
    fragment_count: usize,
}

impl Default for StreamConsumer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamConsumer {
    pub fn new() -> Self {
        Self {
            state: StreamState::Idle,
            active: None,
            fragment_count: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The message being accumulated, if the connection is open
    pub fn active(&self) -> Option<&Message> {
        self.active.as_ref()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragment_count
    }

    /// Connection established: allocate the placeholder, touch nothing else.
    pub fn on_open(&mut self) {
        if self.state != StreamState::Idle {
            warn!("Stream open event in state {:?}", self.state);
            return;
        }
        self.active = Some(Message::new(Participant::Assistant, ""));
        self.state = StreamState::Opened;
        debug!("Stream opened");
    }

    /// Append a fragment to the active message and publish it.
    pub fn on_fragment(&mut self, fragment: &str, store: &mut MessageStore) {
        if self.state.is_terminal() {
            warn!("Dropping fragment after terminal state {:?}", self.state);
            return;
        }
        if self.state == StreamState::Idle {
            self.on_open();
        }

        let active = self
            .active
            .get_or_insert_with(|| Message::new(Participant::Assistant, ""));
        active.text.push_str(fragment);
        self.fragment_count += 1;
        debug!("Fragment #{}: {:?}", self.fragment_count, fragment);

        store.replace_last(active.clone());
        self.state = StreamState::Receiving;
    }

    /// Normal end of stream.
    pub fn on_complete(&mut self, store: &mut MessageStore, indicator: &mut ComposingIndicator) {
        if !self.finish(StreamState::Completed) {
            return;
        }
        store.seal_last();
        indicator.clear();
        info!("Stream completed after {} fragments", self.fragment_count);
    }

    /// Client-initiated abort. Whatever accumulated stays visible.
    pub fn on_abort(&mut self, store: &mut MessageStore, indicator: &mut ComposingIndicator) {
        if !self.finish(StreamState::Aborted) {
            return;
        }
        store.seal_last();
        indicator.clear();
        info!("Stream aborted after {} fragments", self.fragment_count);
    }

    /// Transport failure. The partial message is kept as is and the server
    /// participant apologises after it.
    pub fn on_error(
        &mut self,
        error: &TransportError,
        store: &mut MessageStore,
        indicator: &mut ComposingIndicator,
    ) {
        if !self.finish(StreamState::Failed) {
            return;
        }
        warn!(
            "Stream failed after {} fragments: {}",
            self.fragment_count, error
        );
        store.seal_last();
        store.append(Message::new(Participant::Server, SERVICE_UNAVAILABLE));
        indicator.clear();
    }

    fn finish(&mut self, terminal: StreamState) -> bool {
        if self.state.is_terminal() {
            warn!(
                "Ignoring {:?} transition, stream already {:?}",
                terminal, self.state
            );
            return false;
        }
        self.state = terminal;
        self.active = None;
        true
    }
}
