//! Append-only transcript
//!
//! Finalized messages never change once appended. The only mutable entry is
//! the in-flight streaming message, kept in its own tail slot until it is
//! sealed into the log.

use crate::state::Message;
use crate::update::{ChatUpdate, Publisher};

pub struct MessageStore {
    log: Vec<Message>,
    in_flight: Option<Message>,
    publisher: Publisher,
}

impl MessageStore {
    pub fn new(publisher: Publisher) -> Self {
        Self {
            log: Vec::new(),
            in_flight: None,
            publisher,
        }
    }

    /// Append a finalized message. An in-flight message is sealed first so
    /// ordering matches arrival.
    pub fn append(&mut self, message: Message) {
        if let Some(pending) = self.in_flight.take() {
            self.log.push(pending);
        }
        self.log.push(message);
        self.publish();
    }

    /// Replace the in-flight streaming message, creating it if absent.
    pub fn replace_last(&mut self, message: Message) {
        self.in_flight = Some(message);
        self.publish();
    }

    /// Move the in-flight message into the log. Returns false when there was none.
    pub fn seal_last(&mut self) -> bool {
        match self.in_flight.take() {
            Some(message) => {
                self.log.push(message);
                self.publish();
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.len());
        messages.extend(self.log.iter().cloned());
        messages.extend(self.in_flight.iter().cloned());
        messages
    }

    /// Number of visible messages, the in-flight one included
    pub fn len(&self) -> usize {
        self.log.len() + usize::from(self.in_flight.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finalized(&self) -> &[Message] {
        &self.log
    }

    pub fn in_flight(&self) -> Option<&Message> {
        self.in_flight.as_ref()
    }

    fn publish(&self) {
        self.publisher.publish(ChatUpdate::Messages(self.snapshot()));
    }
}
