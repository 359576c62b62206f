//! Streaming chat session controller
//!
//! Owns the transcript, the conversation session and the composing flag.
//! Network work runs in spawned tasks that report back over a channel; the
//! owner pulls those events with [`ChatController::next_event`] and applies
//! them with [`ChatController::handle_event`], so every state change happens
//! on the owner's task, one event at a time.

use std::sync::Arc;

use futures_util::future::{AbortHandle, Abortable};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::ai::{ChatBackend, ChatReply, ChatRequest};
use crate::dispatch::{self, ChatSettings};
use crate::error::{ChatError, TransportError};
use crate::indicator::ComposingIndicator;
use crate::session::{self, ConversationSession};
use crate::single;
use crate::state::{Message, Participant};
use crate::store::MessageStore;
use crate::stream::{StreamConsumer, StreamState};
use crate::update::{ChatUpdate, Publisher};

/// Something a backend task reported
#[derive(Debug)]
pub enum BackendEvent {
    Session(Result<i64, TransportError>),
    Turn { turn: u64, event: TurnEvent },
}

#[derive(Debug)]
pub enum TurnEvent {
    Opened,
    Fragment(String),
    Completed,
    Failed(TransportError),
    Reply(Result<ChatReply, TransportError>),
}

enum TurnMode {
    Streamed(StreamConsumer),
    Single,
}

struct ActiveTurn {
    id: u64,
    abort: AbortHandle,
    mode: TurnMode,
}

pub struct ChatController {
    backend: Arc<dyn ChatBackend>,
    settings: ChatSettings,
    session: ConversationSession,
    store: MessageStore,
    indicator: ComposingIndicator,
    publisher: Publisher,
    active: Option<ActiveTurn>,
    next_turn: u64,
    session_task: Option<AbortHandle>,
    events_tx: mpsc::UnboundedSender<BackendEvent>,
    events_rx: mpsc::UnboundedReceiver<BackendEvent>,
}

impl ChatController {
    /// Start a new conversation. Must be called inside a tokio runtime: the
    /// thread allocation is spawned immediately.
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        settings: ChatSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ChatUpdate>) {
        Self::with_session(backend, settings, ConversationSession::new())
    }

    /// Start with an existing session. Initialization only runs if it has no thread yet.
    pub fn with_session(
        backend: Arc<dyn ChatBackend>,
        settings: ChatSettings,
        session: ConversationSession,
    ) -> (Self, mpsc::UnboundedReceiver<ChatUpdate>) {
        let (publisher, updates) = Publisher::channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut store = MessageStore::new(publisher.clone());
        store.append(Message::greeting());

        let mut controller = Self {
            backend,
            settings,
            session,
            store,
            indicator: ComposingIndicator::new(publisher.clone()),
            publisher,
            active: None,
            next_turn: 0,
            session_task: None,
            events_tx,
            events_rx,
        };

        controller
            .publisher
            .publish(ChatUpdate::Session(controller.session.status()));
        if !controller.session.is_initialized() {
            controller.spawn_initializer();
        }

        (controller, updates)
    }

    fn spawn_initializer(&mut self) {
        let backend = Arc::clone(&self.backend);
        let tx = self.events_tx.clone();
        let (abort, registration) = AbortHandle::new_pair();

        let task = async move {
            let result = session::initialize(backend.as_ref()).await;
            let _ = tx.send(BackendEvent::Session(result));
        };
        tokio::spawn(Abortable::new(task, registration));
        self.session_task = Some(abort);
    }

    /// Send a user turn.
    ///
    /// The turn goes out even if the session has no thread yet; correlation
    /// is best effort.
    pub fn send_message(&mut self, text: &str) -> Result<(), ChatError> {
        dispatch::validate(text)?;
        if self.active.is_some() {
            return Err(ChatError::TurnInFlight);
        }

        self.store.append(Message::new(Participant::User, text));
        self.indicator.set();

        let request = dispatch::build_request(
            &self.settings,
            self.session.wire_id(),
            text,
            self.store.len(),
        );

        let id = self.next_turn;
        self.next_turn += 1;
        info!(
            "Turn {} -> model {}, thread {}, stream {}, {} entries",
            id,
            request.model,
            request.thread_id,
            request.stream,
            request.messages.len()
        );

        let (abort, mode) = if request.stream {
            (self.spawn_streamed(id, request), TurnMode::Streamed(StreamConsumer::new()))
        } else {
            (self.spawn_single(id, request), TurnMode::Single)
        };
        self.active = Some(ActiveTurn { id, abort, mode });
        Ok(())
    }

    fn spawn_streamed(&self, turn: u64, request: ChatRequest) -> AbortHandle {
        let backend = Arc::clone(&self.backend);
        let tx = self.events_tx.clone();
        let (abort, registration) = AbortHandle::new_pair();

        let task = async move {
            let send = |event| tx.send(BackendEvent::Turn { turn, event }).is_ok();

            let mut fragments = match backend.open_stream(request).await {
                Ok(fragments) => fragments,
                Err(e) => {
                    send(TurnEvent::Failed(e));
                    return;
                }
            };
            if !send(TurnEvent::Opened) {
                return;
            }

            while let Some(item) = fragments.next().await {
                let event = match item {
                    Ok(fragment) => TurnEvent::Fragment(fragment),
                    Err(e) => {
                        send(TurnEvent::Failed(e));
                        return;
                    }
                };
                if !send(event) {
                    return;
                }
            }
            send(TurnEvent::Completed);
        };

        tokio::spawn(Abortable::new(task, registration));
        abort
    }

    fn spawn_single(&self, turn: u64, request: ChatRequest) -> AbortHandle {
        let backend = Arc::clone(&self.backend);
        let tx = self.events_tx.clone();
        let (abort, registration) = AbortHandle::new_pair();

        let task = async move {
            let result = backend.chat(request).await;
            let _ = tx.send(BackendEvent::Turn {
                turn,
                event: TurnEvent::Reply(result),
            });
        };

        tokio::spawn(Abortable::new(task, registration));
        abort
    }

    /// Wait for the next backend event. Pending forever while nothing is in flight.
    pub async fn next_event(&mut self) -> Option<BackendEvent> {
        self.events_rx.recv().await
    }

    pub fn handle_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Session(result) => {
                self.session_task = None;
                let status = self.session.resolve(result);
                self.publisher.publish(ChatUpdate::Session(status));
            }
            BackendEvent::Turn { turn, event } => self.handle_turn_event(turn, event),
        }
    }

    fn handle_turn_event(&mut self, turn: u64, event: TurnEvent) {
        let Some(active) = self.active.as_mut().filter(|a| a.id == turn) else {
            debug!("Dropping event for finished turn {}: {:?}", turn, event);
            return;
        };

        let finished = match (&mut active.mode, event) {
            (TurnMode::Streamed(consumer), TurnEvent::Opened) => {
                consumer.on_open();
                false
            }
            (TurnMode::Streamed(consumer), TurnEvent::Fragment(fragment)) => {
                consumer.on_fragment(&fragment, &mut self.store);
                false
            }
            (TurnMode::Streamed(consumer), TurnEvent::Completed) => {
                consumer.on_complete(&mut self.store, &mut self.indicator);
                true
            }
            (TurnMode::Streamed(consumer), TurnEvent::Failed(e)) => {
                consumer.on_error(&e, &mut self.store, &mut self.indicator);
                true
            }
            (TurnMode::Single, TurnEvent::Reply(result)) => {
                single::consume_reply(result, &mut self.store, &mut self.indicator);
                true
            }
            (_, event) => {
                debug!("Event {:?} does not apply to turn {}", event, turn);
                false
            }
        };

        if finished {
            self.active = None;
        }
    }

    /// Cancel the in-flight turn. Returns false when nothing was in flight.
    pub fn abort(&mut self) -> bool {
        let Some(turn) = self.active.take() else {
            return false;
        };
        turn.abort.abort();

        match turn.mode {
            TurnMode::Streamed(mut consumer) => {
                consumer.on_abort(&mut self.store, &mut self.indicator);
            }
            TurnMode::Single => {
                info!("Turn {} aborted", turn.id);
                self.indicator.clear();
            }
        }
        true
    }

    /// Drive events until no turn is in flight.
    pub async fn settle(&mut self) {
        while self.active.is_some() {
            match self.next_event().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.store.snapshot()
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn is_composing(&self) -> bool {
        self.indicator.is_composing()
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn is_turn_in_flight(&self) -> bool {
        self.active.is_some()
    }

    /// State of the in-flight streamed turn, if any
    pub fn stream_state(&self) -> Option<StreamState> {
        match &self.active.as_ref()?.mode {
            TurnMode::Streamed(consumer) => Some(consumer.state()),
            TurnMode::Single => None,
        }
    }
}

impl Drop for ChatController {
    fn drop(&mut self) {
        if let Some(turn) = &self.active {
            turn.abort.abort();
        }
        if let Some(task) = &self.session_task {
            task.abort();
        }
    }
}
