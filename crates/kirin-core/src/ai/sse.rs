//! SSE (Server-Sent Events) decoding
//!
//! Turns a chunked response body into the payloads of its `message` events.
//! Payloads are passed through verbatim; the backend sends raw text fragments.

use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use tracing::debug;

use super::FragmentStream;
use crate::error::TransportError;

/// Incremental SSE parser that tolerates lines split across chunks
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of a line whose terminator has not arrived yet
    partial_line: Vec<u8>,
    data: Vec<String>,
    event_type: String,
    has_data: bool,
    event_count: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut events = Vec::new();
        self.partial_line.extend_from_slice(chunk);

        // Lines end in CRLF, LF or a lone CR
        while let Some(pos) = self
            .partial_line
            .iter()
            .position(|b| *b == b'\n' || *b == b'\r')
        {
            let consumed = if self.partial_line[pos] == b'\r' {
                match self.partial_line.get(pos + 1) {
                    Some(b'\n') => pos + 2,
                    Some(_) => pos + 1,
                    // May be the first half of a CRLF split across chunks
                    None => break,
                }
            } else {
                pos + 1
            };
            let line: Vec<u8> = self.partial_line.drain(..consumed).take(pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Flush at end of body. A trailing event without its blank line is still delivered.
    pub fn finish(&mut self) -> Option<String> {
        if !self.partial_line.is_empty() {
            let mut line = std::mem::take(&mut self.partial_line);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line).into_owned();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    pub fn event_count(&self) -> usize {
        self.event_count
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }

        // Comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                self.data.push(value.to_string());
                self.has_data = true;
            }
            "event" => self.event_type = value.to_string(),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        let event_type = std::mem::take(&mut self.event_type);
        let data = std::mem::take(&mut self.data);
        if !std::mem::replace(&mut self.has_data, false) {
            return None;
        }

        if !event_type.is_empty() && event_type != "message" {
            debug!("Skipping SSE event of type {}", event_type);
            return None;
        }

        self.event_count += 1;
        Some(data.join("\n"))
    }
}

struct DecodeState<S> {
    body: S,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    done: bool,
}

/// Adapt a chunked body into a stream of message payloads.
pub fn fragments<S, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Into<TransportError> + Send + 'static,
{
    let state = DecodeState {
        body,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.ready.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.ready.extend(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.done = true;
                    if let Some(last) = state.decoder.finish() {
                        state.ready.push_back(last);
                    }
                    debug!("SSE body ended after {} events", state.decoder.event_count());
                }
            }
        }
    })
    .boxed()
}
