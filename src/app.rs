use kirin_core::{ChatController, ChatError, ChatUpdate, Message, SessionStatus};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

/// Rows a line takes when word wrapped at `width`.
///
/// Never less than what the word-wrapping `Paragraph` renders: trailing
/// spaces count toward the row and words wider than a row are split.
fn wrapped_height(line: &str, width: usize) -> usize {
    let width = width.max(1);
    let mut rows = 1;
    let mut col = 0;

    for word in line.split_inclusive(' ') {
        let mut len = word.chars().count();
        if col > 0 && col + len > width {
            rows += 1;
            col = 0;
        }
        while col + len > width {
            rows += 1;
            len -= width - col;
            col = 0;
        }
        col += len;
    }
    rows
}

pub struct App {
    pub should_quit: bool,
    pub controller: ChatController,
    updates: UnboundedReceiver<ChatUpdate>,

    // Latest state published by the controller
    pub messages: Vec<Message>,
    pub composing: bool,
    pub session_status: SessionStatus,

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Chat view
    pub scroll: u16,
    pub follow: bool, // stick to the bottom while new text arrives
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub notice: Option<String>,
}

impl App {
    pub fn new(controller: ChatController, updates: UnboundedReceiver<ChatUpdate>) -> Self {
        let messages = controller.snapshot();
        let composing = controller.is_composing();
        let session_status = controller.session().status();

        Self {
            should_quit: false,
            controller,
            updates,
            messages,
            composing,
            session_status,
            input: String::new(),
            cursor: 0,
            scroll: 0,
            follow: true,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            notice: None,
        }
    }

    /// Pull everything the controller published since the last frame.
    pub fn apply_updates(&mut self) {
        let mut changed = false;
        while let Ok(update) = self.updates.try_recv() {
            match update {
                ChatUpdate::Messages(messages) => {
                    self.messages = messages;
                    changed = true;
                }
                ChatUpdate::Composing(composing) => {
                    self.composing = composing;
                    changed = true;
                }
                ChatUpdate::Session(status) => {
                    debug!("Session status {:?}", status);
                    self.session_status = status;
                }
            }
        }
        if changed && self.follow {
            self.scroll_to_bottom();
        }
    }

    pub fn submit(&mut self) {
        if self.input.trim().is_empty() {
            return;
        }

        match self.controller.send_message(&self.input) {
            Ok(()) => {
                self.input.clear();
                self.cursor = 0;
                self.notice = None;
                self.follow = true;
            }
            Err(ChatError::TurnInFlight) => {
                self.notice = Some("Kirin is still answering - Esc to stop".to_string());
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    /// Stop the in-flight answer. Returns false when there was none.
    pub fn abort_turn(&mut self) -> bool {
        self.controller.abort()
    }

    pub fn model(&self) -> &str {
        &self.controller.settings().model
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.composing {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Rendered height of the transcript, wrapped at the chat width
    pub fn content_lines(&self) -> u16 {
        // Default to 50 columns until the first render measured the area
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: usize = 0;
        for msg in &self.messages {
            total_lines += 1; // Author line
            for line in msg.text.lines() {
                total_lines += wrapped_height(line, wrap_width);
            }
            total_lines += 1; // Blank line after message
        }

        if self.composing {
            total_lines += 1; // Typing indicator
        }
        u16::try_from(total_lines).unwrap_or(u16::MAX)
    }

    fn max_scroll(&self) -> u16 {
        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        self.content_lines().saturating_sub(visible_height)
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.follow = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.scroll = self.scroll.saturating_add(lines).min(max);
        self.follow = self.scroll >= max;
    }

    pub fn page_height(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }
}
