use std::sync::Arc;

use crate::api::ChatTransport;
use crate::state::ChatSession;

/// Soft cap on user input, mirrored by the input counter.
pub const INPUT_CHAR_LIMIT: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub session: ChatSession,

    // Draft input
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Chat viewport
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            session: ChatSession::new(transport),

            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            animation_frame: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.session.is_busy()
    }

    /// Enter pressed in the input: hand the draft to the session.
    ///
    /// The draft only clears when the session actually started a send, so a
    /// message typed while busy or disconnected stays put for a retry.
    pub fn submit_message(&mut self) {
        let draft = self.input.clone();
        if self.session.submit(&draft) {
            self.input.clear();
            self.input_cursor = 0;
            self.scroll_chat_to_bottom();
        }
    }

    /// Join a completed send, if any. Called from the main loop; the 300ms
    /// tick guarantees a wakeup shortly after the transport task finishes.
    pub async fn poll_send(&mut self) {
        if self.session.send_finished() {
            self.session.finish_send().await;
            self.scroll_chat_to_bottom();
        }
    }

    pub fn dismiss_error(&mut self) {
        self.session.last_error = None;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat scrolling
    pub fn scroll_down(&mut self) {
        let max_scroll = self.chat_line_count().saturating_sub(self.chat_height);
        if self.chat_scroll < max_scroll {
            self.chat_scroll = self.chat_scroll.saturating_add(1);
        }
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_half_page_down(&mut self) {
        let half_page = self.chat_height / 2;
        let max_scroll = self.chat_line_count().saturating_sub(self.chat_height);
        self.chat_scroll = (self.chat_scroll + half_page).min(max_scroll);
    }

    pub fn scroll_half_page_up(&mut self) {
        let half_page = self.chat_height / 2;
        self.chat_scroll = self.chat_scroll.saturating_sub(half_page);
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
    }

    /// Scroll so the latest message (or "Thinking...") is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        let total_lines = self.chat_line_count();

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.chat_scroll = 0;
        }
    }

    /// Estimate of the rendered chat height, mirroring the wrap the UI does.
    fn chat_line_count(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.session.messages {
            total_lines += 1; // Role line ("You:" or "Figaro:")
            // Calculate wrapped lines for each line of content
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1; // Empty line still takes one line
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.is_loading() {
            total_lines += 2; // "Figaro:" + "Thinking..."
        }

        total_lines
    }
}
