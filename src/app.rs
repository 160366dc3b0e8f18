use chrono::Local;
use tokio::sync::mpsc;

use crate::agent::AgentClient;
use crate::config::Config;

/// Shown in place of an answer when the stream carried no payload frames.
pub const EMPTY_RESPONSE_FALLBACK: &str = "I received your message but got an empty response.";

/// Shown when the request or the stream fails; the detail goes to the log,
/// never to the transcript.
pub const ERROR_FALLBACK: &str = "Sorry, I encountered an error while processing your request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// One transcript entry. Immutable once appended.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: String,
    pub is_error: bool,
}

impl ChatMessage {
    fn new(role: ChatRole, content: String, is_error: bool) -> Self {
        Self {
            role,
            content,
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            is_error,
        }
    }

    pub fn user(content: String) -> Self {
        Self::new(ChatRole::User, content, false)
    }

    pub fn assistant(content: String) -> Self {
        Self::new(ChatRole::Assistant, content, false)
    }

    pub fn error(content: String) -> Self {
        Self::new(ChatRole::Assistant, content, true)
    }
}

/// Lifecycle of the current turn. At most one turn is in flight at a time;
/// `submit` refuses input while not `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Sending,
    Streaming,
}

/// Progress reports from an in-flight turn's task back to the main loop.
#[derive(Debug)]
pub enum TurnEvent {
    StreamStarted,
    Settled(anyhow::Result<Option<String>>),
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input line state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Transcript (append-only; replaced wholesale by clear_chat)
    pub messages: Vec<ChatMessage>,
    pub transcript_rev: u64,

    pub turn: TurnState,

    // Chat viewport
    pub chat_scroll: u16,
    pub chat_height: u16, // inner size, updated during render
    pub chat_width: u16,
    pub total_chat_lines: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub agent: AgentClient,
    turn_tx: mpsc::UnboundedSender<TurnEvent>,
}

impl App {
    pub fn new(config: &Config, turn_tx: mpsc::UnboundedSender<TurnEvent>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            input: String::new(),
            cursor: 0,

            messages: Vec::new(),
            transcript_rev: 0,

            turn: TurnState::Idle,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            total_chat_lines: 0,

            animation_frame: 0,

            agent: AgentClient::new(config.agent_url(), config.agent_id(), config.thread_id()),
            turn_tx,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.turn != TurnState::Idle
    }

    /// Starts a new turn from the current input. Ignored while a turn is
    /// already in flight or when the input is empty/whitespace; otherwise the
    /// user message is appended before any network interaction happens.
    pub fn submit(&mut self) {
        if self.turn != TurnState::Idle {
            return;
        }
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return;
        }

        self.push_message(ChatMessage::user(text.clone()));
        self.input.clear();
        self.cursor = 0;
        self.turn = TurnState::Sending;

        let agent = self.agent.clone();
        let tx = self.turn_tx.clone();
        tokio::spawn(async move {
            match agent.open_stream(&text).await {
                Ok(stream) => {
                    let _ = tx.send(TurnEvent::StreamStarted);
                    let _ = tx.send(TurnEvent::Settled(stream.collect_text().await));
                }
                Err(error) => {
                    let _ = tx.send(TurnEvent::Settled(Err(error)));
                }
            }
        });
    }

    /// Applies a turn-lifecycle event. Settlement appends exactly one
    /// assistant message and returns the machine to `Idle`.
    pub fn on_turn_event(&mut self, event: TurnEvent) {
        match event {
            TurnEvent::StreamStarted => {
                if self.turn == TurnState::Sending {
                    self.turn = TurnState::Streaming;
                }
            }
            TurnEvent::Settled(result) => {
                let message = match result {
                    Ok(Some(text)) => ChatMessage::assistant(text),
                    Ok(None) => ChatMessage::assistant(EMPTY_RESPONSE_FALLBACK.to_string()),
                    Err(error) => {
                        tracing::warn!("turn failed: {error:#}");
                        ChatMessage::error(ERROR_FALLBACK.to_string())
                    }
                };
                self.push_message(message);
                self.turn = TurnState::Idle;
            }
        }
    }

    /// Replaces the transcript with an empty one. An in-flight turn is not
    /// cancelled; its eventual message lands in the cleared transcript.
    pub fn clear_chat(&mut self) {
        self.messages.clear();
        self.transcript_rev += 1;
        self.chat_scroll = 0;
    }

    fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.transcript_rev += 1;
        self.scroll_chat_to_bottom();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat scrolling
    pub fn scroll_down(&mut self) {
        if self.chat_scroll < self.total_chat_lines.saturating_sub(self.chat_height) {
            self.chat_scroll = self.chat_scroll.saturating_add(1);
        }
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_half_page_down(&mut self) {
        let half_page = self.chat_height / 2;
        let max_scroll = self.total_chat_lines.saturating_sub(self.chat_height);
        self.chat_scroll = (self.chat_scroll + half_page).min(max_scroll);
    }

    pub fn scroll_half_page_up(&mut self) {
        let half_page = self.chat_height / 2;
        self.chat_scroll = self.chat_scroll.saturating_sub(half_page);
    }

    /// Scroll the chat so the newest message (or the "Thinking..." line) is
    /// visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.messages {
            total_lines += 1; // Role line ("You:" or "AI:")
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.is_busy() {
            total_lines += 2; // "AI:" + "Thinking..."
        }

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
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn test_app() -> (App, mpsc::UnboundedReceiver<TurnEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        // Unroutable endpoint so no spawned task can reach a real agent
        let config = Config {
            agent_url: Some("http://127.0.0.1:9".to_string()),
            agent_id: None,
            thread_id: None,
        };
        (App::new(&config, tx), rx)
    }

    #[tokio::test]
    async fn test_submit_appends_trimmed_user_message() {
        let (mut app, _rx) = test_app();
        app.input = "  What's the weather in Oslo?  ".to_string();
        app.submit();

        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].role, ChatRole::User);
        assert_eq!(app.messages[0].content, "What's the weather in Oslo?");
        assert!(!app.messages[0].is_error);
        assert_eq!(app.turn, TurnState::Sending);
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
    }

    #[tokio::test]
    async fn test_submit_whitespace_only_is_noop() {
        let (mut app, _rx) = test_app();
        app.input = "   \t ".to_string();
        app.submit();

        assert!(app.messages.is_empty());
        assert_eq!(app.turn, TurnState::Idle);
    }

    #[tokio::test]
    async fn test_submit_while_turn_active_is_noop() {
        let (mut app, _rx) = test_app();
        app.input = "first".to_string();
        app.submit();

        app.input = "second".to_string();
        app.submit();

        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].content, "first");
        // The rejected submission leaves the input untouched
        assert_eq!(app.input, "second");
    }

    #[tokio::test]
    async fn test_stream_started_moves_sending_to_streaming() {
        let (mut app, _rx) = test_app();
        app.input = "hi".to_string();
        app.submit();

        app.on_turn_event(TurnEvent::StreamStarted);
        assert_eq!(app.turn, TurnState::Streaming);
    }

    #[test]
    fn test_stream_started_ignored_while_idle() {
        let (mut app, _rx) = test_app();
        app.on_turn_event(TurnEvent::StreamStarted);
        assert_eq!(app.turn, TurnState::Idle);
    }

    #[test]
    fn test_settled_text_appends_assistant_message() {
        let (mut app, _rx) = test_app();
        app.turn = TurnState::Streaming;

        app.on_turn_event(TurnEvent::Settled(Ok(Some("Sunny, 21 degrees.".to_string()))));

        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].role, ChatRole::Assistant);
        assert_eq!(app.messages[0].content, "Sunny, 21 degrees.");
        assert!(!app.messages[0].is_error);
        assert_eq!(app.turn, TurnState::Idle);
    }

    #[test]
    fn test_settled_empty_uses_placeholder() {
        let (mut app, _rx) = test_app();
        app.turn = TurnState::Streaming;

        app.on_turn_event(TurnEvent::Settled(Ok(None)));

        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].content, EMPTY_RESPONSE_FALLBACK);
        assert!(!app.messages[0].is_error);
        assert_eq!(app.turn, TurnState::Idle);
    }

    #[test]
    fn test_settled_error_appends_error_message() {
        let (mut app, _rx) = test_app();
        app.turn = TurnState::Sending;

        app.on_turn_event(TurnEvent::Settled(Err(anyhow!("connection refused"))));

        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].content, ERROR_FALLBACK);
        assert!(app.messages[0].is_error);
        assert_eq!(app.turn, TurnState::Idle);
    }

    #[test]
    fn test_clear_chat_empties_transcript() {
        let (mut app, _rx) = test_app();
        for i in 0..5 {
            app.turn = TurnState::Streaming;
            app.on_turn_event(TurnEvent::Settled(Ok(Some(format!("answer {i}")))));
        }
        assert_eq!(app.messages.len(), 5);

        app.clear_chat();
        assert!(app.messages.is_empty());
        assert_eq!(app.chat_scroll, 0);
    }

    #[test]
    fn test_transcript_rev_tracks_mutations() {
        let (mut app, _rx) = test_app();
        let before = app.transcript_rev;

        app.turn = TurnState::Streaming;
        app.on_turn_event(TurnEvent::Settled(Ok(Some("hello".to_string()))));
        assert_eq!(app.transcript_rev, before + 1);

        app.clear_chat();
        assert_eq!(app.transcript_rev, before + 2);
    }
}
