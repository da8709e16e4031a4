//! UI-agnostic conversation state
//!
//! Holds the message log and the send lifecycle (optimistic append,
//! in-flight task, rollback on failure) independent of any rendering.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::api::{ApiError, ChatTransport};

/// Shown in place of an empty assistant reply.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error.";

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in the conversation log.
///
/// The `id` is generated locally and never leaves the process; the wire
/// format carries only role, content and the optional timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(skip)]
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }
}

/// The conversation session: message log plus send/connectivity state.
///
/// At most one send is in flight at a time; `send_task` doubles as the
/// busy flag. The health prober only ever writes `connected`, so it never
/// races with the send path.
pub struct ChatSession {
    pub messages: Vec<Message>,
    pub connected: bool,
    pub last_error: Option<String>,
    transport: Arc<dyn ChatTransport>,
    send_task: Option<JoinHandle<Result<String, ApiError>>>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            messages: Vec::new(),
            // Optimistic until the first health probe reports back
            connected: true,
            last_error: None,
            transport,
            send_task: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.send_task.is_some()
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Start a send: append the user message and spawn the transport call.
    ///
    /// Returns false without touching the log when the text is blank, a send
    /// is already in flight, or the endpoint is known to be down. The prior
    /// log (excluding the new message) is what goes out as history.
    pub fn submit(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || self.is_busy() || !self.connected {
            return false;
        }

        self.last_error = None;
        let history = self.messages.clone();
        self.messages.push(Message::user(text));

        let transport = Arc::clone(&self.transport);
        let message = text.to_string();
        self.send_task = Some(tokio::spawn(async move {
            transport.send_message(&message, &history).await
        }));
        true
    }

    /// True once the in-flight send has completed and is ready to be joined.
    pub fn send_finished(&self) -> bool {
        self.send_task.as_ref().is_some_and(|task| task.is_finished())
    }

    /// Join the in-flight send and apply its outcome to the log.
    ///
    /// Success appends the assistant reply (with a fixed fallback for an
    /// empty one); failure rolls back the optimistic user message and
    /// records the error for the UI. No-op when nothing is in flight.
    pub async fn finish_send(&mut self) {
        let Some(task) = self.send_task.take() else {
            return;
        };

        match task.await {
            Ok(Ok(reply)) => {
                let content = if reply.trim().is_empty() {
                    FALLBACK_REPLY.to_string()
                } else {
                    reply
                };
                self.messages.push(Message::assistant(content));
            }
            Ok(Err(err)) => {
                self.messages.pop();
                self.last_error = Some(err.to_string());
            }
            Err(_) => {
                // Send task panicked; treat it like a transport failure
                self.messages.pop();
                self.last_error = Some(ApiError::Network.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubTransport {
        reply: String,
    }

    #[async_trait]
    impl ChatTransport for StubTransport {
        async fn send_message(&self, _message: &str, _history: &[Message]) -> Result<String, ApiError> {
            Ok(self.reply.clone())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl ChatTransport for FailingTransport {
        async fn send_message(&self, _message: &str, _history: &[Message]) -> Result<String, ApiError> {
            Err(ApiError::Network)
        }

        async fn health_check(&self) -> bool {
            false
        }
    }

    /// Never completes; used to hold the session busy.
    struct PendingTransport;

    #[async_trait]
    impl ChatTransport for PendingTransport {
        async fn send_message(&self, _message: &str, _history: &[Message]) -> Result<String, ApiError> {
            futures_util::future::pending().await
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    /// Records the history length seen by each call.
    struct RecordingTransport {
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        async fn send_message(&self, _message: &str, history: &[Message]) -> Result<String, ApiError> {
            self.seen.lock().unwrap().push(history.len());
            Ok("ok".to_string())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn session_with(transport: impl ChatTransport + 'static) -> ChatSession {
        ChatSession::new(Arc::new(transport))
    }

    #[tokio::test]
    async fn send_appends_user_then_assistant() {
        let mut session = session_with(StubTransport { reply: "Hi there!".into() });

        assert!(session.submit("Hello"));
        session.finish_send().await;

        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.messages[0].content, "Hello");
        assert_eq!(session.messages[1].role, Role::Assistant);
        assert_eq!(session.messages[1].content, "Hi there!");
        assert!(!session.is_busy());
        assert!(session.last_error.is_none());
    }

    #[tokio::test]
    async fn submit_while_busy_is_a_noop() {
        let mut session = session_with(PendingTransport);

        assert!(session.submit("first"));
        assert!(session.is_busy());
        assert!(!session.submit("second"));
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].content, "first");
    }

    #[tokio::test]
    async fn blank_input_is_a_noop() {
        let mut session = session_with(StubTransport { reply: "x".into() });

        assert!(!session.submit(""));
        assert!(!session.submit("   \n\t "));
        assert!(session.messages.is_empty());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn submit_while_disconnected_is_a_noop() {
        let mut session = session_with(StubTransport { reply: "x".into() });
        session.set_connected(false);

        assert!(!session.submit("hello?"));
        assert!(session.messages.is_empty());
    }

    #[tokio::test]
    async fn failed_send_rolls_back_the_user_message() {
        let mut session = session_with(StubTransport { reply: "A reply".into() });
        assert!(session.submit("A"));
        session.finish_send().await;
        assert_eq!(session.messages.len(), 2);

        // Swap in a failing transport for the second exchange
        let mut session = ChatSession {
            messages: session.messages.clone(),
            connected: true,
            last_error: None,
            transport: Arc::new(FailingTransport),
            send_task: None,
        };
        let before: Vec<String> = session.messages.iter().map(|m| m.content.clone()).collect();

        assert!(session.submit("fails"));
        session.finish_send().await;

        let after: Vec<String> = session.messages.iter().map(|m| m.content.clone()).collect();
        assert_eq!(before, after);
        assert!(!session.is_busy());
        assert_eq!(
            session.last_error.as_deref(),
            Some("Network error: Could not connect to server")
        );
    }

    #[tokio::test]
    async fn empty_reply_substitutes_the_fallback() {
        let mut session = session_with(StubTransport { reply: String::new() });

        assert!(session.submit("x"));
        session.finish_send().await;

        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn history_excludes_the_message_being_sent() {
        let transport = Arc::new(RecordingTransport { seen: Mutex::new(Vec::new()) });
        let mut session = ChatSession::new(Arc::clone(&transport) as Arc<dyn ChatTransport>);

        assert!(session.submit("one"));
        session.finish_send().await;
        assert!(session.submit("two"));
        session.finish_send().await;

        // First call sees an empty log, second sees the completed exchange
        assert_eq!(*transport.seen.lock().unwrap(), vec![0, 2]);
    }

    #[tokio::test]
    async fn submit_clears_a_previous_error() {
        let mut session = session_with(StubTransport { reply: "ok".into() });
        session.last_error = Some("stale".to_string());

        assert!(session.submit("retry"));
        assert!(session.last_error.is_none());
        session.finish_send().await;
    }

    #[test]
    fn wire_format_skips_local_id() {
        let message = Message::user("Hello");
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["role"], "user");
        assert_eq!(value["content"], "Hello");
        assert!(value.get("id").is_none());
        assert!(value.get("timestamp").is_some());
    }

    #[test]
    fn wire_format_accepts_messages_without_timestamp() {
        let message: Message =
            serde_json::from_str(r#"{"role":"assistant","content":"Hi"}"#).unwrap();

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "Hi");
        assert!(message.timestamp.is_none());
        assert!(message.id.is_empty());
    }
}
