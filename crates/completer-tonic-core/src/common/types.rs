//! # Protocol Constants and Message Constructors
//!
//! Helpers around the generated [`proto`](crate::proto) messages so the
//! server and client build and inspect events the same way.
//!
//! ## Event shape
//!
//! - A *delta* event sets [`Completion::delta`] and leaves `message` empty.
//! - A *terminal* event sets [`Completion::message`] and leaves `delta` empty.
//!
//! Both always carry a fresh `id` and a `model` label.

use crate::proto::{Completion, Content, Message};

/// Role attached to every message produced by the completer.
pub const ROLE_ASSISTANT: &str = "assistant";

/// Reason attached to the terminal event of a stream that ran to completion.
pub const REASON_STOP: &str = "stop";

/// Port the completer listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 50051;

impl Content {
    /// A content item carrying only a text fragment.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

impl Message {
    /// An assistant message with a single text content item.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ROLE_ASSISTANT.to_string(),
            content: vec![Content::from_text(text)],
        }
    }

    /// Concatenation of all text fragments in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .collect()
    }
}

impl Completion {
    /// A partial event carrying newly generated text.
    pub fn delta(id: impl Into<String>, model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            delta: Some(Message::assistant(text)),
            ..Default::default()
        }
    }

    /// The terminal event carrying the full response.
    pub fn message(
        id: impl Into<String>,
        model: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            reason: Some(REASON_STOP.to_string()),
            message: Some(Message::assistant(text)),
            ..Default::default()
        }
    }

    pub fn is_delta(&self) -> bool {
        self.delta.is_some() && self.message.is_none()
    }

    pub fn is_terminal(&self) -> bool {
        self.message.is_some()
    }

    /// Text carried by this event, whichever of `message` or `delta` is set.
    pub fn text(&self) -> String {
        self.message
            .as_ref()
            .or(self.delta.as_ref())
            .map(Message::text)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_event_shape() {
        let event = Completion::delta("a", "test", "Please ");
        assert!(event.is_delta());
        assert!(!event.is_terminal());
        assert_eq!(event.reason, None);

        let delta = event.delta.as_ref().unwrap();
        assert_eq!(delta.role, ROLE_ASSISTANT);
        assert_eq!(delta.content.len(), 1);
        assert_eq!(event.text(), "Please ");
    }

    #[test]
    fn terminal_event_shape() {
        let event = Completion::message("b", "human", "Hello there.");
        assert!(event.is_terminal());
        assert!(!event.is_delta());
        assert_eq!(event.reason.as_deref(), Some(REASON_STOP));
        assert_eq!(event.message.as_ref().unwrap().role, ROLE_ASSISTANT);
        assert_eq!(event.text(), "Hello there.");
    }

    #[test]
    fn message_text_skips_non_text_content() {
        let message = Message {
            role: ROLE_ASSISTANT.into(),
            content: vec![
                Content::from_text("a"),
                Content {
                    refusal: Some("no".into()),
                    ..Default::default()
                },
                Content::from_text("b"),
            ],
        };
        assert_eq!(message.text(), "ab");
    }
}
