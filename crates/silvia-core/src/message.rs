use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::LifecycleEvent;

/// An incoming message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Channel name (e.g. "whatsapp").
    pub channel: String,
    /// Platform message ID, when the channel reports one.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Platform-specific sender address (e.g. `628123456789@c.us`).
    pub sender_id: String,
    /// Message text content.
    pub text: String,
    /// Whether the message was written by the bot's own account.
    #[serde(default)]
    pub from_me: bool,
    /// Whether the message quotes another message.
    #[serde(default)]
    pub has_quoted_msg: bool,
    pub timestamp: DateTime<Utc>,
}

impl IncomingMessage {
    /// Build a message as received from `channel`, stamped now.
    pub fn new(channel: &str, sender_id: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.to_string(),
            message_id: None,
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            from_me: false,
            has_quoted_msg: false,
            timestamp: Utc::now(),
        }
    }

    /// Short single-line preview for logs.
    pub fn preview(&self, max_chars: usize) -> String {
        let flat = self.text.replace('\n', " ");
        if flat.chars().count() > max_chars {
            let truncated: String = flat.chars().take(max_chars).collect();
            format!("{truncated}...")
        } else {
            flat
        }
    }
}

/// An outgoing message to send back through a channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    pub metadata: MessageMetadata,
    /// Platform-specific target address for the reply.
    #[serde(default)]
    pub reply_target: Option<String>,
}

/// Metadata about how a reply was generated.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessageMetadata {
    /// Which provider produced this response. Empty for fallback replies.
    pub provider_used: String,
    /// Model identifier (if applicable).
    pub model: Option<String>,
    /// Number of streamed fragments that made up the answer.
    pub chunks: usize,
    /// Wall-clock processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Everything a channel can report to the gateway.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Session lifecycle change (QR, auth, ready, disconnect).
    Lifecycle(LifecycleEvent),
    /// An inbound chat message.
    Message(IncomingMessage),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_defaults() {
        let msg = IncomingMessage::new("whatsapp", "628111@c.us", "hello");
        assert_eq!(msg.channel, "whatsapp");
        assert!(!msg.from_me);
        assert!(!msg.has_quoted_msg);
        assert!(msg.message_id.is_none());
    }

    #[test]
    fn test_preview_truncates_and_flattens() {
        let msg = IncomingMessage::new("whatsapp", "x", "line one\nline two is longer");
        assert_eq!(msg.preview(8), "line one...");
        assert_eq!(msg.preview(100), "line one line two is longer");
    }
}
