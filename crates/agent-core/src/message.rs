//! Conversational Protocol
//!
//! Message kinds exchanged between external clients and the router agent:
//! session start/end signals, text, capability metadata and structured data.
//! Every inbound [`ChatMessage`] is acknowledged before any substantive reply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One item of message content
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Client opens a conversation
    StartSession,

    /// Free text
    Text { text: String },

    /// Capability advertisement or routing metadata
    Metadata { metadata: HashMap<String, String> },

    /// Structured payload (e.g. a yield table)
    Data { data: serde_json::Value },

    /// Client closes the conversation
    EndSession,
}

impl std::fmt::Display for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartSession => write!(f, "start_session"),
            Self::Text { .. } => write!(f, "text"),
            Self::Metadata { .. } => write!(f, "metadata"),
            Self::Data { .. } => write!(f, "data"),
            Self::EndSession => write!(f, "end_session"),
        }
    }
}

/// A protocol message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message id, used for acknowledgement and dedupe
    #[serde(default = "Uuid::new_v4")]
    pub msg_id: Uuid,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Id of the message this one answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<Uuid>,

    /// Ordered content items
    #[serde(default)]
    pub content: Vec<Content>,
}

impl ChatMessage {
    /// Create a message from content items
    pub fn new(content: Vec<Content>) -> Self {
        Self {
            msg_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            in_reply_to: None,
            content,
        }
    }

    /// Create a text message
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![Content::Text { text: text.into() }])
    }

    pub fn start_session() -> Self {
        Self::new(vec![Content::StartSession])
    }

    pub fn end_session() -> Self {
        Self::new(vec![Content::EndSession])
    }

    /// Mark as a reply to another message
    pub const fn replying_to(mut self, msg_id: Uuid) -> Self {
        self.in_reply_to = Some(msg_id);
        self
    }

    /// Add a metadata entry, merging into an existing metadata item
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value) = (key.into(), value.into());
        let existing = self.content.iter_mut().find_map(|item| match item {
            Content::Metadata { metadata } => Some(metadata),
            _ => None,
        });
        if let Some(metadata) = existing {
            metadata.insert(key, value);
        } else {
            self.content.push(Content::Metadata {
                metadata: HashMap::from([(key, value)]),
            });
        }
        self
    }

    /// Attach a structured payload
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.content.push(Content::Data { data });
        self
    }

    /// First text item, if any
    pub fn text_content(&self) -> Option<&str> {
        self.content.iter().find_map(|item| match item {
            Content::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Look up a metadata value
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.content.iter().find_map(|item| match item {
            Content::Metadata { metadata } => metadata.get(key).map(String::as_str),
            _ => None,
        })
    }

    /// First structured payload, if any
    pub fn data(&self) -> Option<&serde_json::Value> {
        self.content.iter().find_map(|item| match item {
            Content::Data { data } => Some(data),
            _ => None,
        })
    }
}

/// Receipt for an inbound message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAcknowledgement {
    pub acknowledged_msg_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl ChatAcknowledgement {
    pub fn of(message: &ChatMessage) -> Self {
        Self {
            acknowledged_msg_id: message.msg_id,
            timestamp: Utc::now(),
        }
    }
}

/// Frame delivered to a client: either an acknowledgement or a message
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "frame", content = "body", rename_all = "snake_case")]
pub enum ClientFrame {
    Ack(ChatAcknowledgement),
    Message(ChatMessage),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_merges() {
        let msg = ChatMessage::text("hello")
            .with_metadata("intent", "yield_analysis")
            .with_metadata("success", "true");

        assert_eq!(msg.content.len(), 2);
        assert_eq!(msg.text_content(), Some("hello"));
        assert_eq!(msg.metadata_value("intent"), Some("yield_analysis"));
        assert_eq!(msg.metadata_value("success"), Some("true"));
    }

    #[test]
    fn test_wire_format() {
        let json = r#"{"content":[{"type":"start_session"},{"type":"text","text":"hi"}]}"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();

        assert_eq!(msg.content[0], Content::StartSession);
        assert_eq!(msg.text_content(), Some("hi"));
        assert!(msg.in_reply_to.is_none());
    }

    #[test]
    fn test_ack_frame_serialization() {
        let msg = ChatMessage::text("hi");
        let frame = ClientFrame::Ack(ChatAcknowledgement::of(&msg));
        let value = serde_json::to_value(&frame).unwrap();

        assert_eq!(value["frame"], "ack");
        assert_eq!(value["body"]["acknowledged_msg_id"], msg.msg_id.to_string());
    }
}
