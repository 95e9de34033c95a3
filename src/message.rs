//! Normalized message model.
//!
//! Provider-specific payloads are normalized into this shape before they reach the relay, so
//! buffering and the responder hand-off stay provider-agnostic.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Kind of content carried by a message.
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
/// The sender a message is attributed to. The phone number is the buffering key.
pub struct Sender {
    pub phone: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One normalized inbound message.
pub struct MessageRecord {
    pub kind: MessageKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Text content, or the caption for media messages.
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Public URL of already-fetched media.
    pub media_url: Option<String>,

    /// Unix timestamp (milliseconds) of the original message.
    pub timestamp: u64,
}

#[derive(Debug, Clone, Deserialize)]
/// Ingest envelope: a message together with its sender.
pub struct IncomingEnvelope {
    pub sender: Sender,
    pub message: MessageRecord,
}
