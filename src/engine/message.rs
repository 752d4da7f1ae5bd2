//! Outbound protocol messages
//!
//! One payload struct per content variant. Media-bearing payloads can only be
//! built from an [`UploadedHandle`], so a message never points at a blob that
//! has not finished uploading.

use super::types::{Jid, UploadedHandle};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier generated for every send attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a fresh id: `3EB0` followed by 16 upper-case hex digits.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(format!("3EB0{}", hex::encode_upper(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content-type tag of an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Location,
    Document,
    Image,
    Audio,
    Video,
    Contact,
    Link,
    Sticker,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentKind::Text => "text",
            ContentKind::Location => "location",
            ContentKind::Document => "document",
            ContentKind::Image => "image",
            ContentKind::Audio => "audio",
            ContentKind::Video => "video",
            ContentKind::Contact => "contact",
            ContentKind::Link => "link",
            ContentKind::Sticker => "sticker",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMessage {
    pub media: UploadedHandle,
    pub mimetype: String,
    pub title: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageMessage {
    pub media: UploadedHandle,
    pub mimetype: String,
    pub caption: Option<String>,
    /// Inline JPEG thumbnail bytes
    pub jpeg_thumbnail: Vec<u8>,
    /// Separately uploaded thumbnail (direct path and hashes are used)
    pub thumbnail: UploadedHandle,
    pub view_once: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioMessage {
    pub media: UploadedHandle,
    pub mimetype: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoMessage {
    pub media: UploadedHandle,
    pub mimetype: String,
    pub caption: Option<String>,
    pub view_once: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactMessage {
    pub display_name: String,
    pub vcard: String,
}

/// Button attached to a link message
#[derive(Debug, Clone, PartialEq)]
pub struct ActionLink {
    pub url: String,
    pub button_title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkMessage {
    pub text: String,
    pub matched_text: String,
    pub canonical_url: String,
    pub action_link: ActionLink,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StickerMessage {
    pub media: UploadedHandle,
    pub mimetype: String,
}

/// Protocol message payload
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text { body: String },
    Location { latitude: f64, longitude: f64 },
    Document(DocumentMessage),
    Image(ImageMessage),
    Audio(AudioMessage),
    Video(VideoMessage),
    Contact(ContactMessage),
    Link(LinkMessage),
    Sticker(StickerMessage),
}

impl Message {
    pub fn kind(&self) -> ContentKind {
        match self {
            Message::Text { .. } => ContentKind::Text,
            Message::Location { .. } => ContentKind::Location,
            Message::Document(_) => ContentKind::Document,
            Message::Image(_) => ContentKind::Image,
            Message::Audio(_) => ContentKind::Audio,
            Message::Video(_) => ContentKind::Video,
            Message::Contact(_) => ContentKind::Contact,
            Message::Link(_) => ContentKind::Link,
            Message::Sticker(_) => ContentKind::Sticker,
        }
    }
}

/// A message ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub id: MessageId,
    pub recipient: Jid,
    pub content: Message,
}

impl OutboundMessage {
    pub fn new(recipient: Jid, content: Message) -> Self {
        Self {
            id: MessageId::generate(),
            recipient,
            content,
        }
    }

    pub fn kind(&self) -> ContentKind {
        self.content.kind()
    }
}
