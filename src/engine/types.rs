//! Engine Data Types
//!
//! Plain values exchanged with the protocol engine: network identifiers,
//! device records and properties, presence enums, upload handles, group
//! metadata and pairing events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Server part of a standard user identifier
pub const USER_SERVER: &str = "s.whatsapp.net";

/// Server part of a group identifier
pub const GROUP_SERVER: &str = "g.us";

/// Network server an identifier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Server {
    User,
    Group,
}

impl Server {
    pub fn as_str(&self) -> &'static str {
        match self {
            Server::User => USER_SERVER,
            Server::Group => GROUP_SERVER,
        }
    }
}

/// Network identifier (`user@server`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Jid {
    pub user: String,
    pub server: Server,
}

impl Jid {
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: Server::User,
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self {
            user: id.into(),
            server: Server::Group,
        }
    }

    pub fn is_group(&self) -> bool {
        self.server == Server::Group
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server.as_str())
    }
}

/// Device record held by the datastore
///
/// `id` is the durable device identity. It is `None` until a pairing
/// completes and is cleared again by logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub registration_id: u32,
    pub id: Option<Jid>,
}

impl Device {
    pub fn new(registration_id: u32) -> Self {
        Self {
            registration_id,
            id: None,
        }
    }

    pub fn paired(registration_id: u32, id: Jid) -> Self {
        Self {
            registration_id,
            id: Some(id),
        }
    }

    pub fn has_identity(&self) -> bool {
        self.id.is_some()
    }
}

/// Platform type advertised in the device properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformType {
    Unknown,
    Desktop,
    Catalina,
    AndroidAmbiguous,
    AndroidPhone,
    AndroidTablet,
    IosPhone,
    IosCatalyst,
    Ipad,
    WearOs,
    Ie,
    Edge,
    Chrome,
    Firefox,
    Opera,
    Aloha,
    TclTv,
}

impl PlatformType {
    /// Map a configured platform tag to its platform type.
    ///
    /// Matching is case-insensitive. Tags outside the known set map to
    /// `PlatformType::Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "desktop" => PlatformType::Desktop,
            "mac" => PlatformType::Catalina,
            "android" => PlatformType::AndroidAmbiguous,
            "android-phone" => PlatformType::AndroidPhone,
            "android-tablet" => PlatformType::AndroidTablet,
            "ios-phone" => PlatformType::IosPhone,
            "ios-catalyst" => PlatformType::IosCatalyst,
            "ipad" => PlatformType::Ipad,
            "wearos" => PlatformType::WearOs,
            "ie" => PlatformType::Ie,
            "edge" => PlatformType::Edge,
            "chrome" => PlatformType::Chrome,
            "firefox" => PlatformType::Firefox,
            "opera" => PlatformType::Opera,
            "aloha" => PlatformType::Aloha,
            "tv-tcl" => PlatformType::TclTv,
            _ => PlatformType::Unknown,
        }
    }
}

/// Application version override (`major.minor.patch`)
///
/// Each part is optional; missing parts keep the engine's built-in value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppVersion {
    pub major: Option<u32>,
    pub minor: Option<u32>,
    pub patch: Option<u32>,
}

/// Device properties set once when a session is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProps {
    pub os: String,
    pub platform_type: PlatformType,
    pub version: AppVersion,
    pub require_full_sync: bool,
}

/// Options used to construct an engine client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub props: DeviceProps,
    pub proxy_url: Option<String>,
    pub auto_reconnect: bool,
    pub auto_trust_identity: bool,
}

/// Global presence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Available,
    Unavailable,
}

/// Chat-level composing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPresence {
    Composing,
    Paused,
}

/// What the local user is composing (typing or recording)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPresenceMedia {
    Text,
    Audio,
}

/// Blob storage category for uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaCategory {
    Document,
    Image,
    ImageThumbnail,
    Audio,
    Video,
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaCategory::Document => "document",
            MediaCategory::Image => "image",
            MediaCategory::ImageThumbnail => "image-thumbnail",
            MediaCategory::Audio => "audio",
            MediaCategory::Video => "video",
        };
        f.write_str(name)
    }
}

/// Reference and integrity material for an uploaded blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedHandle {
    pub url: String,
    pub direct_path: String,
    pub file_length: u64,
    pub file_sha256: Vec<u8>,
    pub file_enc_sha256: Vec<u8>,
    pub media_key: Vec<u8>,
}

/// Result of a registration check for one queried identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationInfo {
    pub query: String,
    pub jid: Jid,
    pub registered: bool,
}

/// Joined group metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub jid: Jid,
    pub name: String,
    pub topic: Option<String>,
    pub participants: Vec<Jid>,
    pub announce_only: bool,
    pub locked: bool,
}

/// Event produced by the engine while a new device is pairing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// A code to render as QR, valid for `timeout`
    Code { code: String, timeout: Duration },
    /// The account scanned the code; the device now has an identity
    Success,
    /// No code was scanned before the engine gave up
    Timeout,
    /// Pairing failed on the engine side
    Error(String),
}
