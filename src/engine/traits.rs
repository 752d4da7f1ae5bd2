//! Protocol Engine Trait Abstractions
//!
//! The protocol engine (pairing, transport, encryption) and the device
//! datastore are external collaborators. These traits are the only surface
//! the session layer consumes, which lets `MockEngine` stand in for a real
//! engine in tests.

use super::message::OutboundMessage;
use super::types::*;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine and datastore errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Client is not connected")]
    NotConnected,

    #[error("Rejected by server: {0}")]
    Rejected(String),
}

/// Builds engine clients from device records
pub trait Engine: Send + Sync + 'static {
    type Client: EngineClient;

    /// Construct a client for `device`. Does not open a connection.
    fn new_client(&self, device: Device, options: &ClientOptions) -> EngineResult<Self::Client>;
}

/// A single engine client bound to one device
///
/// Presence updates (`send_presence`, `send_chat_presence`) are advisory:
/// callers log their failures and carry on.
#[async_trait]
pub trait EngineClient: Send + Sync + 'static {
    /// Current device record (identity changes after pairing or logout)
    fn device(&self) -> Device;

    fn has_identity(&self) -> bool {
        self.device().has_identity()
    }

    fn is_connected(&self) -> bool;

    fn is_logged_in(&self) -> bool;

    /// Open the transport and run the handshake
    async fn connect(&self) -> EngineResult<()>;

    /// Close the transport. Best-effort and idempotent.
    fn disconnect(&self);

    /// Invalidate the pairing on the server side
    async fn logout(&self) -> EngineResult<()>;

    /// Subscribe to pairing events for the next `connect`
    ///
    /// The engine produces events on a background task and closes the
    /// channel once pairing finishes.
    async fn pairing_events(&self) -> EngineResult<mpsc::Receiver<PairingEvent>>;

    async fn send_message(&self, message: &OutboundMessage) -> EngineResult<()>;

    /// Encrypt and push a blob to media storage
    async fn upload(&self, data: &[u8], category: MediaCategory) -> EngineResult<UploadedHandle>;

    /// Check whether phone numbers (`+digits`) are registered on the network
    async fn is_on_network(&self, phones: &[String]) -> EngineResult<Vec<RegistrationInfo>>;

    async fn joined_groups(&self) -> EngineResult<Vec<GroupInfo>>;

    async fn send_presence(&self, presence: Presence) -> EngineResult<()>;

    async fn send_chat_presence(
        &self,
        chat: &Jid,
        state: ChatPresence,
        media: ChatPresenceMedia,
    ) -> EngineResult<()>;
}

/// Persistent device datastore
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Create a fresh, unpaired device record
    async fn new_device(&self) -> EngineResult<Device>;

    /// Delete a device record and its keys
    async fn delete_device(&self, device: &Device) -> EngineResult<()>;
}
