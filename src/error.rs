//! Session and messaging errors
//!
//! Every public operation returns a [`SessionResult`]. Engine failures are
//! wrapped in the variant naming the step that failed; nothing is retried
//! here.

use crate::engine::{EngineError, MediaCategory};
use crate::media::MediaError;
use std::time::Duration;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No session for tenant '{0}'")]
    ClientNotFound(String),

    #[error("Client is not connected")]
    ClientNotConnected,

    #[error("Client is not logged in")]
    ClientNotLoggedIn,

    #[error("Recipient '{0}' is not registered")]
    RecipientNotRegistered(String),

    #[error("Connect failed: {0}")]
    ConnectFailed(#[source] EngineError),

    #[error("Device store is empty, pair the device again by scanning a new QR code")]
    StoreEmpty,

    #[error("Logout failed and local cleanup failed: {0}")]
    LogoutFailed(#[source] EngineError),

    #[error("Failed to upload {category} media: {source}")]
    UploadFailed {
        category: MediaCategory,
        #[source]
        source: EngineError,
    },

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("No pairing code received within {0:?}")]
    PairingTimeout(Duration),

    #[error("Pairing failed: {0}")]
    PairingFailed(String),

    #[error("Failed to render QR code: {0}")]
    QrRender(String),

    #[error("Send failed: {0}")]
    SendFailed(#[source] EngineError),

    #[error("Device store error: {0}")]
    Store(#[source] EngineError),

    #[error("Engine error: {0}")]
    Engine(#[source] EngineError),

    #[error("Operation cancelled by runtime shutdown")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_failure_names_category() {
        let err = SessionError::UploadFailed {
            category: MediaCategory::ImageThumbnail,
            source: EngineError::Network("reset".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Failed to upload image-thumbnail media: Network error: reset"
        );
    }

    #[test]
    fn test_store_empty_tells_caller_to_repair() {
        assert!(SessionError::StoreEmpty.to_string().contains("QR code"));
    }
}
