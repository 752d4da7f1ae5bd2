//! wamd - Multi-tenant messaging session gateway
//!
//! Manages one messaging session per tenant on top of an external protocol
//! engine and sends text, location, document, image, audio, video, contact,
//! link and sticker messages through it.
//!
//! Key principles:
//! - One session per tenant key, serialized per key, parallel across keys
//! - Recipients are resolved on every send (no cache)
//! - Media is never dispatched unless every referenced upload succeeded
//! - Presence updates are advisory and always reverted after a send
//!
//! The protocol engine and device datastore are consumed through the traits
//! in [`engine`]; [`engine::MockEngine`] backs the tests.

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod logging;
pub mod media;
pub mod messaging;
pub mod session;

pub use config::GatewayConfig;
pub use error::{SessionError, SessionResult};
pub use session::{LoginOutcome, SessionManager, SessionState};
