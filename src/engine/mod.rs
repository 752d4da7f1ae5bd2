//! Protocol Engine Interface
//!
//! The session layer talks to the messaging network only through these
//! traits. Pairing cryptography, transport and encryption live behind them.

pub mod message;
pub mod mock;
pub mod traits;
pub mod types;

pub use message::{ContentKind, Message, MessageId, OutboundMessage};
pub use mock::{MockCall, MockClient, MockDeviceStore, MockEngine};
pub use traits::{DeviceStore, Engine, EngineClient, EngineError, EngineResult};
pub use types::*;
