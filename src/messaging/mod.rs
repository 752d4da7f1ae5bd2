//! Outbound messaging
//!
//! The send operations themselves are methods on
//! [`SessionManager`](crate::session::SessionManager), implemented in
//! [`composer`]. This module also holds the pieces they share: media upload,
//! contact cards and group listing.

pub mod composer;
pub mod groups;
pub mod upload;
pub mod vcard;

pub use composer::{link_message, DEFAULT_LINK_CAPTION};
pub use upload::upload;
pub use vcard::contact_card;
