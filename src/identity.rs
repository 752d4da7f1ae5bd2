//! Recipient identity normalization and resolution
//!
//! Callers address recipients with loosely formatted ids: bare numbers,
//! `+`-prefixed numbers, full `user@server` identifiers, or group ids. This
//! module reduces them to a bare id, classifies them as group or user, and
//! asks the engine whether the result is registered.
//!
//! # Classification
//!
//! A decomposed id is a **group** id when it contains `-` (legacy
//! `creator-timestamp` groups) or is at least [`GROUP_ID_MIN_LEN`] characters
//! long. Everything else is a standard user id.
//!
//! Resolution is never cached: registration status can change between sends.

use crate::engine::{EngineClient, Jid};
use crate::error::{SessionError, SessionResult};
use tracing::debug;

/// Minimum length of a decomposed id that is treated as a group id
pub const GROUP_ID_MIN_LEN: usize = 18;

/// Strip the server part and leading `+` from an id.
///
/// Everything from the first `@` onward is dropped, then leading `+` signs.
/// Applying it twice gives the same result as applying it once.
pub fn decompose(id: &str) -> &str {
    let local = match id.find('@') {
        Some(at) => &id[..at],
        None => id,
    };
    local.trim_start_matches('+')
}

/// Whether a decomposed id names a group
pub fn is_group_id(id: &str) -> bool {
    id.contains('-') || id.len() >= GROUP_ID_MIN_LEN
}

/// Build the network identifier for a raw id.
pub fn compose(id: &str) -> Jid {
    let id = decompose(id);
    if is_group_id(id) {
        Jid::group(id)
    } else {
        Jid::user(id)
    }
}

/// Resolve a raw id to the canonical identifier reported by the engine.
///
/// Returns `Ok(None)` when the id is not registered on the network.
pub async fn resolve<C: EngineClient + ?Sized>(client: &C, id: &str) -> SessionResult<Option<Jid>> {
    let composed = compose(id);
    let query = format!("+{}", composed.user);

    let infos = client
        .is_on_network(std::slice::from_ref(&query))
        .await
        .map_err(SessionError::Engine)?;

    let resolved = infos
        .into_iter()
        .find(|info| info.registered)
        .map(|info| info.jid);

    debug!(recipient = %composed, registered = resolved.is_some(), "resolved recipient");
    Ok(resolved)
}
