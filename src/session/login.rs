//! QR pairing and login
//!
//! # Flow
//! 1. Drop any existing connection
//! 2. Paired device: reconnect and report `Reconnected`
//! 3. Unpaired device: subscribe to pairing events, connect, and wait for the
//!    first code (bounded by `pairing.code_timeout`)
//! 4. Render the code as a QR data URI and return it
//! 5. A background watcher follows the rest of the pairing for at most
//!    `pairing.pairing_window`, marking the session connected on success

use super::presence::announce;
use super::{qr, SessionManager, SessionState, StateCell};
use crate::engine::{Engine, EngineClient, PairingEvent, Presence};
use crate::error::{SessionError, SessionResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of a login request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginOutcome {
    /// Scan `qr_image` (a PNG data URI) within `expires_in_secs`
    Pairing {
        qr_image: String,
        expires_in_secs: u64,
    },
    /// The device was already paired and is connected again
    Reconnected,
}

impl LoginOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            LoginOutcome::Pairing { .. } => "scan the QR code to pair the device",
            LoginOutcome::Reconnected => "client reconnected",
        }
    }

    pub fn qr_image(&self) -> Option<&str> {
        match self {
            LoginOutcome::Pairing { qr_image, .. } => Some(qr_image),
            LoginOutcome::Reconnected => None,
        }
    }

    pub fn expires_in_secs(&self) -> u64 {
        match self {
            LoginOutcome::Pairing {
                expires_in_secs, ..
            } => *expires_in_secs,
            LoginOutcome::Reconnected => 0,
        }
    }
}

impl<E: Engine> SessionManager<E> {
    /// Start pairing the tenant's device, or reconnect it if already paired
    pub async fn login(&self, key: &str) -> SessionResult<LoginOutcome> {
        let mut session = self.lock_live(key).await?;

        session.cancel_pairing();
        session.disconnect();

        if session.client().has_identity() {
            session.reconnect().await?;
            info!(tenant = %key, "paired device reconnected");
            return Ok(LoginOutcome::Reconnected);
        }

        let mut events = session
            .client()
            .pairing_events()
            .await
            .map_err(SessionError::Engine)?;

        let code_timeout = self.config().pairing.code_timeout;
        let first = tokio::try_join!(session.connect(), first_code(&mut events, code_timeout));
        let (code, expires) = match first {
            Ok(((), first)) => first,
            Err(err) => {
                session.disconnect();
                return Err(err);
            }
        };

        let qr_image = qr::render_data_uri(&code)?;

        let watch = spawn_pairing_watch(
            key.to_string(),
            Arc::clone(session.client()),
            session.state.clone(),
            events,
            self.config().pairing.pairing_window,
        );
        session.pairing_watch = Some(watch);

        info!(tenant = %key, expires_in = ?expires, "pairing code issued");
        Ok(LoginOutcome::Pairing {
            qr_image,
            expires_in_secs: expires.as_secs(),
        })
    }
}

/// Wait for the first pairing code on the feed
async fn first_code(
    events: &mut mpsc::Receiver<PairingEvent>,
    timeout: Duration,
) -> SessionResult<(String, Duration)> {
    let wait = async {
        while let Some(event) = events.recv().await {
            match event {
                PairingEvent::Code { code, timeout } => return Ok((code, timeout)),
                PairingEvent::Success => debug!("pairing success before a code was issued"),
                PairingEvent::Timeout => {
                    return Err(SessionError::PairingFailed(
                        "engine timed out before issuing a code".to_string(),
                    ))
                }
                PairingEvent::Error(reason) => return Err(SessionError::PairingFailed(reason)),
            }
        }
        Err(SessionError::PairingFailed(
            "pairing feed closed before a code was issued".to_string(),
        ))
    };

    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| SessionError::PairingTimeout(timeout))?
}

/// Follow the remaining pairing events in the background
fn spawn_pairing_watch<C: EngineClient>(
    key: String,
    client: Arc<C>,
    state: StateCell,
    mut events: mpsc::Receiver<PairingEvent>,
    window: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let watch = async {
            while let Some(event) = events.recv().await {
                match event {
                    PairingEvent::Code { .. } => debug!(tenant = %key, "pairing code refreshed"),
                    PairingEvent::Success => {
                        state.advance(SessionState::Connected);
                        info!(tenant = %key, "device paired");
                        announce(client.as_ref(), Presence::Available).await;
                        return;
                    }
                    PairingEvent::Timeout => {
                        state.advance(SessionState::Disconnected);
                        warn!(tenant = %key, "pairing code expired without a scan");
                        return;
                    }
                    PairingEvent::Error(reason) => {
                        state.advance(SessionState::Disconnected);
                        warn!(tenant = %key, error = %reason, "pairing failed");
                        return;
                    }
                }
            }
            debug!(tenant = %key, "pairing feed closed");
        };

        if tokio::time::timeout(window, watch).await.is_err() {
            warn!(tenant = %key, window = ?window, "pairing window elapsed");
        }
    })
}
