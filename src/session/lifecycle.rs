//! Connection lifecycle: connect, disconnect, reconnect, logout

use super::presence::announce;
use super::{Session, SessionManager, SessionState};
use crate::engine::{Engine, EngineClient, Presence};
use crate::error::{SessionError, SessionResult};
use tracing::{info, warn};

impl<C: EngineClient> Session<C> {
    /// Open the engine connection.
    ///
    /// An unpaired device stays in `AwaitingPairing` after connecting.
    pub async fn connect(&self) -> SessionResult<()> {
        self.client
            .connect()
            .await
            .map_err(SessionError::ConnectFailed)?;

        let state = if self.client.has_identity() {
            SessionState::Connected
        } else {
            SessionState::AwaitingPairing
        };
        self.state.advance(state);
        info!(tenant = %self.key, state = %state, "client connected");
        Ok(())
    }

    /// Close the engine connection. Idempotent.
    pub fn disconnect(&self) {
        self.client.disconnect();
        self.state.advance(SessionState::Disconnected);
    }

    /// Disconnect, then connect again with the stored identity
    pub async fn reconnect(&self) -> SessionResult<()> {
        self.disconnect();

        if !self.client.has_identity() {
            warn!(tenant = %self.key, "reconnect without a paired device");
            return Err(SessionError::StoreEmpty);
        }

        self.connect().await?;
        announce(self.client.as_ref(), Presence::Available).await;
        Ok(())
    }
}

impl<E: Engine> SessionManager<E> {
    pub async fn connect(&self, key: &str) -> SessionResult<()> {
        let session = self.lock_live(key).await?;
        session.connect().await
    }

    pub async fn disconnect(&self, key: &str) -> SessionResult<()> {
        let mut session = self.lock_live(key).await?;
        session.cancel_pairing();
        session.disconnect();
        info!(tenant = %key, "client disconnected");
        Ok(())
    }

    pub async fn reconnect(&self, key: &str) -> SessionResult<()> {
        let session = self.lock_live(key).await?;
        session.reconnect().await
    }

    /// Log the tenant out and forget its session.
    ///
    /// If the engine logout fails the connection is dropped and the device
    /// is deleted from the datastore directly. Only when that also fails is
    /// the error returned, and the session is kept so the caller can retry.
    pub async fn logout(&self, key: &str) -> SessionResult<()> {
        let mut session = self.lock_live(key).await?;
        session.cancel_pairing();

        announce(session.client().as_ref(), Presence::Unavailable).await;

        if let Err(err) = session.client().logout().await {
            warn!(tenant = %key, error = %err, "logout failed, removing device locally");
            session.disconnect();
            let device = session.client().device();
            self.store()
                .delete_device(&device)
                .await
                .map_err(SessionError::LogoutFailed)?;
        }

        session.state.set(SessionState::LoggedOut);
        self.registry().remove(key).await;
        info!(tenant = %key, "client logged out");
        Ok(())
    }
}
