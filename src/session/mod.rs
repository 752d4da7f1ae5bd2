//! Per-tenant session management
//!
//! A [`SessionManager`] owns one engine [`Session`] per tenant key and is the
//! entry point for everything a caller does: pairing, connection lifecycle,
//! outbound messages and group listing.
//!
//! Sessions are created lazily on first reference and live until logout.
//! Every operation on a tenant takes that tenant's session lock for its full
//! duration; different tenants never contend beyond the brief registry
//! lookup.

pub mod lifecycle;
pub mod login;
pub mod presence;
pub mod qr;
pub mod registry;

pub use login::LoginOutcome;
pub use presence::{with_composing, ComposingGuard};
pub use registry::{SessionHandle, SessionRegistry};

use crate::config::GatewayConfig;
use crate::engine::{Device, DeviceProps, DeviceStore, Engine, EngineClient};
use crate::error::{SessionError, SessionResult};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tracing::info;

/// Connection state of a tenant session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, never connected
    Uninitialized,
    /// Connected without an identity; a QR code is out for scanning
    AwaitingPairing,
    Connected,
    Disconnected,
    LoggedOut,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::AwaitingPairing => "awaiting_pairing",
            SessionState::Connected => "connected",
            SessionState::Disconnected => "disconnected",
            SessionState::LoggedOut => "logged_out",
        };
        f.write_str(s)
    }
}

/// Session state shared with the background pairing watcher
#[derive(Debug, Clone)]
pub(crate) struct StateCell(Arc<Mutex<SessionState>>);

impl StateCell {
    fn new(state: SessionState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    pub(crate) fn get(&self) -> SessionState {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, state: SessionState) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Move to `state` unless the session has already logged out
    pub(crate) fn advance(&self, state: SessionState) {
        let mut current = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != SessionState::LoggedOut {
            *current = state;
        }
    }
}

/// One tenant's engine client and connection state
pub struct Session<C> {
    key: String,
    client: Arc<C>,
    props: DeviceProps,
    state: StateCell,
    pairing_watch: Option<JoinHandle<()>>,
}

impl<C> Session<C> {
    pub fn new(key: impl Into<String>, client: Arc<C>, props: DeviceProps) -> Self {
        Self {
            key: key.into(),
            client,
            props,
            state: StateCell::new(SessionState::Uninitialized),
            pairing_watch: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Device properties the client was built with
    pub fn props(&self) -> &DeviceProps {
        &self.props
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Whether a background pairing watcher is still running
    pub fn is_pairing(&self) -> bool {
        self.pairing_watch
            .as_ref()
            .is_some_and(|watch| !watch.is_finished())
    }

    /// Stop the background pairing watcher, if any
    pub(crate) fn cancel_pairing(&mut self) {
        if let Some(watch) = self.pairing_watch.take() {
            watch.abort();
        }
    }
}

impl<C: EngineClient> Session<C> {
    /// Check the client can send: connected first, then logged in
    pub fn ensure_ready(&self) -> SessionResult<()> {
        if !self.client.is_connected() {
            return Err(SessionError::ClientNotConnected);
        }
        if !self.client.is_logged_in() {
            return Err(SessionError::ClientNotLoggedIn);
        }
        Ok(())
    }
}

impl<C> Drop for Session<C> {
    fn drop(&mut self) {
        self.cancel_pairing();
    }
}

/// Multi-tenant session manager
pub struct SessionManager<E: Engine> {
    engine: E,
    store: Arc<dyn DeviceStore>,
    registry: SessionRegistry<E::Client>,
    config: GatewayConfig,
}

impl<E: Engine> SessionManager<E> {
    pub fn new(engine: E, store: Arc<dyn DeviceStore>, config: GatewayConfig) -> Self {
        info!(datastore = %config.datastore.kind, "session manager ready");
        Self {
            engine,
            store,
            registry: SessionRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Return the tenant's session, creating it if absent.
    ///
    /// A supplied `device` (e.g. one loaded from the datastore) is reused;
    /// otherwise a fresh device is requested from the store. The new client
    /// is not connected.
    pub async fn get_or_create(
        &self,
        key: &str,
        device: Option<Device>,
    ) -> SessionResult<SessionHandle<E::Client>> {
        self.registry
            .get_or_insert_with(key, || self.build_session(key, device))
            .await
    }

    async fn build_session(
        &self,
        key: &str,
        device: Option<Device>,
    ) -> SessionResult<Session<E::Client>> {
        let device = match device {
            Some(device) => device,
            None => self.store.new_device().await.map_err(SessionError::Store)?,
        };
        let options = self.config.client.client_options();
        let client = self
            .engine
            .new_client(device, &options)
            .map_err(SessionError::Engine)?;

        info!(
            tenant = %key,
            platform = ?options.props.platform_type,
            paired = client.has_identity(),
            "session created"
        );
        Ok(Session::new(key, Arc::new(client), options.props))
    }

    /// Look up an existing session
    pub async fn session(&self, key: &str) -> SessionResult<SessionHandle<E::Client>> {
        self.registry
            .get(key)
            .await
            .ok_or_else(|| SessionError::ClientNotFound(key.to_string()))
    }

    /// Take the tenant's session lock.
    ///
    /// A session that was logged out while the caller waited for the lock is
    /// already gone from the registry and reports `ClientNotFound`.
    pub(crate) async fn lock_live(
        &self,
        key: &str,
    ) -> SessionResult<OwnedMutexGuard<Session<E::Client>>> {
        let session = self.session(key).await?.lock_owned().await;
        if session.state() == SessionState::LoggedOut {
            return Err(SessionError::ClientNotFound(key.to_string()));
        }
        Ok(session)
    }

    /// Registered tenant keys, sorted
    pub async fn tenants(&self) -> Vec<String> {
        self.registry.keys().await
    }

    pub async fn state(&self, key: &str) -> SessionResult<SessionState> {
        let session = self.lock_live(key).await?;
        Ok(session.state())
    }

    pub(crate) fn store(&self) -> &dyn DeviceStore {
        self.store.as_ref()
    }

    pub(crate) fn registry(&self) -> &SessionRegistry<E::Client> {
        &self.registry
    }
}
