//! Keyed session registry
//!
//! The map itself sits behind a tokio `RwLock`; each entry is an
//! `Arc<Mutex<Session>>`, so operations on one tenant serialize while other
//! tenants proceed in parallel. Entries are inserted fully built: readers
//! never observe a half-constructed session.
//!
//! Construction runs outside the map lock, serialized per key by a creation
//! lock, so a slow datastore while creating one tenant never stalls lookups
//! for the others.

use super::Session;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, RwLock};

/// Shared, lockable handle to one tenant's session
pub type SessionHandle<C> = Arc<Mutex<Session<C>>>;

pub struct SessionRegistry<C> {
    sessions: RwLock<HashMap<String, SessionHandle<C>>>,
    creating: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<C> Default for SessionRegistry<C> {
    fn default() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            creating: StdMutex::new(HashMap::new()),
        }
    }
}

impl<C> SessionRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `key`, building and inserting it if absent.
    ///
    /// Concurrent callers for the same key wait on a per-key creation lock,
    /// so `build` runs once and they all get the same handle. The map lock
    /// is only held for the lookup and the insert. A failed build leaves no
    /// entry behind and the next caller builds again.
    pub async fn get_or_insert_with<F, Fut, E>(
        &self,
        key: &str,
        build: F,
    ) -> Result<SessionHandle<C>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Session<C>, E>>,
    {
        if let Some(existing) = self.get(key).await {
            return Ok(existing);
        }

        let slot = self.creation_slot(key);
        let result = {
            let _creating = slot.lock().await;
            match self.get(key).await {
                Some(existing) => Ok(existing),
                None => match build().await {
                    Ok(session) => {
                        let handle = Arc::new(Mutex::new(session));
                        self.sessions
                            .write()
                            .await
                            .insert(key.to_string(), Arc::clone(&handle));
                        Ok(handle)
                    }
                    Err(err) => Err(err),
                },
            }
        };
        self.release_creation_slot(key, slot);
        result
    }

    fn creation_slot(&self, key: &str) -> Arc<Mutex<()>> {
        let mut creating = self.creating.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(creating.entry(key.to_string()).or_default())
    }

    /// Drop the creation lock for `key` once no other caller is waiting on it
    fn release_creation_slot(&self, key: &str, slot: Arc<Mutex<()>>) {
        let mut creating = self.creating.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference is held by the map, one by `slot`
        if Arc::strong_count(&slot) == 2 {
            creating.remove(key);
        }
    }

    pub async fn get(&self, key: &str) -> Option<SessionHandle<C>> {
        self.sessions.read().await.get(key).cloned()
    }

    pub async fn remove(&self, key: &str) -> Option<SessionHandle<C>> {
        self.sessions.write().await.remove(key)
    }

    /// Registered tenant keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
