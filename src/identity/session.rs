use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::SessionError;
use crate::identity::token::{IdToken, TokenProvider};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(Option<&Identity>) + Send + Sync>;

#[derive(Default)]
struct SessionState {
    identity: Option<Identity>,
    token: Option<IdToken>,
}

/// Process-wide holder of the signed-in practitioner.
///
/// Reads are cheap and frequent; writes happen on sign-in and sign-out. Listeners
/// run after the state lock is released, so they may read the store freely.
#[derive(Default)]
pub struct SessionStore {
    state: RwLock<SessionState>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static SessionStore {
        static STORE: OnceLock<SessionStore> = OnceLock::new();
        STORE.get_or_init(SessionStore::new)
    }

    pub fn current(&self) -> Option<Identity> {
        self.state.read().ok().and_then(|s| s.identity.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    pub fn sign_in(&self, identity: Identity) -> Result<(), SessionError> {
        tracing::info!(uid = %identity.uid, "Session started");
        self.replace_identity(Some(identity))
    }

    pub fn sign_out(&self) -> Result<(), SessionError> {
        tracing::info!("Session ended");
        self.replace_identity(None)
    }

    /// Listeners are only told about changes that actually landed.
    fn replace_identity(&self, identity: Option<Identity>) -> Result<(), SessionError> {
        {
            let mut state = self.state.write().map_err(|_| SessionError::Poisoned)?;
            state.identity = identity;
            state.token = None;
        }
        self.notify();
        Ok(())
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(Option<&Identity>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((id, Arc::new(listener)));
        }
        id
    }

    /// Returns false when the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Ok(mut listeners) = self.listeners.lock() else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(sub, _)| *sub != id);
        listeners.len() != before
    }

    /// Cached ID token, re-minted when close to expiry or when `refresh_time`
    /// (the per-user flag kept in the document store) is newer than the token.
    pub async fn id_token(
        &self,
        provider: &dyn TokenProvider,
        refresh_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<IdToken, SessionError> {
        let cached = {
            let state = self.state.read().map_err(|_| SessionError::Poisoned)?;
            if state.identity.is_none() {
                return Err(SessionError::SignedOut);
            }
            state.token.clone()
        };

        let force_refresh = match &cached {
            Some(token) if !token.needs_refresh(now) && !token.stale_after(refresh_time) => {
                return Ok(token.clone());
            }
            Some(_) => true,
            None => false,
        };

        tracing::debug!(force_refresh, "Fetching ID token");
        let mut token = provider.fetch_id_token(force_refresh).await?;
        if !force_refresh && token.stale_after(refresh_time) {
            token = provider.fetch_id_token(true).await?;
        }
        if !token.is_valid(now) {
            return Err(SessionError::TokenExpired);
        }

        let mut state = self.state.write().map_err(|_| SessionError::Poisoned)?;
        if state.identity.is_none() {
            return Err(SessionError::SignedOut);
        }
        state.token = Some(token.clone());
        Ok(token)
    }

    fn notify(&self) {
        let identity = self.current();
        let listeners: Vec<Listener> = match self.listeners.lock() {
            Ok(listeners) => listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(identity.as_ref());
        }
    }
}
