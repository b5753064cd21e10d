use anyhow::Result;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use crate::domain::user::{User, UserId};
use crate::infra::session_store::{SessionStore, StoredSession};

/// Signed-in state shared by everything that talks to the API.
///
/// Cloning yields another handle to the same session. It is created with
/// [`Session::load`] at startup and emptied by [`Session::sign_out`].
#[derive(Clone)]
pub struct Session {
    store: SessionStore,
    current: Arc<RwLock<Option<StoredSession>>>,
}

impl Session {
    pub async fn load(store: SessionStore) -> Result<Self> {
        let current = store.load().await?;
        if let Some(session) = &current {
            info!(user_id = %session.user.id, "restored session");
        }
        Ok(Self {
            store,
            current: Arc::new(RwLock::new(current)),
        })
    }

    /// Starts signed out without reading the store.
    pub fn anonymous(store: SessionStore) -> Self {
        Self {
            store,
            current: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn sign_in(&self, token: String, user: User) -> Result<()> {
        let session = StoredSession { token, user };
        self.store.save(&session).await?;
        info!(user_id = %session.user.id, "signed in");
        *self.write() = Some(session);
        Ok(())
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.store.clear().await?;
        *self.write() = None;
        info!("signed out");
        Ok(())
    }

    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|session| session.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.read().as_ref().map(|session| session.user.clone())
    }

    pub fn viewer_id(&self) -> Option<UserId> {
        self.read().as_ref().map(|session| session.user.id)
    }

    pub fn is_signed_in(&self) -> bool {
        self.read().is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<StoredSession>> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<StoredSession>> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
