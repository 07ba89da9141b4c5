//! Live session registry
//!
//! Sessions exist only in memory: created when a page is first opened and
//! dropped when the browser ends the session or the process exits.

use super::Session;
use crate::error::AssistantError;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

/// One render cycle at a time holds the lock
pub type SessionHandle = Arc<Mutex<Session>>;

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self) -> SessionHandle;
    async fn get(&self, id: Uuid) -> Result<SessionHandle>;
    async fn remove(&self, id: Uuid) -> Result<()>;
    async fn len(&self) -> usize;
}

pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self) -> SessionHandle {
        let session = Session::new();
        let id = session.id();
        let handle = Arc::new(Mutex::new(session));

        let mut sessions = self.sessions.write().await;
        sessions.insert(id, handle.clone());
        info!(session_id = %id, live = sessions.len(), "Session created");

        handle
    }

    async fn get(&self, id: Uuid) -> Result<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&id)
            .cloned()
            .ok_or(AssistantError::SessionNotFound(id))
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .remove(&id)
            .map(|_| info!(session_id = %id, live = sessions.len(), "Session ended"))
            .ok_or(AssistantError::SessionNotFound(id))
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
