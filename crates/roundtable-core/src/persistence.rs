//! Session persistence
//!
//! Durable storage is an external collaborator consumed only through the
//! [`SessionStore`] trait. Saves are best-effort: the orchestrator logs
//! failures and keeps going, so a broken store never blocks a round. The
//! in-memory store backs tests and single-process deployments.

use crate::error::{Error, Result};
use crate::session::CollaborationSession;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Durable session storage
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a snapshot of a session.
    async fn save_session(&self, session: &CollaborationSession) -> Result<()>;

    /// Load a previously saved session, `None` when unknown.
    async fn load_session(&self, id: Uuid) -> Result<Option<CollaborationSession>>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<Uuid, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saved sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemoryStore {
    async fn save_session(&self, session: &CollaborationSession) -> Result<()> {
        // Snapshots are stored serialized so saved state cannot alias live state
        let snapshot =
            serde_json::to_string(session).map_err(|e| Error::Store(e.to_string()))?;
        self.sessions.write().await.insert(session.id, snapshot);
        Ok(())
    }

    async fn load_session(&self, id: Uuid) -> Result<Option<CollaborationSession>> {
        match self.sessions.read().await.get(&id) {
            Some(snapshot) => {
                let session =
                    serde_json::from_str(snapshot).map_err(|e| Error::Store(e.to_string()))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let store = MemoryStore::new();
        let mut session = CollaborationSession::new("persist me");
        session.push_round(Vec::new(), "doc".to_string(), true, None);

        store.save_session(&session).await.unwrap();
        let loaded = store.load_session(session.id).await.unwrap().unwrap();

        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.request, "persist me");
        assert_eq!(loaded.state, SessionState::Synthesized);
        assert_eq!(loaded.rounds.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_id_loads_none() {
        let store = MemoryStore::new();
        assert!(store.load_session(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_prior_snapshot() {
        let store = MemoryStore::new();
        let mut session = CollaborationSession::new("v1");
        store.save_session(&session).await.unwrap();

        session.push_round(Vec::new(), "doc".to_string(), true, None);
        store.save_session(&session).await.unwrap();

        assert_eq!(store.len().await, 1);
        let loaded = store.load_session(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.rounds.len(), 1);
    }
}
