//! Collaboration sessions
//!
//! A session records one original request and the ordered rounds produced
//! for it. Rounds are append-only; round 0 is the initial analysis and
//! every later round is an iteration driven by caller feedback. The
//! registry hands out per-session locks so concurrent iterations on the
//! same session serialize while different sessions proceed in parallel.

use crate::persona::AgentContribution;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Lifecycle state of a collaboration session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Registered, no agent work started yet
    Created,
    /// Initial fan-out in progress
    Analyzing,
    /// At least one synthesized round exists
    Synthesized,
    /// An iteration round is in progress
    Iterating,
    /// Closed by shutdown; no further rounds accepted
    Closed,
}

/// One completed round of collaboration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationRound {
    /// Zero-based round index
    pub index: usize,
    /// Per-agent contributions, in roster order
    pub contributions: Vec<AgentContribution>,
    /// The synthesized document for this round
    pub synthesis: String,
    /// True when structured synthesis failed and the round fell back to
    /// plain concatenation
    pub synthesis_fallback: bool,
    /// Caller feedback that drove this round (absent for round 0)
    pub feedback: Option<String>,
    /// When the round completed
    pub created_at: DateTime<Utc>,
}

/// A collaboration session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationSession {
    /// Session id
    pub id: Uuid,
    /// The original project request
    pub request: String,
    /// Current lifecycle state
    pub state: SessionState,
    /// Append-only round history
    pub rounds: Vec<CollaborationRound>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last round or state change
    pub updated_at: DateTime<Utc>,
}

impl CollaborationSession {
    /// Create a fresh session for a request.
    #[must_use]
    pub fn new(request: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            request: request.into(),
            state: SessionState::Created,
            rounds: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a completed round and move to `Synthesized`.
    pub fn push_round(
        &mut self,
        contributions: Vec<AgentContribution>,
        synthesis: String,
        synthesis_fallback: bool,
        feedback: Option<String>,
    ) {
        let round = CollaborationRound {
            index: self.rounds.len(),
            contributions,
            synthesis,
            synthesis_fallback,
            feedback,
            created_at: Utc::now(),
        };
        self.rounds.push(round);
        self.state = SessionState::Synthesized;
        self.updated_at = Utc::now();
    }

    /// Record a state change.
    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    /// The most recent synthesized document, if any round completed.
    #[must_use]
    pub fn latest_synthesis(&self) -> Option<&str> {
        self.rounds.last().map(|r| r.synthesis.as_str())
    }

    /// Read-only status snapshot.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        let last = self.rounds.last();
        SessionStatus {
            id: self.id,
            state: self.state,
            rounds: self.rounds.len(),
            contributions_in_last_round: last.map_or(0, |r| r.contributions.len()),
            total_contributions: self.rounds.iter().map(|r| r.contributions.len()).sum(),
            degraded_contributions: self
                .rounds
                .iter()
                .flat_map(|r| r.contributions.iter())
                .filter(|c| c.degraded)
                .count(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only view of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Session id
    pub id: Uuid,
    /// Current state
    pub state: SessionState,
    /// Completed rounds
    pub rounds: usize,
    /// Contributions in the newest round
    pub contributions_in_last_round: usize,
    /// Contributions across all rounds
    pub total_contributions: usize,
    /// Degraded contributions across all rounds
    pub degraded_contributions: usize,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change time
    pub updated_at: DateTime<Utc>,
}

/// Shared handle to one session, locked per iteration
pub type SharedSession = Arc<Mutex<CollaborationSession>>;

/// Registry of live sessions
///
/// Alongside each session handle the registry keeps the last published
/// [`SessionStatus`]. Status reads serve that snapshot and never touch
/// the per-session mutex, so an in-flight iteration cannot stall them.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
    snapshots: RwLock<HashMap<Uuid, SessionStatus>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session, publish its initial snapshot and return the
    /// shared handle.
    pub async fn insert(&self, session: CollaborationSession) -> SharedSession {
        let id = session.id;
        let status = session.status();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, shared.clone());
        self.snapshots.write().await.insert(id, status);
        shared
    }

    /// Look up a session by id.
    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Publish a fresh snapshot for one session.
    pub async fn publish(&self, status: SessionStatus) {
        self.snapshots.write().await.insert(status.id, status);
    }

    /// The last published snapshot for one session.
    pub async fn status(&self, id: Uuid) -> Option<SessionStatus> {
        self.snapshots.read().await.get(&id).cloned()
    }

    /// The last published snapshot of every session.
    pub async fn statuses(&self) -> Vec<SessionStatus> {
        self.snapshots.read().await.values().cloned().collect()
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Remove every session and snapshot, returning the handles so the
    /// caller can settle final state.
    pub async fn drain(&self) -> Vec<SharedSession> {
        self.snapshots.write().await.clear();
        let mut sessions = self.sessions.write().await;
        sessions.drain().map(|(_, shared)| shared).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::AgentId;

    fn contribution(degraded: bool) -> AgentContribution {
        AgentContribution {
            agent: AgentId::Cto,
            display_name: "Chief Technology Officer".to_string(),
            content: "analysis".to_string(),
            provider: if degraded { "offline" } else { "mock" }.to_string(),
            model: "mock-model".to_string(),
            degraded,
        }
    }

    #[test]
    fn test_push_round_advances_state_and_index() {
        let mut session = CollaborationSession::new("build something");
        assert_eq!(session.state, SessionState::Created);

        session.push_round(vec![contribution(false)], "doc".to_string(), false, None);
        assert_eq!(session.state, SessionState::Synthesized);
        assert_eq!(session.rounds[0].index, 0);

        session.push_round(
            vec![contribution(false)],
            "doc v2".to_string(),
            false,
            Some("tighten scope".to_string()),
        );
        assert_eq!(session.rounds[1].index, 1);
        assert_eq!(session.latest_synthesis(), Some("doc v2"));
    }

    #[test]
    fn test_status_counts_degraded_contributions() {
        let mut session = CollaborationSession::new("req");
        session.push_round(
            vec![contribution(false), contribution(true)],
            "doc".to_string(),
            false,
            None,
        );

        let status = session.status();
        assert_eq!(status.rounds, 1);
        assert_eq!(status.contributions_in_last_round, 2);
        assert_eq!(status.total_contributions, 2);
        assert_eq!(status.degraded_contributions, 1);
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty().await);

        let session = CollaborationSession::new("req");
        let id = session.id;
        registry.insert(session).await;

        assert_eq!(registry.len().await, 1);
        assert!(registry.get(id).await.is_some());
        assert!(registry.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_reads_skip_the_session_lock() {
        let registry = SessionRegistry::new();
        let mut session = CollaborationSession::new("req");
        session.push_round(vec![contribution(false)], "doc".to_string(), false, None);
        let id = session.id;
        let published = session.status();

        let shared = registry.insert(session).await;
        let guard = shared.lock().await;

        // The session mutex is held, yet snapshot reads still answer.
        let status = registry.status(id).await.unwrap();
        assert_eq!(status.rounds, published.rounds);
        assert_eq!(status.state, SessionState::Synthesized);
        assert_eq!(registry.statuses().await.len(), 1);
        drop(guard);
    }

    #[tokio::test]
    async fn test_drain_removes_sessions_and_snapshots() {
        let registry = SessionRegistry::new();
        let session = CollaborationSession::new("req");
        let id = session.id;
        registry.insert(session).await;

        let drained = registry.drain().await;
        assert_eq!(drained.len(), 1);
        assert!(registry.is_empty().await);
        assert!(registry.status(id).await.is_none());
        assert!(registry.get(id).await.is_none());
    }
}
