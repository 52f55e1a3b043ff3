//! Collaboration orchestrator
//!
//! Owns the agent roster, the session registry and the shared gateway.
//! `process_request` fans the brief out to every agent in parallel and
//! synthesizes round 0; `iterate_solution` appends refinement rounds to an
//! existing session. Provider trouble never surfaces as an error here: the
//! gateway absorbs it into degraded contributions and the round completes.

use crate::config::HubConfig;
use crate::error::{Error, Result};
use crate::persona::{AgentContribution, AgentId, AgentStats, PersonaAgent};
use crate::persistence::SessionStore;
use crate::session::{
    CollaborationSession, SessionRegistry, SessionState, SessionStatus, SharedSession,
};
use crate::synthesis::{concatenate, StructuredSynthesizer, Synthesizer};
use futures::future::join_all;
use roundtable_llm::{
    AnthropicConfig, AnthropicProvider, GatewayStats, GeminiConfig, GeminiProvider, LlmGateway,
    OpenAiConfig, OpenAiProvider,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Outcome of one completed round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationResult {
    /// The session the round belongs to
    pub session_id: Uuid,
    /// Zero-based round index
    pub round_index: usize,
    /// The synthesized document
    pub synthesis: String,
    /// Number of contributions in the round
    pub contributions: usize,
    /// How many of them were degraded placeholders
    pub degraded: usize,
}

/// Descriptor of one active agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Roster identity
    pub id: AgentId,
    /// Role title
    pub display_name: String,
    /// Focus statement
    pub focus: String,
    /// Whether any provider in the agent's chain is registered
    pub healthy: bool,
    /// Lifetime counters
    pub stats: AgentStats,
}

/// Aggregate statistics across agents, sessions and the gateway
#[derive(Debug, Clone, Default)]
pub struct CollaborationStats {
    /// Initialized agents
    pub active_agents: usize,
    /// Registered sessions
    pub sessions: usize,
    /// Completed rounds across all sessions
    pub total_rounds: usize,
    /// Contributions across all rounds
    pub total_contributions: usize,
    /// Degraded contributions across all rounds
    pub degraded_contributions: usize,
    /// Per-agent counters
    pub per_agent: HashMap<AgentId, AgentStats>,
    /// Gateway counters
    pub gateway: GatewayStats,
}

/// The collaboration orchestrator
pub struct CollaborationOrchestrator {
    config: HubConfig,
    gateway: Arc<LlmGateway>,
    agents: RwLock<Vec<Arc<PersonaAgent>>>,
    registry: SessionRegistry,
    synthesizer: Arc<dyn Synthesizer>,
    store: Option<Arc<dyn SessionStore>>,
}

impl CollaborationOrchestrator {
    /// Create an orchestrator, registering a provider for every configured
    /// API key. With zero keys configured it still serves, fully degraded.
    pub fn new(config: HubConfig) -> Result<Self> {
        let mut gateway = LlmGateway::new(config.gateway.clone());

        if let Some(key) = &config.openai_api_key {
            gateway.register_provider(Arc::new(OpenAiProvider::new(OpenAiConfig::new(
                key.clone(),
            ))?));
        }
        if let Some(key) = &config.anthropic_api_key {
            gateway.register_provider(Arc::new(AnthropicProvider::new(AnthropicConfig::new(
                key.clone(),
            ))?));
        }
        if let Some(key) = &config.gemini_api_key {
            gateway.register_provider(Arc::new(GeminiProvider::new(GeminiConfig::new(
                key.clone(),
            ))?));
        }

        Ok(Self::with_gateway(config, Arc::new(gateway)))
    }

    /// Create an orchestrator around an already-built gateway.
    #[must_use]
    pub fn with_gateway(config: HubConfig, gateway: Arc<LlmGateway>) -> Self {
        Self {
            config,
            gateway,
            agents: RwLock::new(Vec::new()),
            registry: SessionRegistry::new(),
            synthesizer: Arc::new(StructuredSynthesizer::new()),
            store: None,
        }
    }

    /// Replace the synthesizer.
    #[must_use]
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    /// Attach a session store. Saves are best-effort.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Shared gateway handle.
    #[must_use]
    pub fn gateway(&self) -> Arc<LlmGateway> {
        self.gateway.clone()
    }

    /// Build the full roster. Idempotent; a second call is a no-op.
    pub async fn initialize_agents(&self) {
        let mut agents = self.agents.write().await;
        if !agents.is_empty() {
            return;
        }
        for id in AgentId::ALL {
            agents.push(Arc::new(PersonaAgent::new(
                id.profile(),
                self.config.preferences_for(id),
                self.gateway.clone(),
            )));
        }
        info!(agents = agents.len(), "Agent roster initialized");
    }

    /// Run the initial collaboration for a new request: parallel fan-out
    /// to every agent, round 0 synthesis, session registration.
    #[instrument(skip(self, request))]
    pub async fn process_request(&self, request: &str) -> Result<CollaborationResult> {
        self.initialize_agents().await;
        let agents = self.agents.read().await.clone();

        let mut session = CollaborationSession::new(request);
        session.set_state(SessionState::Analyzing);
        info!(session_id = %session.id, agents = agents.len(), "Starting collaboration");

        let futures: Vec<_> = agents.iter().map(|agent| agent.analyze(request)).collect();
        let contributions = join_all(futures).await;

        let (synthesis, fallback) = self
            .synthesize_round(request, &contributions, 0, None)
            .await;
        session.push_round(contributions, synthesis, fallback, None);

        let result = round_result(&session);
        self.save_best_effort(&session).await;
        self.registry.insert(session).await;
        Ok(result)
    }

    /// Append a refinement round to an existing session.
    ///
    /// Unknown ids fail before any agent is called. Concurrent iterations
    /// on the same session serialize on the session lock; other sessions
    /// are unaffected.
    #[instrument(skip(self, feedback))]
    pub async fn iterate_solution(
        &self,
        session_id: Uuid,
        feedback: &str,
    ) -> Result<CollaborationResult> {
        let shared: SharedSession = self
            .registry
            .get(session_id)
            .await
            .ok_or(Error::InvalidSession(session_id))?;
        let agents = self.agents.read().await.clone();

        // Held across the fan-out: at most one iteration per session at a time
        let mut session = shared.lock().await;
        if session.state == SessionState::Closed {
            return Err(Error::InvalidSession(session_id));
        }
        session.set_state(SessionState::Iterating);
        self.registry.publish(session.status()).await;
        let round_index = session.rounds.len();
        let request = session.request.clone();
        // Agents see the whole session, not just the newest round
        let history = session
            .rounds
            .iter()
            .map(|round| match &round.feedback {
                Some(feedback) => format!(
                    "Round {} (feedback: {}):\n{}",
                    round.index, feedback, round.synthesis
                ),
                None => format!("Round {}:\n{}", round.index, round.synthesis),
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        info!(session_id = %session_id, round = round_index, "Starting iteration");

        let futures: Vec<_> = agents
            .iter()
            .map(|agent| agent.iterate(&request, &history, feedback))
            .collect();
        let contributions = join_all(futures).await;

        let (synthesis, fallback) = self
            .synthesize_round(&request, &contributions, round_index, Some(feedback))
            .await;
        session.push_round(contributions, synthesis, fallback, Some(feedback.to_string()));
        self.registry.publish(session.status()).await;

        let result = round_result(&session);
        self.save_best_effort(&session).await;
        Ok(result)
    }

    async fn synthesize_round(
        &self,
        request: &str,
        contributions: &[AgentContribution],
        round_index: usize,
        feedback: Option<&str>,
    ) -> (String, bool) {
        match self
            .synthesizer
            .synthesize(request, contributions, round_index, feedback)
            .await
        {
            Ok(synthesis) => (synthesis, false),
            Err(e) => {
                warn!(error = %e, "Synthesis failed, falling back to concatenation");
                (concatenate(contributions), true)
            }
        }
    }

    async fn save_best_effort(&self, session: &CollaborationSession) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_session(session).await {
                warn!(session_id = %session.id, error = %e, "Session save failed");
            }
        }
    }

    /// Read-only status snapshot for one session.
    ///
    /// Served from the registry's published snapshots; an iteration
    /// holding the session lock cannot delay this call.
    pub async fn get_session_status(&self, session_id: Uuid) -> Result<SessionStatus> {
        self.registry
            .status(session_id)
            .await
            .ok_or(Error::InvalidSession(session_id))
    }

    /// Descriptors for every initialized agent.
    pub async fn get_active_agents(&self) -> Vec<AgentDescriptor> {
        let agents = self.agents.read().await.clone();
        let mut descriptors = Vec::with_capacity(agents.len());
        for agent in &agents {
            let profile = agent.profile();
            descriptors.push(AgentDescriptor {
                id: profile.id,
                display_name: profile.display_name.clone(),
                focus: profile.focus.clone(),
                healthy: agent.health_status().await,
                stats: agent.stats(),
            });
        }
        descriptors
    }

    /// Aggregate statistics across agents, sessions and the gateway.
    pub async fn get_collaboration_stats(&self) -> CollaborationStats {
        let agents = self.agents.read().await.clone();
        let per_agent: HashMap<AgentId, AgentStats> =
            agents.iter().map(|a| (a.id(), a.stats())).collect();

        // Published snapshots only; never waits on a session lock
        let statuses = self.registry.statuses().await;
        let mut total_rounds = 0;
        let mut total_contributions = 0;
        let mut degraded_contributions = 0;
        for status in &statuses {
            total_rounds += status.rounds;
            total_contributions += status.total_contributions;
            degraded_contributions += status.degraded_contributions;
        }

        CollaborationStats {
            active_agents: agents.len(),
            sessions: statuses.len(),
            total_rounds,
            total_contributions,
            degraded_contributions,
            per_agent,
            gateway: self.gateway.stats().await,
        }
    }

    /// Close and release every session, then drop the roster. Idempotent
    /// and safe to call before initialization.
    pub async fn shutdown(&self) {
        let drained = self.registry.drain().await;
        let released = drained.len();
        for shared in drained {
            let mut session = shared.lock().await;
            if session.state != SessionState::Closed {
                session.set_state(SessionState::Closed);
            }
        }
        if released > 0 {
            info!(sessions = released, "Sessions released");
        }
        let mut agents = self.agents.write().await;
        if !agents.is_empty() {
            info!(agents = agents.len(), "Orchestrator shut down");
            agents.clear();
        }
    }
}

fn round_result(session: &CollaborationSession) -> CollaborationResult {
    // push_round has always run by the time this is called
    let last = session.rounds.last();
    CollaborationResult {
        session_id: session.id,
        round_index: session.rounds.len().saturating_sub(1),
        synthesis: last.map_or_else(String::new, |r| r.synthesis.clone()),
        contributions: last.map_or(0, |r| r.contributions.len()),
        degraded: last.map_or(0, |r| r.contributions.iter().filter(|c| c.degraded).count()),
    }
}

// ============================================================================
// Tests
// ============================================================================
