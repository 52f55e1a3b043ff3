//! Persona agents
//!
//! The fixed roster of specialist agents that participate in every
//! collaboration. Each agent is a thin persona wrapper over the gateway:
//! it frames the prompt with its role, calls through its own model
//! preference chain, and counts its interactions.

use roundtable_llm::{provider_for_model, LlmGateway, ModelCallRequest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Roster
// ============================================================================

/// Identifier for each specialist on the fixed roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    /// Chief technology officer: strategy and innovation
    Cto,
    /// Software architect: system design and scalability
    SoftwareArchitect,
    /// Full-stack engineer: end-to-end implementation
    FullStack,
    /// Mobile engineer: iOS/Android delivery
    MobileEngineer,
    /// UX/UI designer: experience and interface design
    UxUiDesigner,
    /// QA automation engineer: quality and test strategy
    QaAutomation,
    /// DevOps and data engineer: infrastructure and pipelines
    DevOpsData,
    /// Agile project manager: planning and delivery process
    AgilePm,
}

impl AgentId {
    /// Every agent on the roster, in synthesis order.
    pub const ALL: [AgentId; 8] = [
        AgentId::Cto,
        AgentId::SoftwareArchitect,
        AgentId::FullStack,
        AgentId::MobileEngineer,
        AgentId::UxUiDesigner,
        AgentId::QaAutomation,
        AgentId::DevOpsData,
        AgentId::AgilePm,
    ];

    /// Stable machine-readable name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Cto => "cto",
            AgentId::SoftwareArchitect => "software_architect",
            AgentId::FullStack => "full_stack",
            AgentId::MobileEngineer => "mobile_engineer",
            AgentId::UxUiDesigner => "ux_ui_designer",
            AgentId::QaAutomation => "qa_automation",
            AgentId::DevOpsData => "devops_data",
            AgentId::AgilePm => "agile_pm",
        }
    }

    /// Default persona profile for this agent
    #[must_use]
    pub fn profile(&self) -> PersonaProfile {
        match self {
            AgentId::Cto => PersonaProfile {
                id: *self,
                display_name: "Chief Technology Officer".to_string(),
                focus: "technology strategy, innovation and long-term architecture direction"
                    .to_string(),
                expertise: vec![
                    "technology roadmaps".to_string(),
                    "build-vs-buy decisions".to_string(),
                    "emerging technology assessment".to_string(),
                ],
            },
            AgentId::SoftwareArchitect => PersonaProfile {
                id: *self,
                display_name: "Software Architect".to_string(),
                focus: "system decomposition, scalability and maintainable design".to_string(),
                expertise: vec![
                    "distributed systems".to_string(),
                    "API design".to_string(),
                    "data modeling".to_string(),
                ],
            },
            AgentId::FullStack => PersonaProfile {
                id: *self,
                display_name: "Full-Stack Engineer".to_string(),
                focus: "end-to-end feature implementation across front and back end".to_string(),
                expertise: vec![
                    "web frameworks".to_string(),
                    "REST and GraphQL services".to_string(),
                    "database integration".to_string(),
                ],
            },
            AgentId::MobileEngineer => PersonaProfile {
                id: *self,
                display_name: "Mobile Engineer".to_string(),
                focus: "native and cross-platform mobile delivery".to_string(),
                expertise: vec![
                    "iOS and Android platforms".to_string(),
                    "offline-first design".to_string(),
                    "app store delivery".to_string(),
                ],
            },
            AgentId::UxUiDesigner => PersonaProfile {
                id: *self,
                display_name: "UX/UI Designer".to_string(),
                focus: "user experience, accessibility and interface design".to_string(),
                expertise: vec![
                    "user research".to_string(),
                    "interaction design".to_string(),
                    "design systems".to_string(),
                ],
            },
            AgentId::QaAutomation => PersonaProfile {
                id: *self,
                display_name: "QA Automation Engineer".to_string(),
                focus: "test strategy, automation coverage and release quality".to_string(),
                expertise: vec![
                    "test pyramids".to_string(),
                    "CI quality gates".to_string(),
                    "performance testing".to_string(),
                ],
            },
            AgentId::DevOpsData => PersonaProfile {
                id: *self,
                display_name: "DevOps & Data Engineer".to_string(),
                focus: "infrastructure, deployment pipelines and data platforms".to_string(),
                expertise: vec![
                    "cloud infrastructure".to_string(),
                    "CI/CD pipelines".to_string(),
                    "data pipelines and observability".to_string(),
                ],
            },
            AgentId::AgilePm => PersonaProfile {
                id: *self,
                display_name: "Agile Project Manager".to_string(),
                focus: "delivery planning, scope and team process".to_string(),
                expertise: vec![
                    "roadmap slicing".to_string(),
                    "risk management".to_string(),
                    "stakeholder communication".to_string(),
                ],
            },
        }
    }

    /// Default model preferences for this agent
    #[must_use]
    pub fn default_preferences(&self) -> ModelPreferences {
        let gpt = "gpt-4o";
        let claude = "claude-3-5-sonnet-20240620";
        match self {
            AgentId::Cto => ModelPreferences::new(gpt, claude, 0.7, 2048),
            AgentId::SoftwareArchitect => ModelPreferences::new(claude, gpt, 0.3, 4096),
            AgentId::FullStack => ModelPreferences::new(gpt, "gemini-pro", 0.5, 3072),
            AgentId::MobileEngineer => ModelPreferences::new(gpt, claude, 0.6, 2048),
            AgentId::UxUiDesigner => ModelPreferences::new(claude, gpt, 0.8, 2048),
            AgentId::QaAutomation => ModelPreferences::new(gpt, claude, 0.2, 3072),
            AgentId::DevOpsData => ModelPreferences::new(claude, gpt, 0.4, 3072),
            AgentId::AgilePm => ModelPreferences::new(gpt, claude, 0.6, 2048),
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile describing one specialist's role in prompt framing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaProfile {
    /// Roster identity
    pub id: AgentId,
    /// Human-readable role title
    pub display_name: String,
    /// One-line focus statement woven into prompts
    pub focus: String,
    /// Expertise keywords woven into prompts
    pub expertise: Vec<String>,
}

/// Per-agent model routing preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPreferences {
    /// First model to try
    pub primary: String,
    /// Tried after the primary, before the global fallback chain
    pub fallback: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Generation budget
    pub max_tokens: u32,
}

impl ModelPreferences {
    /// Create preferences
    #[must_use]
    pub fn new(
        primary: impl Into<String>,
        fallback: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
            temperature,
            max_tokens,
        }
    }
}

// ============================================================================
// Agent
// ============================================================================

/// One specialist's contribution to a collaboration round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContribution {
    /// Which agent produced this
    pub agent: AgentId,
    /// Role title at the time of the call
    pub display_name: String,
    /// The agent's analysis text
    pub content: String,
    /// Provider that served the underlying call
    pub provider: String,
    /// Model that served the underlying call
    pub model: String,
    /// True when the gateway fell back to the offline result
    pub degraded: bool,
}

/// Lifetime counters for one agent
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AgentStats {
    /// Analyze and iterate calls
    pub interactions: u64,
    /// Peer collaboration calls
    pub collaborations: u64,
    /// Calls that came back degraded
    pub degraded_served: u64,
}

/// A persona agent bound to the shared gateway
pub struct PersonaAgent {
    profile: PersonaProfile,
    preferences: ModelPreferences,
    gateway: Arc<LlmGateway>,
    interactions: AtomicU64,
    collaborations: AtomicU64,
    degraded_served: AtomicU64,
}

impl PersonaAgent {
    /// Create an agent with explicit preferences.
    #[must_use]
    pub fn new(
        profile: PersonaProfile,
        preferences: ModelPreferences,
        gateway: Arc<LlmGateway>,
    ) -> Self {
        Self {
            profile,
            preferences,
            gateway,
            interactions: AtomicU64::new(0),
            collaborations: AtomicU64::new(0),
            degraded_served: AtomicU64::new(0),
        }
    }

    /// This agent's roster identity.
    #[must_use]
    pub fn id(&self) -> AgentId {
        self.profile.id
    }

    /// This agent's profile.
    #[must_use]
    pub fn profile(&self) -> &PersonaProfile {
        &self.profile
    }

    /// Role framing prepended to every prompt this agent issues.
    fn role_preamble(&self) -> String {
        format!(
            "You are the {} on a software engineering team. Your focus: {}. \
             Your expertise: {}.",
            self.profile.display_name,
            self.profile.focus,
            self.profile.expertise.join(", ")
        )
    }

    /// Preferred model chain: primary, then the agent fallback. The gateway
    /// appends the global chain after these.
    fn preferred_models(&self) -> Vec<String> {
        vec![
            self.preferences.primary.clone(),
            self.preferences.fallback.clone(),
        ]
    }

    async fn call(&self, prompt: String) -> AgentContribution {
        let request = ModelCallRequest::new(self.preferences.primary.clone(), prompt)
            .with_temperature(self.preferences.temperature)
            .with_max_tokens(self.preferences.max_tokens);

        let result = self.gateway.call(&request, &self.preferred_models()).await;
        if result.degraded {
            self.degraded_served.fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            agent = %self.profile.id,
            provider = %result.provider,
            degraded = result.degraded,
            "Agent call completed"
        );

        AgentContribution {
            agent: self.profile.id,
            display_name: self.profile.display_name.clone(),
            content: result.content,
            provider: result.provider,
            model: result.model,
            degraded: result.degraded,
        }
    }

    /// Analyze a project brief from this agent's specialty.
    pub async fn analyze(&self, request: &str) -> AgentContribution {
        self.interactions.fetch_add(1, Ordering::Relaxed);
        let prompt = format!(
            "{}\n\nAnalyze the following project request from your specialty. \
             Give concrete recommendations, risks and open questions.\n\n\
             Request:\n{}",
            self.role_preamble(),
            request
        );
        self.call(prompt).await
    }

    /// Respond to a peer's position on a shared topic.
    pub async fn collaborate_with(&self, peer: &PersonaProfile, topic: &str) -> AgentContribution {
        self.collaborations.fetch_add(1, Ordering::Relaxed);
        let prompt = format!(
            "{}\n\nYou are collaborating with the {}. Respond to the topic below \
             from your own specialty, noting agreements and disagreements.\n\n\
             Topic:\n{}",
            self.role_preamble(),
            peer.display_name,
            topic
        );
        self.call(prompt).await
    }

    /// Refine a prior answer using caller feedback and the session history.
    pub async fn iterate(&self, request: &str, history: &str, feedback: &str) -> AgentContribution {
        self.interactions.fetch_add(1, Ordering::Relaxed);
        let prompt = format!(
            "{}\n\nThe team previously analyzed this request:\n{}\n\n\
             Collaboration history so far:\n{}\n\n\
             The caller asked for this refinement:\n{}\n\n\
             Update your analysis accordingly, keeping what still holds.",
            self.role_preamble(),
            request,
            history,
            feedback
        );
        self.call(prompt).await
    }

    /// Whether any provider in this agent's preferred chain is registered
    /// and not currently marked unhealthy by the gateway.
    pub async fn health_status(&self) -> bool {
        let health = self.gateway.provider_health().await;
        self.preferred_models()
            .iter()
            .filter_map(|model| provider_for_model(model))
            .any(|provider| health.get(provider).copied().unwrap_or(false))
    }

    /// Lifetime counters snapshot.
    #[must_use]
    pub fn stats(&self) -> AgentStats {
        AgentStats {
            interactions: self.interactions.load(Ordering::Relaxed),
            collaborations: self.collaborations.load(Ordering::Relaxed),
            degraded_served: self.degraded_served.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
