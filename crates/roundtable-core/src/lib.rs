//! Roundtable Core - Collaboration Engine
//!
//! This crate provides the collaboration logic for Roundtable:
//! - Orchestrator: parallel fan-out, round synthesis, session lifecycle
//! - Persona: the fixed roster of specialist agents over the gateway
//! - Session: append-only round history with per-session locking
//! - Synthesis: deterministic structured synthesis with concatenation fallback
//! - Persistence: best-effort session snapshots behind a store trait
//! - Config: immutable hub configuration, env-overridable

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod persistence;
pub mod persona;
pub mod session;
pub mod synthesis;

pub use config::HubConfig;
pub use error::{Error, Result};
pub use orchestrator::{
    AgentDescriptor, CollaborationOrchestrator, CollaborationResult, CollaborationStats,
};
pub use persistence::{MemoryStore, SessionStore};
pub use persona::{
    AgentContribution, AgentId, AgentStats, ModelPreferences, PersonaAgent, PersonaProfile,
};
pub use session::{
    CollaborationRound, CollaborationSession, SessionRegistry, SessionState, SessionStatus,
    SharedSession,
};
pub use synthesis::{concatenate, StructuredSynthesizer, Synthesizer};
