//! Error types for the collaboration engine

use thiserror::Error;
use uuid::Uuid;

/// Core errors
#[derive(Error, Debug)]
pub enum Error {
    /// No session exists with the given id
    #[error("Unknown session: {0}")]
    InvalidSession(Uuid),

    /// The structured synthesizer could not produce a document
    #[error("Synthesis failed: {0}")]
    SynthesisFailure(String),

    /// Session persistence failed (best-effort paths log and continue;
    /// this surfaces only from explicit load calls)
    #[error("Session store error: {0}")]
    Store(String),

    /// Underlying gateway error
    #[error(transparent)]
    Llm(#[from] roundtable_llm::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_session_names_id() {
        let id = Uuid::new_v4();
        let message = Error::InvalidSession(id).to_string();
        assert!(message.contains(&id.to_string()));
    }

    #[test]
    fn test_llm_error_converts() {
        let source = roundtable_llm::Error::Api("boom".to_string());
        let error: Error = source.into();
        assert!(matches!(error, Error::Llm(_)));
    }
}
