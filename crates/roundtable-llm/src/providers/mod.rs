//! Concrete provider clients

pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod openai;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use gemini::{GeminiConfig, GeminiProvider};
pub use mock::MockProvider;
pub use openai::{OpenAiConfig, OpenAiProvider};
