//! LLM integration module
//!
//! This module provides the trait-based provider abstraction, the
//! OpenAI-compatible implementation and the SQL synthesizer built on top.

pub mod client;
pub mod provider;
pub mod synthesizer;

// Provider implementations
pub mod providers {
    pub mod openai;
}

// Re-exports
pub use provider::{GenerationParams, LLMProvider, LLMResponse, Message, MessageRole};
pub use providers::openai::OpenAIProvider;
pub use synthesizer::{GeneratedQuery, QuerySynthesizer, UNANSWERABLE_SENTINEL};
