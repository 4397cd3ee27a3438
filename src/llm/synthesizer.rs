//! Query Synthesizer
//!
//! Builds the generation request from a question and the reflected schema,
//! and turns the model's reply into a [`GeneratedQuery`].

use crate::database::SchemaDescription;
use crate::error::{AgentError, Result};
use crate::llm::provider::{GenerationParams, LLMProvider, Message};
use std::sync::Arc;
use tracing::{debug, info};

/// Reply the model gives when no statement can answer the question
pub const UNANSWERABLE_SENTINEL: &str = "Can't Answer";

/// System message sent with every request
pub const SYSTEM_PROMPT: &str = "you are a database expert";

const MAX_TOKENS: u32 = 200;
const TEMPERATURE: f32 = 0.1;

/// What the model produced for one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedQuery {
    /// A statement to run, as the model wrote it
    SqlText(String),
    /// The model answered with the sentinel
    Unanswerable,
}

/// Turns natural-language questions into SQL with an [`LLMProvider`]
#[derive(Clone)]
pub struct QuerySynthesizer {
    provider: Arc<dyn LLMProvider>,
    dialect: Option<String>,
    params: GenerationParams,
}

impl QuerySynthesizer {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            dialect: None,
            params: GenerationParams::new()
                .with_max_tokens(MAX_TOKENS)
                .with_temperature(TEMPERATURE),
        }
    }

    /// Name the SQL dialect in the prompt (e.g. "MySQL")
    pub fn with_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = Some(dialect.into());
        self
    }

    /// Build the system and user messages for `question`
    pub fn build_messages(&self, question: &str, schema: &SchemaDescription) -> Result<Vec<Message>> {
        let rendered = schema.render_for_prompt()?;
        let dialect = self
            .dialect
            .as_deref()
            .map(|d| format!("The database is {}.\n", d))
            .unwrap_or_default();

        let prompt = format!(
            "You are a Database Expert. Given the following database schema:\n\
             {rendered}\n\
             {dialect}\n\
             and the user question: {question}\n\n\
             Generate the SQL query that answers the question.\n\
             Rules:\n\
             - Reply with a single SQL statement and nothing else.\n\
             - Do not explain the query.\n\
             - Do not wrap the query in markdown code fences.\n\
             - If no SQL query over this schema can answer the question, reply with exactly: {sentinel}",
            sentinel = UNANSWERABLE_SENTINEL,
        );

        Ok(vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)])
    }

    /// Ask the model for a statement answering `question`
    pub async fn synthesize(&self, question: &str, schema: &SchemaDescription) -> Result<GeneratedQuery> {
        let messages = self.build_messages(question, schema)?;
        debug!(provider = self.provider.provider_name(), question, "requesting SQL");

        let response = self
            .provider
            .generate(&messages, &self.params)
            .await
            .map_err(|e| match e {
                AgentError::Generation(_) => e,
                other => AgentError::Generation(other.to_string()),
            })?;

        debug!(
            model = ?response.model,
            input_tokens = ?response.input_tokens,
            output_tokens = ?response.output_tokens,
            total_tokens = ?response.total_tokens(),
            "model replied"
        );
        if response.is_truncated() {
            info!("model reply hit the token limit");
        }

        let query = interpret_response(&response.content)?;
        debug!(?query, "model reply interpreted");
        Ok(query)
    }
}

/// Classify a raw model reply
///
/// Surrounding whitespace and one enclosing markdown fence are removed first.
pub fn interpret_response(raw: &str) -> Result<GeneratedQuery> {
    let text = strip_code_fence(raw.trim()).trim();

    if text.is_empty() {
        return Err(AgentError::Generation("model returned an empty response".to_string()));
    }
    if text == UNANSWERABLE_SENTINEL {
        return Ok(GeneratedQuery::Unanswerable);
    }
    Ok(GeneratedQuery::SqlText(text.to_string()))
}

/// Language tags a model may put after the opening fence
const FENCE_TAGS: &[&str] = &["sql", "mysql", "postgresql", "postgres", "sqlite"];

/// ```` ```sql\n...\n``` ```` -> `...`; anything else is returned unchanged
fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```").and_then(|t| t.strip_suffix("```")) else {
        return text;
    };
    match inner.split_once('\n') {
        Some((tag, body)) if tag.trim().is_empty() => body,
        Some((tag, body)) if FENCE_TAGS.iter().any(|t| tag.trim().eq_ignore_ascii_case(t)) => body,
        _ => inner,
    }
}
