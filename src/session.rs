//! Conversation session
//!
//! One [`Session`] is built at startup and drives every turn: it holds the
//! query runner, the synthesizer and the schema reflected at startup.

use crate::database::{DatabaseManager, QueryResult, QueryRunner, SchemaDescription};
use crate::error::Result;
use crate::llm::{GeneratedQuery, LLMProvider, QuerySynthesizer};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of one question
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The generated statement was run
    Executed { sql: String, result: QueryResult },
    /// The model declined; nothing was run
    Unanswerable,
}

/// State shared by all turns
pub struct Session {
    runner: Arc<dyn QueryRunner>,
    synthesizer: QuerySynthesizer,
    schema: SchemaDescription,
}

impl Session {
    pub fn new(
        runner: Arc<dyn QueryRunner>,
        synthesizer: QuerySynthesizer,
        schema: SchemaDescription,
    ) -> Self {
        Self {
            runner,
            synthesizer,
            schema,
        }
    }

    /// Reflect the schema through `manager` and start a session on it
    ///
    /// The prompt names the manager's SQL dialect.
    pub async fn start(manager: Arc<DatabaseManager>, provider: Arc<dyn LLMProvider>) -> Result<Self> {
        let schema = manager.reflect().await?;
        info!(tables = schema.len(), "schema loaded");

        let synthesizer = QuerySynthesizer::new(provider).with_dialect(manager.backend().name());
        Ok(Self::new(manager, synthesizer, schema))
    }

    /// Answer one question
    ///
    /// Generation failures are returned as errors. Execution failures come
    /// back inside [`TurnOutcome::Executed`].
    pub async fn run_turn(&self, question: &str) -> Result<TurnOutcome> {
        match self.synthesizer.synthesize(question, &self.schema).await? {
            GeneratedQuery::SqlText(sql) => {
                let result = self.runner.execute(&sql).await;
                Ok(TurnOutcome::Executed { sql, result })
            }
            GeneratedQuery::Unanswerable => {
                debug!(question, "question marked unanswerable");
                Ok(TurnOutcome::Unanswerable)
            }
        }
    }
}
