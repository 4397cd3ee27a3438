// Database Reader Agent: ask questions about a database in plain language
//
// This is the main entry point for the interactive agent.

use anyhow::{Context, Result};
use db_reader_agent::cli::Repl;
use db_reader_agent::config::AppConfig;
use db_reader_agent::database::DatabaseManager;
use db_reader_agent::llm::{LLMProvider, OpenAIProvider};
use db_reader_agent::Session;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // RUST_LOG may come from .env
    dotenv::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    info!(database = %config.database, model = %config.llm.model, "starting");

    let manager = Arc::new(
        DatabaseManager::connect(&config.database)
            .await
            .context("failed to connect to the database")?,
    );

    let provider = OpenAIProvider::from_config(&config.llm)?;
    provider.validate_config()?;

    let session = Session::start(manager.clone(), Arc::new(provider))
        .await
        .context("failed to load the database schema")?;

    let mut repl = Repl::new(session)?;
    repl.run().await?;

    manager.close().await;
    Ok(())
}

/// Initialize logging to stderr so stdout carries only the conversation
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
