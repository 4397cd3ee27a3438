//! REPL implementation
//!
//! This module implements the interactive question loop.

use crate::cli::commands::{self, format_error, Command, CommandType};
use crate::error::{AgentError, Result};
use crate::session::Session;
use rustyline::error::ReadlineError;
use rustyline::history::MemHistory;
use rustyline::{Config, Editor};
use tracing::{debug, warn};

/// Banner printed once at startup
pub const BANNER: &str = "Welcome to the Database Reader Agent!";

/// Prompt shown before every question
pub const PROMPT: &str = "Ask me something about the database (or type 'exit' to quit): ";

/// Interactive question loop
pub struct Repl {
    /// The rustyline editor (history kept in memory only)
    editor: Editor<(), MemHistory>,
    /// Whether the REPL should continue running
    running: bool,
    /// Session answering the questions
    session: Session,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(session: Session) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(true)
            .build();

        let editor = Editor::<(), MemHistory>::with_history(config, MemHistory::new())
            .map_err(|e| {
                AgentError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to initialize editor: {}", e),
                ))
            })?;

        Ok(Self {
            editor,
            running: true,
            session,
        })
    }

    /// Run the REPL loop until `exit` or end of input
    pub async fn run(&mut self) -> Result<()> {
        println!("{}", BANNER);

        while self.running {
            println!();
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let command = Command::parse(&line);
                    self.handle_command(command).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    debug!("end of input");
                    self.running = false;
                }
                Err(err) => {
                    println!("Error: {:?}", err);
                    self.running = false;
                }
            }
        }

        Ok(())
    }

    /// Handle a command
    async fn handle_command(&mut self, command: Command) {
        match &command.command_type {
            CommandType::Exit => {
                self.running = false;
            }
            CommandType::Empty => {}
            CommandType::Question { .. } => {
                match commands::handle_command(&command, &self.session).await {
                    Ok(msg) => {
                        println!("{}", msg);
                    }
                    Err(e) => self.report_error(&e),
                }
            }
        }
    }

    /// Print a failed turn; fatal errors also end the loop
    fn report_error(&mut self, error: &AgentError) {
        println!("{}", format_error(error));
        if error.is_fatal() {
            warn!(%error, "stopping after fatal error");
            self.running = false;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{QueryResult, QueryRunner, SchemaDescription};
    use crate::llm::{GenerationParams, LLMProvider, LLMResponse, Message, QuerySynthesizer};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Unreachable;

    #[async_trait]
    impl LLMProvider for Unreachable {
        async fn generate(&self, _messages: &[Message], _params: &GenerationParams) -> Result<LLMResponse> {
            Err(AgentError::Generation("offline".to_string()))
        }

        fn provider_name(&self) -> &str {
            "offline"
        }

        fn has_api_key(&self) -> bool {
            false
        }
    }

    #[async_trait]
    impl QueryRunner for Unreachable {
        async fn execute(&self, _sql: &str) -> QueryResult {
            QueryResult::ExecutionError("offline".to_string())
        }
    }

    fn session() -> Session {
        Session::new(
            Arc::new(Unreachable),
            QuerySynthesizer::new(Arc::new(Unreachable)),
            SchemaDescription::new(),
        )
    }

    #[test]
    fn test_repl_creation() {
        let repl = Repl::new(session()).unwrap();
        assert!(repl.is_running());
    }

    #[tokio::test]
    async fn test_exit_stops_loop_and_errors_do_not() {
        let mut repl = Repl::new(session()).unwrap();

        repl.handle_command(Command::parse("how many orders?")).await;
        assert!(repl.is_running());

        repl.handle_command(Command::parse("exit now")).await;
        assert!(repl.is_running());

        repl.handle_command(Command::parse(" exit ")).await;
        assert!(repl.is_running());

        repl.handle_command(Command::parse("EXIT")).await;
        assert!(!repl.is_running());
    }

    #[test]
    fn test_fatal_error_stops_loop() {
        let mut repl = Repl::new(session()).unwrap();

        repl.report_error(&AgentError::Generation("API returned 500: upstream".to_string()));
        assert!(repl.is_running());

        repl.report_error(&AgentError::Schema("dangling foreign key".to_string()));
        assert!(!repl.is_running());
    }
}
