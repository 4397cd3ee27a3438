//! Command handlers for CLI
//!
//! Each line the user types becomes a [`Command`]; questions are answered
//! through the [`Session`] and rendered as the text printed for the turn.

use crate::database::QueryResult;
use crate::error::{AgentError, Result};
use crate::session::{Session, TurnOutcome};
use std::fmt::Write;

/// Word that ends the session
const EXIT_WORD: &str = "exit";

/// Command types
#[derive(Debug, Clone, PartialEq)]
pub enum CommandType {
    /// Leave the loop
    Exit,
    /// Blank line, nothing to do
    Empty,
    /// Natural language question
    Question { text: String },
}

/// Parsed command
#[derive(Debug, Clone)]
pub struct Command {
    /// The type of command
    pub command_type: CommandType,
}

impl Command {
    /// Parse a command from user input
    ///
    /// Only the exact word `exit` (any case, no surrounding whitespace) ends
    /// the session.
    pub fn parse(input: &str) -> Self {
        let command_type = if input.eq_ignore_ascii_case(EXIT_WORD) {
            CommandType::Exit
        } else if input.trim().is_empty() {
            CommandType::Empty
        } else {
            CommandType::Question {
                text: input.trim().to_string(),
            }
        };

        Command { command_type }
    }

    pub fn is_exit(&self) -> bool {
        self.command_type == CommandType::Exit
    }
}

/// Handle a command and return the text to print
///
/// Per-turn failures come back as `Err` for the caller to print with
/// [`format_error`].
pub async fn handle_command(command: &Command, session: &Session) -> Result<String> {
    match &command.command_type {
        CommandType::Exit => Ok("Goodbye!".to_string()),
        CommandType::Empty => Ok(String::new()),
        CommandType::Question { text } => {
            let outcome = session.run_turn(text).await?;
            Ok(format_outcome(&outcome))
        }
    }
}

/// Render the outcome of one turn
pub fn format_outcome(outcome: &TurnOutcome) -> String {
    match outcome {
        TurnOutcome::Unanswerable => format!(
            "\nGenerated SQL Query: {}\n\nThe question cannot be answered.",
            crate::llm::UNANSWERABLE_SENTINEL
        ),
        TurnOutcome::Executed { sql, result } => {
            let mut out = format!("\nGenerated SQL Query: {}\n\nQuery Result:", sql);
            match result {
                QueryResult::Rows(rows) if rows.is_empty() => out.push_str("\n(no rows)"),
                QueryResult::Rows(rows) => {
                    for row in rows {
                        let _ = write!(out, "\n{}", row);
                    }
                }
                QueryResult::ExecutionError(message) => {
                    let _ = write!(out, "\nError executing query: {}", message);
                }
            }
            out
        }
    }
}

/// Format an error for display
pub fn format_error(error: &AgentError) -> String {
    format!("Error: {}", error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Tuple, Value};

    #[test]
    fn test_parse_exit_any_case() {
        for input in ["exit", "Exit", "EXIT", "eXiT"] {
            assert!(Command::parse(input).is_exit(), "{:?} should exit", input);
        }
    }

    #[test]
    fn test_parse_padded_exit_is_question() {
        for input in [" exit ", "exit\t", "  EXIT"] {
            assert_eq!(
                Command::parse(input).command_type,
                CommandType::Question {
                    text: input.trim().to_string()
                },
                "{:?} should not exit",
                input
            );
        }
    }

    #[test]
    fn test_parse_exit_prefix_is_question() {
        let cmd = Command::parse("exit now");
        assert_eq!(
            cmd.command_type,
            CommandType::Question {
                text: "exit now".to_string()
            }
        );
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Command::parse("").command_type, CommandType::Empty);
        assert_eq!(Command::parse(" \t ").command_type, CommandType::Empty);
    }

    #[test]
    fn test_parse_question() {
        let cmd = Command::parse(" How many orders did alice place? ");
        assert_eq!(
            cmd.command_type,
            CommandType::Question {
                text: "How many orders did alice place?".to_string()
            }
        );
    }

    #[test]
    fn test_format_rows() {
        let outcome = TurnOutcome::Executed {
            sql: "SELECT id, name FROM customers".to_string(),
            result: QueryResult::Rows(vec![
                Tuple::from([Value::Int(1), Value::Text("alice".to_string())]),
                Tuple::from([Value::Int(2), Value::Text("bob".to_string())]),
            ]),
        };
        assert_eq!(
            format_outcome(&outcome),
            "\nGenerated SQL Query: SELECT id, name FROM customers\n\nQuery Result:\n(1, 'alice')\n(2, 'bob')"
        );
    }

    #[test]
    fn test_format_no_rows_and_errors() {
        let empty = TurnOutcome::Executed {
            sql: "DELETE FROM orders".to_string(),
            result: QueryResult::Rows(vec![]),
        };
        assert!(format_outcome(&empty).ends_with("Query Result:\n(no rows)"));

        let failed = TurnOutcome::Executed {
            sql: "SELECT * FROM nonexistent_table".to_string(),
            result: QueryResult::ExecutionError("no such table: nonexistent_table".to_string()),
        };
        assert!(format_outcome(&failed)
            .ends_with("Error executing query: no such table: nonexistent_table"));
    }

    #[test]
    fn test_format_unanswerable() {
        let text = format_outcome(&TurnOutcome::Unanswerable);
        assert!(text.contains("Generated SQL Query: Can't Answer"));
        assert!(text.ends_with("The question cannot be answered."));
    }

    #[test]
    fn test_format_error() {
        let err = AgentError::Generation("API returned 429: rate limited".to_string());
        assert!(format_error(&err).starts_with("Error: "));
        assert!(format_error(&err).contains("429"));
    }
}
