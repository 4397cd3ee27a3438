//! Database Reader Agent Library
//!
//! Answers natural-language questions about a relational database: the
//! schema is reflected once, each question is turned into SQL by a language
//! model, and the statement is run against the live database.
//! The main binary is in src/main.rs.

pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod llm;
pub mod session;

pub use error::{AgentError, Result};
pub use session::{Session, TurnOutcome};
