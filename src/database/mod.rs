//! Database module
//!
//! This module provides connection management, schema reflection
//! and execution of generated queries.

pub mod connection;
pub mod executor;
pub mod manager;
pub mod reflector;
pub mod schema;

// Re-exports
pub use connection::{DatabaseBackend, DatabasePool};
pub use executor::{QueryResult, QueryRunner, Tuple, Value};
pub use manager::DatabaseManager;
pub use schema::{ForeignKeyRef, SchemaDescription, TableInfo};
