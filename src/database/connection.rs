//! Database connection abstraction
//!
//! This module provides the database backend enum and connection pooling logic
//! for the supported database types (MySQL, PostgreSQL, SQLite).

use crate::config::{DatabaseConfig, DatabaseTarget};
use crate::error::{AgentError, Result};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool};
use sqlx::pool::PoolOptions;
use sqlx::postgres::{PgConnectOptions, PgPool};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Database;
use std::str::FromStr;
use std::time::Duration;

/// Connections idle for longer than this are closed by the pool
const IDLE_TIMEOUT_SECS: u64 = 300;

/// Supported database backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    /// MySQL/MariaDB
    MySQL,
    /// PostgreSQL
    PostgreSQL,
    /// SQLite
    SQLite,
}

impl DatabaseBackend {
    /// Parse database URL to determine backend
    pub fn from_url(url: &str) -> Result<Self> {
        let url_lower = url.to_lowercase();

        if url_lower.starts_with("postgres://") || url_lower.starts_with("postgresql://") {
            Ok(DatabaseBackend::PostgreSQL)
        } else if url_lower.starts_with("mysql://") || url_lower.starts_with("mariadb://") {
            Ok(DatabaseBackend::MySQL)
        } else if url_lower.starts_with("sqlite:")
            || url_lower.ends_with(".db")
            || url_lower.ends_with(".sqlite")
            || url_lower.ends_with(".sqlite3")
        {
            Ok(DatabaseBackend::SQLite)
        } else {
            Err(AgentError::UnsupportedDatabase(format!(
                "Unable to determine database type from URL: {}",
                url
            )))
        }
    }

    /// Get the name of this database backend
    pub fn name(&self) -> &str {
        match self {
            DatabaseBackend::MySQL => "MySQL",
            DatabaseBackend::PostgreSQL => "PostgreSQL",
            DatabaseBackend::SQLite => "SQLite",
        }
    }

    /// URL scheme used when displaying a target
    pub fn scheme(&self) -> &str {
        match self {
            DatabaseBackend::MySQL => "mysql",
            DatabaseBackend::PostgreSQL => "postgres",
            DatabaseBackend::SQLite => "sqlite",
        }
    }
}

impl FromStr for DatabaseBackend {
    type Err = AgentError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DatabaseBackend::MySQL),
            "postgresql" | "postgres" | "pg" => Ok(DatabaseBackend::PostgreSQL),
            "sqlite" | "sqlite3" => Ok(DatabaseBackend::SQLite),
            _ => Err(AgentError::UnsupportedDatabase(s.to_string())),
        }
    }
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Database connection pool wrapper
///
/// This enum holds the actual database pool for the connected backend.
#[derive(Clone, Debug)]
pub enum DatabasePool {
    /// MySQL pool
    MySql(MySqlPool),
    /// PostgreSQL pool
    Postgres(PgPool),
    /// SQLite pool
    Sqlite(SqlitePool),
}

impl DatabasePool {
    /// Get the database backend for this pool
    pub fn backend(&self) -> DatabaseBackend {
        match self {
            DatabasePool::MySql(_) => DatabaseBackend::MySQL,
            DatabasePool::Postgres(_) => DatabaseBackend::PostgreSQL,
            DatabasePool::Sqlite(_) => DatabaseBackend::SQLite,
        }
    }

    /// Create a pool for the configured target.
    ///
    /// Every checkout is health-checked before it is handed out, so
    /// connections dropped by the server while idle are replaced instead of
    /// failing the next statement.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let target = config.to_string();
        let connection_err = |e: sqlx::Error| AgentError::connection(target.clone(), e);

        match &config.target {
            DatabaseTarget::Url(url) => match DatabaseBackend::from_url(url)? {
                DatabaseBackend::MySQL => {
                    let options = MySqlConnectOptions::from_str(url).map_err(connection_err)?;
                    let pool = pool_options(config)
                        .connect_with(options)
                        .await
                        .map_err(connection_err)?;
                    Ok(DatabasePool::MySql(pool))
                }
                DatabaseBackend::PostgreSQL => {
                    let options = PgConnectOptions::from_str(url).map_err(connection_err)?;
                    let pool = pool_options(config)
                        .connect_with(options)
                        .await
                        .map_err(connection_err)?;
                    Ok(DatabasePool::Postgres(pool))
                }
                DatabaseBackend::SQLite => {
                    let options = SqliteConnectOptions::from_str(url)
                        .map_err(connection_err)?
                        .foreign_keys(true);
                    // An in-memory database lives only as long as its connection
                    let pool = pool_options(config)
                        .idle_timeout(None::<Duration>)
                        .max_lifetime(None::<Duration>)
                        .connect_with(options)
                        .await
                        .map_err(connection_err)?;
                    Ok(DatabasePool::Sqlite(pool))
                }
            },
            DatabaseTarget::Credentials {
                backend,
                username,
                password,
                host,
                port,
                database,
            } => match backend {
                DatabaseBackend::MySQL => {
                    let options = MySqlConnectOptions::new()
                        .host(host)
                        .port(*port)
                        .username(username)
                        .password(password)
                        .database(database);
                    let pool = pool_options(config)
                        .connect_with(options)
                        .await
                        .map_err(connection_err)?;
                    Ok(DatabasePool::MySql(pool))
                }
                DatabaseBackend::PostgreSQL => {
                    let options = PgConnectOptions::new()
                        .host(host)
                        .port(*port)
                        .username(username)
                        .password(password)
                        .database(database);
                    let pool = pool_options(config)
                        .connect_with(options)
                        .await
                        .map_err(connection_err)?;
                    Ok(DatabasePool::Postgres(pool))
                }
                DatabaseBackend::SQLite => Err(AgentError::Config(
                    "SQLite databases are configured with DATABASE_URL".to_string(),
                )),
            },
        }
    }

    /// Test the connection
    pub async fn test_connection(&self) -> Result<()> {
        let check_failed = |e| AgentError::connection("test connection", e);
        match self {
            DatabasePool::MySql(pool) => {
                sqlx::query("SELECT 1").fetch_one(pool).await.map_err(check_failed)?;
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query("SELECT 1").fetch_one(pool).await.map_err(check_failed)?;
            }
            DatabasePool::Sqlite(pool) => {
                sqlx::query("SELECT 1").fetch_one(pool).await.map_err(check_failed)?;
            }
        }
        Ok(())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        match self {
            DatabasePool::MySql(pool) => pool.close().await,
            DatabasePool::Postgres(pool) => pool.close().await,
            DatabasePool::Sqlite(pool) => pool.close().await,
        }
    }
}

fn pool_options<DB: Database>(config: &DatabaseConfig) -> PoolOptions<DB> {
    PoolOptions::<DB>::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(Some(Duration::from_secs(IDLE_TIMEOUT_SECS)))
        .test_before_acquire(true)
}
