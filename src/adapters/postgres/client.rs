//! PostgreSQL client and connection pool
//!
//! One pool serves both sides of the migration: fetch/existence-check work
//! borrows connections briefly, and each in-flight item holds a connection
//! exclusively for the duration of its transaction. The pool is sized from
//! configuration so the worker count can never exhaust it.

use crate::config::schema::DatabaseConfig;
use crate::domain::{AnvilError, Result};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::NoTls;

/// Pooled PostgreSQL client for Anvil.
pub struct PostgresClient {
    /// Connection pool
    pool: Pool,

    /// Per-statement timeout applied to every acquired connection
    statement_timeout_seconds: u64,

    /// Redacted connection description for logging
    safe_description: String,
}

impl PostgresClient {
    /// Create a new pooled client from an explicit configuration object.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be constructed.
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .dbname(&config.dbname)
            .user(&config.user)
            .password(config.password.expose_secret().as_ref());

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .runtime(Runtime::Tokio1)
            .max_size(config.max_connections)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .build()
            .map_err(|e| AnvilError::Database(format!("Failed to create connection pool: {e}")))?;

        Ok(Self {
            pool,
            statement_timeout_seconds: config.statement_timeout_seconds,
            safe_description: format!(
                "postgresql://{}@{}:{}/{}",
                config.user, config.host, config.port, config.dbname
            ),
        })
    }

    /// Test the connection to PostgreSQL
    ///
    /// Attempts to get a connection from the pool and execute a simple query.
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get().await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| AnvilError::Database(format!("Connection test failed: {e}")))?;

        tracing::info!(database = %self.safe_description, "PostgreSQL connection test successful");
        Ok(())
    }

    /// Ensure the normalized target schema exists
    ///
    /// Runs the bundled migration SQL to create the biz schema, tables and
    /// indexes if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self.get().await?;

        let migration_sql = include_str!("../../../migrations/001_initial_schema.sql");
        client
            .batch_execute(migration_sql)
            .await
            .map_err(|e| AnvilError::Database(format!("Failed to execute migration: {e}")))?;

        tracing::info!("Target schema initialized successfully");
        Ok(())
    }

    /// Get a connection from the pool with the statement timeout applied.
    ///
    /// # Errors
    ///
    /// Returns an error if a connection cannot be obtained.
    pub async fn get(&self) -> Result<Object> {
        let client = self.pool.get().await.map_err(|e| {
            AnvilError::Database(format!("Failed to get connection from pool: {e}"))
        })?;

        let timeout_query = format!(
            "SET statement_timeout = {}",
            self.statement_timeout_seconds * 1000
        );
        client
            .execute(&timeout_query, &[])
            .await
            .map_err(|e| AnvilError::Database(format!("Failed to set statement timeout: {e}")))?;

        Ok(client)
    }

    /// Redacted connection string for logging (no password)
    pub fn connection_info(&self) -> &str {
        &self.safe_description
    }

    /// Current pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}
