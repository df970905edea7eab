//! PostgreSQL adapters
//!
//! External integrations with the legacy source schema and the normalized
//! target schema, sharing one connection pool.

pub mod client;
pub mod source;
pub mod writer;

pub use client::PostgresClient;
