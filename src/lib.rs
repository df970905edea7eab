// Anvil - Equipment Test Record Migration Engine
// Copyright (c) 2025 Anvil Contributors
// Licensed under the MIT License

//! # Anvil - Equipment Test Record Migration Engine
//!
//! Anvil is a resumable, concurrent, idempotent batch-migration engine built
//! in Rust. It reads legacy equipment test records from an append-only
//! source store, decodes the proprietary binary/compressed curve payloads
//! embedded in those records, normalizes the result into a versioned
//! business schema (programs, results, steps, curves, alarms) and commits
//! each record atomically.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Decoding** two curve payload variants: fixed-width packed frames and
//!   gzip-compressed float arrays with synthesized time axes
//! - **Normalizing** grouped source rows into one result aggregate per
//!   record, persisted all-or-nothing
//! - **Migrating** batch by batch with a bounded fork-join worker pool and a
//!   join barrier before every checkpoint write
//! - **Resuming** from a per-family JSON checkpoint after any crash or stop
//!
//! ## Architecture
//!
//! Anvil follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (decode, family pipelines, engine, state,
//!   supervisor)
//! - [`adapters`] - External integrations (source store, target schema)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use anvil::adapters::postgres::PostgresClient;
//! use anvil::core::family::FamilyRegistry;
//! use anvil::core::Supervisor;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = anvil::config::load_config("anvil.toml")?;
//!
//!     let client = Arc::new(PostgresClient::new(&config.database)?);
//!     client.ensure_schema().await?;
//!
//!     let supervisor = Supervisor::new(
//!         client,
//!         FamilyRegistry::builtin(),
//!         Duration::from_secs(config.engine.restart_backoff_seconds),
//!     );
//!
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!     let summaries = supervisor.run(&config, shutdown_rx).await?;
//!
//!     for summary in summaries {
//!         println!("{}: {} migrated", summary.family, summary.migrated);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Idempotency
//!
//! Every result carries a natural key (source id + family). The writer
//! checks it inside the item's transaction and the target schema enforces it
//! with a unique constraint, so re-running any offset range is safe: already
//! migrated records are skipped, never duplicated.
//!
//! ## Error Handling
//!
//! Anvil uses the [`domain::AnvilError`] type for all errors. Per-item
//! failures never propagate as errors: workers return a typed outcome
//! (migrated / already migrated / failed) that the join barrier folds into
//! the batch counters.
//!
//! ## Logging
//!
//! Anvil uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(family = "fastening", watermark = 56872, "Batch done");
//! warn!(offset = 56873, "Item failed");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
