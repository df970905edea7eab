//! Integration tests for graceful shutdown functionality
//!
//! These tests verify that:
//! - Shutdown signals are properly handled
//! - The engine stops between batches, never mid-batch
//! - The checkpoint reflects every batch that completed before the stop

use anvil::config::WatermarkPolicy;
use anvil::core::engine::{Engine, EngineOptions, ItemOutcome};
use anvil::core::family::FamilyPipeline;
use anvil::core::state::CheckpointStore;
use anvil::domain::{Family, Result};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::test]
async fn test_shutdown_signal_channel_creation() {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    assert!(!*shutdown_rx.borrow());
    shutdown_tx.send(true).unwrap();
    assert!(*shutdown_rx.borrow());
}

#[tokio::test]
async fn test_shutdown_signal_propagation() {
    let (shutdown_tx, shutdown_rx1) = watch::channel(false);
    let shutdown_rx2 = shutdown_rx1.clone();

    assert!(!*shutdown_rx1.borrow());
    assert!(!*shutdown_rx2.borrow());

    shutdown_tx.send(true).unwrap();

    assert!(*shutdown_rx1.borrow());
    assert!(*shutdown_rx2.borrow());
}

/// Endless pipeline: always has another batch, so only shutdown stops it.
struct EndlessPipeline {
    family: Family,
}

#[async_trait]
impl FamilyPipeline for EndlessPipeline {
    fn family(&self) -> &Family {
        &self.family
    }

    async fn next_batch(&self, after_offset: i64, limit: i64) -> Result<Vec<i64>> {
        Ok((after_offset + 1..=after_offset + limit).collect())
    }

    async fn process_item(&self, _offset: i64) -> ItemOutcome {
        tokio::time::sleep(Duration::from_millis(5)).await;
        ItemOutcome::Migrated
    }
}

#[tokio::test]
async fn test_engine_stops_between_batches_on_shutdown() {
    let dir = tempfile::TempDir::new().unwrap();
    let family = Family::from_str("endless").unwrap();
    let store_path = dir.path().join("endless_checkpoint.json");

    let pipeline = Arc::new(EndlessPipeline {
        family: family.clone(),
    });
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine = Engine::new(
        pipeline,
        CheckpointStore::new(&store_path, family.clone()),
        EngineOptions {
            batch_size: 4,
            workers: 2,
            resume: true,
            start_offset: None,
            session_limit: None,
            poll_interval: None,
            watermark_policy: WatermarkPolicy::AdvanceAlways,
            fetch_retry: Duration::from_millis(10),
        },
        shutdown_rx,
    );

    let handle = tokio::spawn(engine.run());

    // Let a few batches land, then signal shutdown
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(true).unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("engine must stop after shutdown")
        .unwrap()
        .unwrap();

    // Every batch that started also finished: the watermark covers exactly
    // the dispatched items, with nothing in flight left behind
    assert!(summary.batches >= 1);
    assert_eq!(summary.dispatched, summary.batches * 4);
    assert_eq!(summary.failed, 0);

    let checkpoint = CheckpointStore::new(&store_path, family).load();
    assert_eq!(checkpoint.last_offset, summary.final_offset);
    assert_eq!(checkpoint.success_count as usize, summary.dispatched);
}

#[tokio::test]
async fn test_shutdown_before_first_batch() {
    let dir = tempfile::TempDir::new().unwrap();
    let family = Family::from_str("endless").unwrap();

    let pipeline = Arc::new(EndlessPipeline {
        family: family.clone(),
    });
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shutdown_tx.send(true).unwrap();

    let engine = Engine::new(
        pipeline,
        CheckpointStore::new(dir.path().join("cp.json"), family),
        EngineOptions {
            batch_size: 4,
            workers: 2,
            resume: true,
            start_offset: None,
            session_limit: None,
            poll_interval: None,
            watermark_policy: WatermarkPolicy::AdvanceAlways,
            fetch_retry: Duration::from_millis(10),
        },
        shutdown_rx,
    );

    let summary = engine.run().await.unwrap();
    assert_eq!(summary.batches, 0);
    assert_eq!(summary.dispatched, 0);
}
