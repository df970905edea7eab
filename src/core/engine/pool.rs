//! Fork-join batch dispatch
//!
//! One batch at a time is fanned out over a bounded number of concurrent
//! workers. Every item runs in its own task with its own transaction; the
//! dispatcher joins the whole batch before returning, so the caller only
//! ever advances the checkpoint past items whose outcome is known.

use crate::core::engine::outcome::{BatchStats, ItemOutcome};
use crate::core::family::FamilyPipeline;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Dispatch one batch across at most `workers` concurrent tasks and join.
///
/// Items complete in any order; completion order does not affect the folded
/// stats. A worker that panics is folded in as a failed item rather than
/// poisoning the batch.
pub async fn run_batch(
    pipeline: Arc<dyn FamilyPipeline>,
    offsets: Vec<i64>,
    workers: usize,
) -> BatchStats {
    let mut stats = BatchStats::new();

    let mut completions = stream::iter(offsets.into_iter().map(|offset| {
        let pipeline = Arc::clone(&pipeline);
        async move {
            let handle = tokio::spawn(async move { pipeline.process_item(offset).await });
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => ItemOutcome::Failed(format!("worker task aborted: {e}")),
            };
            (offset, outcome)
        }
    }))
    .buffer_unordered(workers.max(1));

    // Join barrier: drain every dispatched item before returning
    while let Some((offset, outcome)) = completions.next().await {
        if let ItemOutcome::Failed(reason) = &outcome {
            tracing::warn!(offset, reason = %reason, "Item failed");
        }
        stats.record(offset, outcome);
    }

    stats
}
