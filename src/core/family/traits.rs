//! Family pipeline capability trait
//!
//! A family pipeline knows how to enumerate its source keys and migrate one
//! record. Concrete families are selected through the explicit
//! [`crate::core::family::FamilyRegistry`], never by dynamic name lookup.

use crate::core::engine::outcome::ItemOutcome;
use crate::domain::ids::Family;
use crate::domain::Result;
use async_trait::async_trait;

/// Capability interface implemented by every record family.
#[async_trait]
pub trait FamilyPipeline: Send + Sync {
    /// The family this pipeline migrates
    fn family(&self) -> &Family;

    /// Enumerate the next ordered slice of source keys strictly greater
    /// than `after_offset`. An empty vec signals end-of-stream, not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error when enumeration itself fails; the engine retries
    /// the batch after a backoff without touching the watermark.
    async fn next_batch(&self, after_offset: i64, limit: i64) -> Result<Vec<i64>>;

    /// Migrate one source record inside its own transaction.
    ///
    /// Always returns a typed outcome - failures are data, not exceptions,
    /// so one bad record never takes down its batch siblings.
    async fn process_item(&self, offset: i64) -> ItemOutcome;
}
