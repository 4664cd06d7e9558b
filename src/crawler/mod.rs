//! Extraction components
//!
//! Each submodule owns one stage of turning a rendered note page into
//! structured data: metric-string parsing, URL identity extraction, the
//! incremental load controller, the comment-tree assembler, the per-note
//! detail extractor, and the keyword search collector.

pub mod comments;
pub mod count;
pub mod detail;
pub mod ids;
pub mod loader;
pub mod search;
pub mod selectors;

use async_trait::async_trait;

use crate::models::NoteRecord;

/// Seam between the batch processor and the page-driving extractor.
///
/// The processor only cares that each URL yields a record whose `complete`
/// flag it can inspect; tests substitute a scripted implementation.
#[async_trait]
pub trait NoteExtractor: Send + Sync {
    /// Extract one note. Never fails: extraction errors degrade to an
    /// incomplete record carrying the note id and link.
    async fn extract(&self, url: &str) -> NoteRecord;
}
