//! rednote - incremental note collector for a scroll-paginated web surface
//!
//! Collects structured note records (metadata, images, nested comment
//! threads) from a dynamically-rendered site that paginates by progressive
//! DOM mutation. The crux of the system is the incremental-extraction and
//! politeness pipeline: deciding how much to stimulate a live page, when
//! rendered content has stabilized, how to assemble a consistent record
//! from a mutating DOM, and how to back off when the remote side appears
//! to be throttling the session.
//!
//! # Architecture
//!
//! - [`config`] - Configuration management and timing knobs
//! - [`browser`] - Page-session capability surface and its backends
//! - [`crawler`] - Extraction components (loader, comments, detail, search)
//! - [`pipeline`] - Batch processing with politeness and backoff
//! - [`storage`] - Persistence gateway and batch export
//! - [`models`] - Core data structures
//! - [`utils`] - Common helpers
//!
//! # Example
//!
//! ```no_run
//! use rednote::config::Config;
//! use rednote::storage::{NoteStore, SqliteNoteStore};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = SqliteNoteStore::open(&config.storage.sqlite_path)?;
//!     store.init_schema()?;
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::browser::{ElementId, PageSession};
    pub use crate::config::Config;
    pub use crate::crawler::NoteExtractor;
    pub use crate::error::{SessionError, StoreError};
    pub use crate::models::{BatchReport, Comment, NoteRecord, NoteSummary, Reply};
    pub use crate::pipeline::BatchProcessor;
    pub use crate::storage::NoteStore;
}
