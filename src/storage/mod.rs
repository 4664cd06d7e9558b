//! Persistence gateway
//!
//! [`NoteStore`] is the seam between the pipeline and storage, with a
//! SQLite implementation for production and an in-memory one for tests.
//! Upserts are idempotent by note id; a detail arriving before its summary
//! bootstraps a minimal placeholder row so referential integrity never
//! forces a strict two-phase crawl order. A dropped connection is reopened
//! lazily on the next call and only surfaces as `Unavailable` when the
//! reopen itself fails.

pub mod export;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{NoteRecord, NoteSummary};

/// Result alias for gateway calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage seam consumed by the search collector and batch processor
pub trait NoteStore: Send + Sync {
    /// Create tables and indexes, idempotently
    fn init_schema(&self) -> StoreResult<()>;

    /// Insert-or-update a summary row by note id
    fn upsert_summary(&self, summary: &NoteSummary) -> StoreResult<()>;

    /// Insert-or-update a detail row (with comment blob and images) by note
    /// id, bootstrapping a placeholder summary when none exists
    fn upsert_detail(&self, record: &NoteRecord) -> StoreResult<()>;

    /// Most recently crawled (note_id, note_link) pairs, newest first
    fn list_recent(&self, limit: usize) -> StoreResult<Vec<(String, String)>>;

    /// Whether the backing connection is currently usable
    fn is_available(&self) -> bool;
}

// === SQLite implementation ===

/// SQLite-backed store. The connection sits behind a `Mutex` and is
/// reopened lazily when a health probe finds it dead.
pub struct SqliteNoteStore {
    path: Option<PathBuf>,
    conn: Mutex<Option<Connection>>,
}

impl SqliteNoteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn)?;
        info!(path = %path.display(), "sqlite store opened");
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(Some(conn)),
        })
    }

    /// In-memory database for tests
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(Some(conn)),
        })
    }

    fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    /// Run `f` against a healthy connection, reopening a dead one first.
    /// An in-memory store cannot reopen; its connection loss is terminal.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".into()))?;

        let healthy = guard
            .as_ref()
            .is_some_and(|conn| conn.query_row("SELECT 1", [], |_| Ok(())).is_ok());

        if !healthy {
            let Some(path) = &self.path else {
                return Err(StoreError::Unavailable(
                    "in-memory connection lost".into(),
                ));
            };
            warn!(path = %path.display(), "reopening sqlite connection");
            let conn = Connection::open(path).map_err(|e| {
                StoreError::Unavailable(format!("reconnect failed: {e}"))
            })?;
            Self::apply_pragmas(&conn)?;
            *guard = Some(conn);
        }

        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(StoreError::Unavailable("no connection".into())),
        }
    }
}

impl NoteStore for SqliteNoteStore {
    fn init_schema(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS notes (
                    note_id       TEXT PRIMARY KEY,
                    title         TEXT NOT NULL DEFAULT '',
                    author        TEXT NOT NULL DEFAULT '',
                    note_link     TEXT NOT NULL DEFAULT '',
                    like_count    INTEGER NOT NULL DEFAULT 0,
                    cover_pic     TEXT NOT NULL DEFAULT '',
                    author_avatar TEXT NOT NULL DEFAULT '',
                    crawled_at    TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS note_details (
                    note_id       TEXT PRIMARY KEY REFERENCES notes(note_id),
                    content       TEXT NOT NULL DEFAULT '',
                    author_id     TEXT NOT NULL DEFAULT '',
                    publish_time  TEXT NOT NULL DEFAULT '',
                    like_count    INTEGER NOT NULL DEFAULT 0,
                    collect_count INTEGER NOT NULL DEFAULT 0,
                    comment_count INTEGER NOT NULL DEFAULT 0,
                    tags          TEXT NOT NULL DEFAULT '',
                    comments      TEXT NOT NULL DEFAULT '[]',
                    crawled_at    TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS note_images (
                    id        INTEGER PRIMARY KEY AUTOINCREMENT,
                    note_id   TEXT NOT NULL REFERENCES notes(note_id),
                    image_url TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_note_images_note_id
                    ON note_images(note_id);
                CREATE INDEX IF NOT EXISTS idx_notes_crawled_at
                    ON notes(crawled_at);",
            )?;
            debug!("schema initialized");
            Ok(())
        })
    }

    fn upsert_summary(&self, summary: &NoteSummary) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notes
                    (note_id, title, author, note_link, like_count, cover_pic,
                     author_avatar, crawled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(note_id) DO UPDATE SET
                    title = excluded.title,
                    author = excluded.author,
                    note_link = excluded.note_link,
                    like_count = excluded.like_count,
                    cover_pic = excluded.cover_pic,
                    author_avatar = excluded.author_avatar,
                    crawled_at = excluded.crawled_at",
                params![
                    summary.note_id,
                    summary.title,
                    summary.author,
                    summary.note_link,
                    summary.like_count as i64,
                    summary.cover_pic,
                    summary.author_avatar,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    fn upsert_detail(&self, record: &NoteRecord) -> StoreResult<()> {
        let comments_blob = serde_json::to_string(&record.comments)?;
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            // detail may land before any summary pass touched this note
            tx.execute(
                "INSERT OR IGNORE INTO notes (note_id, title, author, note_link, crawled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.note_id,
                    record.title,
                    record.author.name,
                    record.note_link,
                    record.crawled_at.to_rfc3339(),
                ],
            )?;

            tx.execute(
                "INSERT INTO note_details
                    (note_id, content, author_id, publish_time, like_count,
                     collect_count, comment_count, tags, comments, crawled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(note_id) DO UPDATE SET
                    content = excluded.content,
                    author_id = excluded.author_id,
                    publish_time = excluded.publish_time,
                    like_count = excluded.like_count,
                    collect_count = excluded.collect_count,
                    comment_count = excluded.comment_count,
                    tags = excluded.tags,
                    comments = excluded.comments,
                    crawled_at = excluded.crawled_at",
                params![
                    record.note_id,
                    record.content,
                    record.author.id,
                    record.publish_time,
                    record.like_count as i64,
                    record.collect_count as i64,
                    record.comment_count as i64,
                    record.tags.join(","),
                    comments_blob,
                    record.crawled_at.to_rfc3339(),
                ],
            )?;

            // image set is replaced wholesale, not diffed
            tx.execute(
                "DELETE FROM note_images WHERE note_id = ?1",
                params![record.note_id],
            )?;
            for url in &record.image_links {
                tx.execute(
                    "INSERT INTO note_images (note_id, image_url) VALUES (?1, ?2)",
                    params![record.note_id, url],
                )?;
            }

            tx.commit()?;
            debug!(note_id = %record.note_id, "detail upserted");
            Ok(())
        })
    }

    fn list_recent(&self, limit: usize) -> StoreResult<Vec<(String, String)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT note_id, note_link FROM notes
                 ORDER BY crawled_at DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit as i64], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn is_available(&self) -> bool {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(StoreError::Database)
        })
        .is_ok()
    }
}

// === In-memory implementation for tests ===

/// In-memory [`NoteStore`] used by pipeline tests. Preserves insertion
/// order and can simulate an unavailable backend.
#[derive(Default)]
pub struct MemoryNoteStore {
    summaries: RwLock<HashMap<String, NoteSummary>>,
    details: RwLock<HashMap<String, NoteRecord>>,
    order: Mutex<Vec<String>>,
    available: AtomicBool,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self {
            summaries: RwLock::new(HashMap::new()),
            details: RwLock::new(HashMap::new()),
            order: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backend going down or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.summaries.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn detail_count(&self) -> usize {
        self.details.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn get_detail(&self, note_id: &str) -> Option<NoteRecord> {
        self.details.read().ok()?.get(note_id).cloned()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("simulated outage".into()))
        }
    }
}

impl NoteStore for MemoryNoteStore {
    fn init_schema(&self) -> StoreResult<()> {
        self.check_available()
    }

    fn upsert_summary(&self, summary: &NoteSummary) -> StoreResult<()> {
        self.check_available()?;
        let mut summaries = self
            .summaries
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        if !summaries.contains_key(&summary.note_id) {
            if let Ok(mut order) = self.order.lock() {
                order.push(summary.note_id.clone());
            }
        }
        summaries.insert(summary.note_id.clone(), summary.clone());
        Ok(())
    }

    fn upsert_detail(&self, record: &NoteRecord) -> StoreResult<()> {
        self.check_available()?;
        // mirror the placeholder-summary bootstrap
        let mut summaries = self
            .summaries
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        summaries.entry(record.note_id.clone()).or_insert_with(|| {
            if let Ok(mut order) = self.order.lock() {
                order.push(record.note_id.clone());
            }
            NoteSummary {
                note_id: record.note_id.clone(),
                title: record.title.clone(),
                author: record.author.name.clone(),
                note_link: record.note_link.clone(),
                ..NoteSummary::default()
            }
        });
        drop(summaries);

        self.details
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?
            .insert(record.note_id.clone(), record.clone());
        Ok(())
    }

    fn list_recent(&self, limit: usize) -> StoreResult<Vec<(String, String)>> {
        self.check_available()?;
        let order = self
            .order
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        let summaries = self
            .summaries
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        Ok(order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| summaries.get(id))
            .map(|s| (s.note_id.clone(), s.note_link.clone()))
            .collect())
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str) -> NoteSummary {
        NoteSummary {
            note_id: id.to_string(),
            title: format!("title-{id}"),
            note_link: format!("https://x/explore/{id}"),
            ..NoteSummary::default()
        }
    }

    #[test]
    fn test_memory_upsert_is_idempotent() {
        let store = MemoryNoteStore::new();
        store.upsert_summary(&summary("n1")).unwrap();
        store.upsert_summary(&summary("n1")).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_outage_reports_unavailable() {
        let store = MemoryNoteStore::new();
        store.set_available(false);
        assert!(!store.is_available());
        assert!(matches!(
            store.upsert_summary(&summary("n1")),
            Err(StoreError::Unavailable(_))
        ));
        store.set_available(true);
        assert!(store.upsert_summary(&summary("n1")).is_ok());
    }

    #[test]
    fn test_sqlite_summary_upsert_overwrites() {
        let store = SqliteNoteStore::in_memory().unwrap();
        store.init_schema().unwrap();

        store.upsert_summary(&summary("n1")).unwrap();
        let mut updated = summary("n1");
        updated.title = "renamed".into();
        store.upsert_summary(&updated).unwrap();

        let recent = store.list_recent(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].0, "n1");
    }
}
