// Core data structures for the rednote collector

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author identity derived from the rendered author block
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AuthorIdentity {
    /// Display name
    pub name: String,
    /// Stable user id extracted from the profile link
    pub id: String,
    /// Avatar image URL
    pub avatar: String,
}

/// Summary-level row harvested from the search feed
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NoteSummary {
    pub note_id: String,
    pub title: String,
    pub author: String,
    pub note_link: String,
    pub like_count: u64,
    pub cover_pic: String,
    pub author_avatar: String,
}

/// One fully-collected note with metadata and its comment subtree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRecord {
    pub note_id: String,
    pub title: String,
    /// Body text of the note
    pub content: String,
    pub author: AuthorIdentity,
    /// Publish timestamp as displayed; opaque, never reparsed
    pub publish_time: String,
    pub like_count: u64,
    pub collect_count: u64,
    pub comment_count: u64,
    /// Display order preserved, duplicates allowed
    pub tags: Vec<String>,
    /// De-duplicated by URL, slider order preserved
    pub image_links: Vec<String>,
    pub note_link: String,
    /// Root comments with their ordered replies
    pub comments: Vec<Comment>,
    /// True when every important field came back non-empty
    pub complete: bool,
    pub crawled_at: DateTime<Utc>,
}

impl Default for NoteRecord {
    fn default() -> Self {
        Self {
            note_id: String::new(),
            title: String::new(),
            content: String::new(),
            author: AuthorIdentity::default(),
            publish_time: String::new(),
            like_count: 0,
            collect_count: 0,
            comment_count: 0,
            tags: Vec::new(),
            image_links: Vec::new(),
            note_link: String::new(),
            comments: Vec::new(),
            complete: false,
            crawled_at: Utc::now(),
        }
    }
}

impl NoteRecord {
    /// Minimal record for a target whose extraction failed outright.
    /// Carries only what could be derived from the URL.
    pub fn incomplete(note_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            note_id: note_id.into(),
            note_link: url.into(),
            ..Default::default()
        }
    }

    /// Re-evaluate the completeness flag from the important fields
    /// (title, body, author name, publish timestamp). A record where all
    /// of them are empty usually means the platform rejected the request.
    pub fn evaluate_completeness(&mut self) {
        self.complete = !(self.title.is_empty()
            && self.content.is_empty()
            && self.author.name.is_empty()
            && self.publish_time.is_empty());
    }

    /// Append an image URL, preserving order and de-duplicating by URL
    pub fn push_image(&mut self, url: String) {
        if !url.is_empty() && !self.image_links.contains(&url) {
            self.image_links.push(url);
        }
    }
}

/// A root-level comment and its ordered replies
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Comment {
    /// May be empty when the node carried no id attribute; an empty id is
    /// never used as a uniqueness key
    pub comment_id: String,
    pub author: AuthorIdentity,
    pub content: String,
    /// Display timestamp string, not reparsed
    pub date: String,
    pub location: String,
    pub like_count: u64,
    /// Always false for root comments
    pub is_reply: bool,
    pub replies: Vec<Reply>,
}

/// A reply under a root comment. Replies never have replies of their own;
/// the surface only renders a two-level tree.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Reply {
    pub comment_id: String,
    pub author: AuthorIdentity,
    pub content: String,
    pub date: String,
    pub location: String,
    pub like_count: u64,
    /// Always true
    pub is_reply: bool,
    pub parent_comment_id: String,
}

/// Outcome of one batch-processing pass
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Extraction attempts, including retries after recovery
    pub attempted: usize,
    /// Records persisted to the gateway
    pub persisted: usize,
    /// Targets that ended incomplete and were not retried
    pub incomplete: usize,
    /// Long recovery pauses triggered
    pub recoveries: usize,
    /// Persistence calls that reported failure
    pub persist_failures: usize,
    /// Every record collected during the pass, complete or not, export-ready
    pub records: Vec<NoteRecord>,
}
