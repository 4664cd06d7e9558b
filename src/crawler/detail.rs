//! Per-note record extractor
//!
//! Produces one [`NoteRecord`] for a note URL. Every field read is
//! independently defensive, and the whole sequence is wrapped so a session
//! failure degrades to a minimal incomplete record instead of propagating.
//! The backoff controller is the single place that reacts to sustained
//! emptiness.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use tracing::{debug, warn};

use crate::browser::{probe, PageSession};
use crate::config::{ExtractConfig, LoaderConfig};
use crate::crawler::comments::CommentAssembler;
use crate::crawler::count::parse_count;
use crate::crawler::ids::{note_id_from_url, user_id_from_url};
use crate::crawler::loader::IncrementalLoader;
use crate::crawler::selectors;
use crate::crawler::NoteExtractor;
use crate::error::SessionError;
use crate::models::{AuthorIdentity, NoteRecord};
use crate::utils::random_sleep;

static DIGITS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Extracts full note records through a page session
pub struct DetailExtractor {
    session: Arc<dyn PageSession>,
    loader: LoaderConfig,
    extract: ExtractConfig,
}

impl DetailExtractor {
    pub fn new(session: Arc<dyn PageSession>, loader: LoaderConfig, extract: ExtractConfig) -> Self {
        Self {
            session,
            loader,
            extract,
        }
    }

    async fn try_extract(&self, url: &str) -> Result<NoteRecord, SessionError> {
        self.session.navigate(url).await?;
        self.humanize().await;
        random_sleep(self.extract.settle_min_ms, self.extract.settle_max_ms).await;

        let session = self.session.as_ref();
        let mut record = NoteRecord::incomplete(note_id_from_url(url), url);

        if let Some(title) = probe::find(session, selectors::DETAIL_TITLE).await {
            record.title = probe::text(session, title).await;
        }
        if let Some(desc) = probe::find(session, selectors::DETAIL_DESC).await {
            record.content = probe::text(session, desc).await;
        }
        record.author = self.author().await;
        if let Some(date) = probe::find(session, selectors::PUBLISH_DATE).await {
            record.publish_time = probe::text(session, date).await;
        }

        record.like_count = self.counter(selectors::LIKE_COUNT).await;
        record.collect_count = self.counter(selectors::COLLECT_COUNT).await;
        record.comment_count = self.comment_count().await;

        for tag in probe::all(session, selectors::HASH_TAG).await {
            let text = probe::text(session, tag).await;
            if !text.is_empty() {
                record.tags.push(text);
            }
        }
        for image in probe::all(session, selectors::SLIDER_IMAGE).await {
            record.push_image(probe::attr(session, image, "src").await);
        }

        if record.comment_count > 0 {
            if let Some(container) = probe::find(session, selectors::COMMENTS_CONTAINER).await {
                let loader = IncrementalLoader::new(session, &self.loader);
                let outcome = loader
                    .run(
                        container,
                        selectors::COMMENT_ITEM,
                        selectors::END_MARKER,
                        selectors::LOAD_MORE,
                    )
                    .await;
                debug!(
                    note_id = %record.note_id,
                    rendered = outcome.final_count,
                    expected = record.comment_count,
                    "comment area loaded"
                );
                record.comments = CommentAssembler::new(session).collect().await;
            }
        }

        record.evaluate_completeness();
        Ok(record)
    }

    async fn author(&self) -> AuthorIdentity {
        let session = self.session.as_ref();
        match probe::find(session, selectors::AUTHOR_LINK).await {
            Some(link) => {
                let href = probe::attr(session, link, "href").await;
                AuthorIdentity {
                    name: probe::text(session, link).await,
                    id: user_id_from_url(&href),
                    avatar: match probe::find(session, selectors::AUTHOR_AVATAR).await {
                        Some(avatar) => probe::attr(session, avatar, "src").await,
                        None => String::new(),
                    },
                }
            }
            None => AuthorIdentity::default(),
        }
    }

    async fn counter(&self, selector: &str) -> u64 {
        match probe::find(self.session.as_ref(), selector).await {
            Some(el) => parse_count(&probe::text(self.session.as_ref(), el).await),
            None => 0,
        }
    }

    /// Comment count from the action bar, falling back to the first number
    /// in the comment-area header when the bar shows a bare label.
    async fn comment_count(&self) -> u64 {
        let from_bar = self.counter(selectors::CHAT_COUNT).await;
        if from_bar > 0 {
            return from_bar;
        }

        let session = self.session.as_ref();
        if let Some(total) = probe::find(session, selectors::COMMENTS_TOTAL).await {
            let text = probe::text(session, total).await;
            if let Some(m) = DIGITS_REGEX.find(&text) {
                return m.as_str().parse().unwrap_or(0);
            }
        }
        0
    }

    /// A couple of small random scrolls so the session does not read the
    /// page the instant it renders.
    async fn humanize(&self) {
        let (scrolls, deltas) = {
            let mut rng = rand::thread_rng();
            let scrolls =
                rng.gen_range(self.extract.humanize_scrolls_min..=self.extract.humanize_scrolls_max);
            let deltas: Vec<i64> = (0..scrolls).map(|_| rng.gen_range(300..=800)).collect();
            (scrolls, deltas)
        };
        debug!(scrolls, "humanizing scroll");
        for delta in deltas {
            if let Err(e) = self.session.scroll_by(delta).await {
                debug!(error = %e, "humanizing scroll failed");
            }
            random_sleep(200, 500).await;
        }
    }
}

#[async_trait]
impl NoteExtractor for DetailExtractor {
    async fn extract(&self, url: &str) -> NoteRecord {
        match self.try_extract(url).await {
            Ok(record) => record,
            Err(e) => {
                warn!(%url, error = %e, "extraction failed, emitting incomplete record");
                NoteRecord::incomplete(note_id_from_url(url), url)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeSession;

    fn fast_extractor(session: Arc<FakeSession>) -> DetailExtractor {
        DetailExtractor::new(
            session,
            LoaderConfig {
                max_no_progress: 2,
                max_steps: 5,
                step_pause_ms: 1,
                stimulus_pause_ms: 1,
            },
            ExtractConfig {
                settle_min_ms: 1,
                settle_max_ms: 2,
                humanize_scrolls_min: 0,
                humanize_scrolls_max: 0,
            },
        )
    }

    #[tokio::test]
    async fn test_fields_extract_independently() {
        let fake = Arc::new(FakeSession::new());
        let title = fake.add_node("A note title", &[]);
        fake.set_matches(selectors::DETAIL_TITLE, vec![title]);
        let like = fake.add_node("1.2万", &[]);
        fake.set_matches(selectors::LIKE_COUNT, vec![like]);
        let tag = fake.add_node("#旅行", &[]);
        fake.set_matches(selectors::HASH_TAG, vec![tag]);
        let img = fake.add_node("", &[("src", "https://img/1.jpg")]);
        let img_dup = fake.add_node("", &[("src", "https://img/1.jpg")]);
        fake.set_matches(selectors::SLIDER_IMAGE, vec![img, img_dup]);

        let extractor = fast_extractor(fake.clone());
        let record = extractor.extract("https://x/explore/n1?xsec_token=t").await;

        assert_eq!(record.note_id, "n1");
        assert_eq!(record.title, "A note title");
        assert_eq!(record.like_count, 12_000);
        assert_eq!(record.tags, vec!["#旅行"]);
        assert_eq!(record.image_links, vec!["https://img/1.jpg"]);
        assert!(record.content.is_empty());
        assert!(record.complete);
    }

    #[tokio::test]
    async fn test_empty_page_marks_incomplete() {
        let fake = Arc::new(FakeSession::new());
        let extractor = fast_extractor(fake.clone());

        let record = extractor.extract("https://x/explore/n2").await;

        assert_eq!(record.note_id, "n2");
        assert!(!record.complete);
        assert_eq!(fake.navigations(), vec!["https://x/explore/n2"]);
    }

    #[tokio::test]
    async fn test_comment_total_fallback_parses_header() {
        let fake = Arc::new(FakeSession::new());
        let header = fake.add_node("共 37 条评论", &[]);
        fake.set_matches(selectors::COMMENTS_TOTAL, vec![header]);

        let extractor = fast_extractor(fake.clone());
        assert_eq!(extractor.comment_count().await, 37);
    }
}
