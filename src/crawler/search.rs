//! Keyword search collector
//!
//! Navigates the keyword search surface and harvests summary rows across a
//! handful of scroll batches. Each batch is persisted as it is extracted so
//! an interrupted run keeps what it saw; harvested note links feed the
//! detail pipeline.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use crate::browser::{probe, ElementId, PageSession};
use crate::config::BrowserConfig;
use crate::crawler::count::parse_count;
use crate::crawler::ids::note_id_from_url;
use crate::crawler::selectors;
use crate::models::NoteSummary;
use crate::storage::NoteStore;
use crate::utils::random_sleep;

/// What one search run produced
#[derive(Debug, Default)]
pub struct SearchHarvest {
    pub summaries: Vec<NoteSummary>,
    pub links: Vec<String>,
}

/// Collects summary rows from the keyword search surface
pub struct SearchCollector<'a> {
    session: Arc<dyn PageSession>,
    store: &'a dyn NoteStore,
    config: &'a BrowserConfig,
}

impl<'a> SearchCollector<'a> {
    pub fn new(
        session: Arc<dyn PageSession>,
        store: &'a dyn NoteStore,
        config: &'a BrowserConfig,
    ) -> Self {
        Self {
            session,
            store,
            config,
        }
    }

    /// Search `keyword` and harvest `batches` scroll batches of results.
    pub async fn run(&self, keyword: &str, batches: u32) -> anyhow::Result<SearchHarvest> {
        let encoded: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
        let search_url = self.config.search_url_template.replace("{keyword}", &encoded);

        self.session
            .navigate(&search_url)
            .await
            .map_err(|e| anyhow::anyhow!("search navigation failed: {e}"))?;
        info!(keyword, batches, "keyword search started");
        random_sleep(
            self.config.search_settle_min_ms,
            self.config.search_settle_max_ms,
        )
        .await;

        let mut harvest = SearchHarvest::default();
        let mut seen = HashSet::new();

        for batch in 0..batches {
            let rows = probe::all(self.session.as_ref(), selectors::SEARCH_ITEM).await;
            info!(batch = batch + 1, rows = rows.len(), "extracting result batch");

            for row in rows {
                let Some(summary) = self.parse_row(row).await else {
                    continue;
                };
                if !seen.insert(summary.note_link.clone()) {
                    continue;
                }
                if let Err(e) = self.store.upsert_summary(&summary) {
                    warn!(note_id = %summary.note_id, error = %e, "summary upsert failed");
                }
                harvest.links.push(summary.note_link.clone());
                harvest.summaries.push(summary);
            }

            if batch + 1 < batches {
                if let Err(e) = self.session.scroll_to_bottom().await {
                    warn!(error = %e, "batch scroll failed");
                }
                random_sleep(self.config.batch_pause_min_ms, self.config.batch_pause_max_ms)
                    .await;
            }
        }

        info!(
            summaries = harvest.summaries.len(),
            "keyword search finished"
        );
        Ok(harvest)
    }

    /// One result card. Rows without a note link are discarded; every other
    /// field degrades to its default.
    async fn parse_row(&self, row: ElementId) -> Option<NoteSummary> {
        let session = self.session.as_ref();

        let explore = probe::find_in(session, row, selectors::SEARCH_NOTE_LINK).await?;
        let href = probe::attr(session, explore, "href").await;
        if href.is_empty() {
            return None;
        }
        let note_link = self.absolute_link(&href).await?;

        let mut title = probe::text_under(session, row, selectors::SEARCH_TITLE).await;
        if title.is_empty() {
            title = probe::text_under(session, row, selectors::SEARCH_TITLE_FALLBACK).await;
        }
        let mut author = probe::text_under(session, row, selectors::SEARCH_AUTHOR).await;
        if author.is_empty() {
            author = probe::text_under(session, row, selectors::SEARCH_AUTHOR_FALLBACK).await;
        }

        Some(NoteSummary {
            note_id: note_id_from_url(&note_link),
            title,
            author,
            like_count: parse_count(
                &probe::text_under(session, row, selectors::SEARCH_LIKE).await,
            ),
            cover_pic: probe::attr_under(session, row, selectors::SEARCH_COVER, "src").await,
            author_avatar: probe::attr_under(session, row, selectors::SEARCH_AVATAR, "src").await,
            note_link,
        })
    }

    /// Resolve a relative card link against the site base and tag it with
    /// the search source marker the detail page expects.
    async fn absolute_link(&self, href: &str) -> Option<String> {
        let base = Url::parse(&self.config.base_url).ok()?;
        let mut url = base.join(href).ok()?;
        if !url.query_pairs().any(|(k, _)| k == "xsec_source") {
            url.query_pairs_mut()
                .append_pair("xsec_source", "pc_search");
        }
        Some(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeSession;
    use crate::storage::MemoryNoteStore;

    fn fast_config() -> BrowserConfig {
        BrowserConfig {
            search_settle_min_ms: 1,
            search_settle_max_ms: 2,
            batch_pause_min_ms: 1,
            batch_pause_max_ms: 2,
            ..BrowserConfig::default()
        }
    }

    fn stage_row(fake: &FakeSession, note_id: &str, title: &str) -> ElementId {
        let row = fake.add_node("", &[]);
        let link = fake.add_node(
            "",
            &[("href", &format!("/explore/{note_id}?xsec_token=tok"))],
        );
        fake.set_scoped(row, selectors::SEARCH_NOTE_LINK, vec![link]);
        let title_el = fake.add_node(title, &[]);
        fake.set_scoped(row, selectors::SEARCH_TITLE, vec![title_el]);
        let like = fake.add_node("3k", &[]);
        fake.set_scoped(row, selectors::SEARCH_LIKE, vec![like]);
        row
    }

    #[tokio::test]
    async fn test_rows_harvest_and_persist() {
        let fake = Arc::new(FakeSession::new());
        let r1 = stage_row(&fake, "n1", "first");
        let r2 = stage_row(&fake, "n2", "second");
        fake.set_matches(selectors::SEARCH_ITEM, vec![r1, r2]);

        let store = MemoryNoteStore::new();
        let config = fast_config();
        let collector = SearchCollector::new(fake.clone(), &store, &config);

        let harvest = collector.run("露营", 1).await.unwrap();

        assert_eq!(harvest.summaries.len(), 2);
        assert_eq!(harvest.summaries[0].note_id, "n1");
        assert_eq!(harvest.summaries[0].like_count, 3_000);
        assert!(harvest.summaries[0].note_link.contains("xsec_source=pc_search"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_links_collapse_across_batches() {
        let fake = Arc::new(FakeSession::new());
        let row = stage_row(&fake, "n1", "only");
        fake.set_matches(selectors::SEARCH_ITEM, vec![row]);

        let store = MemoryNoteStore::new();
        let config = fast_config();
        let collector = SearchCollector::new(fake.clone(), &store, &config);

        let harvest = collector.run("露营", 3).await.unwrap();

        assert_eq!(harvest.summaries.len(), 1);
        assert_eq!(harvest.links.len(), 1);
    }

    #[tokio::test]
    async fn test_row_without_link_is_discarded() {
        let fake = Arc::new(FakeSession::new());
        let bare = fake.add_node("", &[]);
        let good = stage_row(&fake, "n1", "kept");
        fake.set_matches(selectors::SEARCH_ITEM, vec![bare, good]);

        let store = MemoryNoteStore::new();
        let config = fast_config();
        let collector = SearchCollector::new(fake.clone(), &store, &config);

        let harvest = collector.run("露营", 1).await.unwrap();

        assert_eq!(harvest.summaries.len(), 1);
        assert_eq!(harvest.summaries[0].title, "kept");
    }
}
