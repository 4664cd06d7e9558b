//! Incremental load controller
//!
//! The site paginates by DOM mutation: items appear as the viewport nears
//! the bottom of the list. The controller keeps stimulating the page until
//! the rendered item count stops growing, the page shows its end marker, or
//! a ceiling is hit. It does not return data; callers re-query the rendered
//! set once the controller reports `Done`.

use tracing::{debug, info, warn};

use crate::browser::{probe, ElementId, PageSession};
use crate::config::LoaderConfig;

/// Load loop phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Items still appearing, or too early to tell
    Scanning,
    /// Count unchanged since the previous step
    Stalled,
    /// End marker observed or a ceiling reached
    Done,
}

/// Why the controller stopped, plus what it saw
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub steps: u32,
    pub final_count: usize,
    pub end_marker_seen: bool,
}

/// Drives one lazily-rendered list to exhaustion
pub struct IncrementalLoader<'a> {
    session: &'a dyn PageSession,
    config: &'a LoaderConfig,
}

impl<'a> IncrementalLoader<'a> {
    pub fn new(session: &'a dyn PageSession, config: &'a LoaderConfig) -> Self {
        Self { session, config }
    }

    /// Reveal as much of `item_selector` under `container` as the page has.
    ///
    /// `end_marker` short-circuits the loop when visible; `load_more` is the
    /// expansion control activated on every second consecutive no-progress
    /// step. A successful activation counts as progress even before the
    /// rendered count catches up.
    pub async fn run(
        &self,
        container: ElementId,
        item_selector: &str,
        end_marker: &str,
        load_more: &str,
    ) -> LoadOutcome {
        self.focus_container(container).await;

        let mut phase = LoadPhase::Scanning;
        let mut previous = probe::all(self.session, item_selector).await.len();
        let mut no_progress: u32 = 0;
        let mut steps: u32 = 0;
        let mut end_marker_seen = false;

        while phase != LoadPhase::Done && steps < self.config.max_steps {
            steps += 1;

            self.stimulate(container).await;
            self.expand_collapsed().await;
            tokio::time::sleep(self.config.step_pause()).await;

            if probe::find(self.session, end_marker).await.is_some() {
                debug!(steps, "end marker visible");
                end_marker_seen = true;
                phase = LoadPhase::Done;
                break;
            }

            let current = probe::all(self.session, item_selector).await.len();
            if current > previous {
                debug!(previous, current, "list grew");
                previous = current;
                no_progress = 0;
                phase = LoadPhase::Scanning;
                continue;
            }

            no_progress += 1;
            phase = LoadPhase::Stalled;
            debug!(no_progress, count = current, "no new items this step");

            // A collapsed expansion control keeps the list from growing even
            // though more content exists; try it on alternate stalled steps.
            if no_progress % 2 == 0 {
                if let Some(control) = probe::find(self.session, load_more).await {
                    if probe::click(self.session, control).await {
                        debug!("activated expansion control");
                        no_progress = 0;
                        phase = LoadPhase::Scanning;
                        continue;
                    }
                }
            }

            if no_progress >= self.config.max_no_progress {
                phase = LoadPhase::Done;
            }
        }

        let final_count = probe::all(self.session, item_selector).await.len();
        info!(steps, final_count, end_marker_seen, "load loop finished");
        LoadOutcome {
            steps,
            final_count,
            end_marker_seen,
        }
    }

    /// One-time preamble: bring the container into view and hand it input
    /// focus so scroll events land on the right scroll region.
    async fn focus_container(&self, container: ElementId) {
        if let Err(e) = self.session.scroll_into_view(container).await {
            debug!(error = %e, "scroll-into-view failed");
        }
        if let Err(e) = self.session.hover(container).await {
            debug!(error = %e, "hover failed");
        }
        if let Err(e) = self.session.focus(container).await {
            debug!(error = %e, "focus failed");
        }
        tokio::time::sleep(self.config.stimulus_pause()).await;
    }

    /// Fire the scroll stimulus sequence; fall back to a keyboard page-down
    /// when every scroll path fails.
    async fn stimulate(&self, container: ElementId) {
        let mut any_succeeded = false;

        if self.session.scroll_by(500).await.is_ok() {
            any_succeeded = true;
        }
        if self.session.scroll_element(container, 500).await.is_ok() {
            any_succeeded = true;
        }
        if self.session.dispatch_wheel(container, 300).await.is_ok() {
            any_succeeded = true;
        }

        if !any_succeeded {
            warn!("all scroll stimuli failed, falling back to PageDown");
            if let Err(e) = self.session.press_key("PageDown").await {
                warn!(error = %e, "keyboard fallback failed");
            }
        }
    }

    /// Click every visible show-more control so collapsed replies render.
    async fn expand_collapsed(&self) {
        for control in probe::all(self.session, crate::crawler::selectors::SHOW_MORE).await {
            probe::click(self.session, control).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeSession;
    use crate::crawler::selectors;

    fn fast_config() -> LoaderConfig {
        LoaderConfig {
            max_no_progress: 3,
            max_steps: 20,
            step_pause_ms: 1,
            stimulus_pause_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_growing_list_reaches_done_within_bound() {
        let session = FakeSession::new();
        let container = session.add_node("", &[]);
        // one item revealed per scroll step, 1 -> 5 then plateau
        session.set_lazy_list(selectors::COMMENT_ITEM, 1, 5, 1);

        let config = fast_config();
        let loader = IncrementalLoader::new(&session, &config);
        let outcome = loader
            .run(
                container,
                selectors::COMMENT_ITEM,
                selectors::END_MARKER,
                selectors::LOAD_MORE,
            )
            .await;

        assert_eq!(outcome.final_count, 5);
        assert!(outcome.steps <= 5 + config.max_no_progress);
        assert!(!outcome.end_marker_seen);
    }

    #[tokio::test]
    async fn test_end_marker_short_circuits() {
        let session = FakeSession::new();
        let container = session.add_node("", &[]);
        session.set_lazy_list(selectors::COMMENT_ITEM, 2, 50, 1);
        // marker appears once four items are revealed
        session.set_end_marker(selectors::END_MARKER, 4);

        let config = fast_config();
        let loader = IncrementalLoader::new(&session, &config);
        let outcome = loader
            .run(
                container,
                selectors::COMMENT_ITEM,
                selectors::END_MARKER,
                selectors::LOAD_MORE,
            )
            .await;

        assert!(outcome.end_marker_seen);
        assert!(outcome.final_count < 50);
    }

    #[tokio::test]
    async fn test_keyboard_fallback_when_scrolls_fail() {
        let session = FakeSession::new();
        let container = session.add_node("", &[]);
        session.set_lazy_list(selectors::COMMENT_ITEM, 1, 4, 1);
        session.set_end_marker(selectors::END_MARKER, 4);
        // viewport, element and wheel scrolls all error; only the
        // page-down key still moves the list
        session.fail_scrolls();

        let config = fast_config();
        let loader = IncrementalLoader::new(&session, &config);
        let outcome = loader
            .run(
                container,
                selectors::COMMENT_ITEM,
                selectors::END_MARKER,
                selectors::LOAD_MORE,
            )
            .await;

        assert!(session.key_presses().iter().all(|k| k == "PageDown"));
        assert!(!session.key_presses().is_empty());
        assert_eq!(outcome.final_count, 4);
        assert!(outcome.end_marker_seen);
    }

    #[tokio::test]
    async fn test_load_more_reveals_remaining_items() {
        let session = FakeSession::new();
        let container = session.add_node("", &[]);
        // scrolling reveals nothing; only the expansion control does
        session.set_lazy_list(selectors::COMMENT_ITEM, 2, 4, 0);
        session.set_end_marker(selectors::END_MARKER, 4);
        let control = session.add_node("加载更多", &[]);
        session.set_matches(selectors::LOAD_MORE, vec![control]);
        session.click_reveals(control, 1);

        let config = fast_config();
        let loader = IncrementalLoader::new(&session, &config);
        let outcome = loader
            .run(
                container,
                selectors::COMMENT_ITEM,
                selectors::END_MARKER,
                selectors::LOAD_MORE,
            )
            .await;

        assert_eq!(outcome.final_count, 4);
        assert!(outcome.end_marker_seen);
        assert_eq!(session.revealed(), 4);
    }

    #[tokio::test]
    async fn test_load_more_click_counts_as_progress() {
        let session = FakeSession::new();
        let container = session.add_node("", &[]);
        let items: Vec<_> = (0..3).map(|_| session.add_node("", &[])).collect();
        session.set_matches(selectors::COMMENT_ITEM, items);
        let control = session.add_node("加载更多", &[]);
        session.set_matches(selectors::LOAD_MORE, vec![control]);

        let config = fast_config();
        let loader = IncrementalLoader::new(&session, &config);
        let outcome = loader
            .run(
                container,
                selectors::COMMENT_ITEM,
                selectors::END_MARKER,
                selectors::LOAD_MORE,
            )
            .await;

        // the control keeps resetting the stall counter, so the absolute
        // ceiling is what ends the loop
        assert_eq!(outcome.steps, config.max_steps);
        assert!(session.click_count() > 0);
    }

    #[tokio::test]
    async fn test_static_list_stops_at_no_progress_ceiling() {
        let session = FakeSession::new();
        let container = session.add_node("", &[]);
        let items: Vec<_> = (0..7).map(|_| session.add_node("", &[])).collect();
        session.set_matches(selectors::COMMENT_ITEM, items);

        let config = fast_config();
        let loader = IncrementalLoader::new(&session, &config);
        let outcome = loader
            .run(
                container,
                selectors::COMMENT_ITEM,
                selectors::END_MARKER,
                selectors::LOAD_MORE,
            )
            .await;

        assert_eq!(outcome.final_count, 7);
        assert!(outcome.steps <= config.max_steps);
    }
}
