//! Batch processor with politeness and backoff
//!
//! Walks an ordered work list through the note extractor one item at a
//! time. Sustained incomplete results look like throttling, so after a
//! configured run of them the processor takes a long unattended recovery
//! pause and then retries the same item. Isolated misses advance normally;
//! persistence failures are reported but never feed the escalation counter.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::PolitenessConfig;
use crate::crawler::NoteExtractor;
use crate::models::BatchReport;
use crate::storage::NoteStore;
use crate::utils::{format_remaining, jitter_ms};

/// Processes one work list of note URLs
pub struct BatchProcessor<'a> {
    extractor: &'a dyn NoteExtractor,
    store: &'a dyn NoteStore,
    config: &'a PolitenessConfig,
    cancel: CancellationToken,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(
        extractor: &'a dyn NoteExtractor,
        store: &'a dyn NoteStore,
        config: &'a PolitenessConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            extractor,
            store,
            config,
            cancel,
        }
    }

    /// Process every URL in order. Returns early only on cancellation; all
    /// extraction-level failure stays inside the loop.
    pub async fn process(&self, urls: &[String]) -> BatchReport {
        let mut report = BatchReport::default();
        let mut consecutive_incomplete: u32 = 0;
        let mut index = 0;

        info!(items = urls.len(), "batch started");

        while index < urls.len() {
            if self.cancel.is_cancelled() {
                warn!(index, "batch cancelled");
                break;
            }

            let url = &urls[index];
            info!(index, %url, "processing item");
            report.attempted += 1;

            let record = self.extractor.extract(url).await;
            if record.complete {
                consecutive_incomplete = 0;
                match self.store.upsert_detail(&record) {
                    Ok(()) => report.persisted += 1,
                    Err(e) => {
                        // persistence trouble is not extraction trouble
                        warn!(note_id = %record.note_id, error = %e, "persist failed");
                        report.persist_failures += 1;
                    }
                }
                report.records.push(record);
            } else {
                report.incomplete += 1;
                consecutive_incomplete += 1;
                warn!(
                    index,
                    consecutive = consecutive_incomplete,
                    "incomplete extraction"
                );
                report.records.push(record);

                if consecutive_incomplete >= self.config.escalation_threshold {
                    report.recoveries += 1;
                    if !self.long_recovery().await {
                        break;
                    }
                    consecutive_incomplete = 0;
                    // same index retried after the pause
                    continue;
                }
            }

            index += 1;
            if index < urls.len() && !self.politeness_delay(index).await {
                break;
            }
        }

        info!(
            attempted = report.attempted,
            persisted = report.persisted,
            incomplete = report.incomplete,
            recoveries = report.recoveries,
            "batch finished"
        );
        report
    }

    /// Short random delay between items; every `rest_every`-th item gets a
    /// longer rest instead. Returns false when cancelled mid-wait.
    async fn politeness_delay(&self, items_done: usize) -> bool {
        let ms = if items_done % self.config.rest_every == 0 {
            info!(items_done, "taking a longer rest");
            jitter_ms(self.config.rest_min_ms, self.config.rest_max_ms)
        } else {
            jitter_ms(self.config.inter_item_min_ms, self.config.inter_item_max_ms)
        };
        self.sleep_cancellable(Duration::from_millis(ms)).await
    }

    /// The long unattended cool-down. A detached task reports remaining time
    /// at a fixed tick; it owns no processing state and is stopped before
    /// the loop resumes. Returns false when cancelled mid-pause.
    async fn long_recovery(&self) -> bool {
        let total = self.config.recovery();
        warn!(
            duration = %format_remaining(total),
            "sustained incomplete results, entering recovery pause"
        );

        let ticker_stop = CancellationToken::new();
        let ticker = {
            let stop = ticker_stop.clone();
            let tick = self.config.countdown_tick();
            let started = Instant::now();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        _ = tokio::time::sleep(tick) => {
                            let remaining = total.saturating_sub(started.elapsed());
                            info!(
                                remaining = %format_remaining(remaining),
                                "recovery pause in progress"
                            );
                        }
                    }
                }
            })
        };

        let resumed = self.sleep_cancellable(total).await;
        ticker_stop.cancel();
        let _ = ticker.await;

        if resumed {
            info!("recovery pause over, resuming");
        }
        resumed
    }

    /// Sleep that wakes early on cancellation; true when it ran to term
    async fn sleep_cancellable(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
