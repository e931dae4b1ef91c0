//! Drives batches from a note store through a [`RunBatch`] implementation
//! and accumulates [`RunStatistics`].

use std::collections::{BTreeMap, HashSet};
use std::future::Future;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use xhsop_core::{AnalysisOutcome, BatchLimits, ContentKind, FailureKind, NoteRecord};

use crate::error::{BatchError, StoreError};
use crate::runner::{BatchReport, RunBatch};

/// Storage collaborator: reads pending notes and persists outcomes.
pub trait NoteStore: Send + Sync {
    /// Up to `limit` notes that have not been analyzed successfully.
    fn get_unprocessed_notes(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<NoteRecord>, StoreError>> + Send;

    /// Upsert one outcome keyed by `note_id`. `Ok(false)` means no row matched.
    fn write_analysis(
        &self,
        note_id: &str,
        outcome: &AnalysisOutcome,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Counters accumulated over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    pub total_notes: usize,
    pub total_succeeded: usize,
    pub total_failed: usize,
    pub batches_run: usize,
    pub batches_errored: usize,
    pub writes_failed: usize,
    pub cancelled: bool,
    pub failures_by_kind: BTreeMap<FailureKind, usize>,
}

impl RunStatistics {
    pub fn merge(&mut self, report: &BatchReport) {
        let succeeded = report.succeeded_count();
        let failed = report.failed_count();
        self.total_notes += succeeded + failed;
        self.total_succeeded += succeeded;
        self.total_failed += failed;
        self.batches_run += 1;
        for (kind, count) in report.failures_by_kind() {
            *self.failures_by_kind.entry(kind).or_insert(0) += count;
        }
    }

    /// No failed notes, errored batches or failed writes.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.total_failed == 0 && self.batches_errored == 0 && self.writes_failed == 0
    }

    /// At least one note was attempted and none succeeded.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.total_notes > 0 && self.total_succeeded == 0
    }

    /// Share of attempted notes that succeeded, `0.0` when nothing ran.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_notes == 0 {
            0.0
        } else {
            self.total_succeeded as f64 / self.total_notes as f64
        }
    }
}

/// Partitions notes into batches, persists each outcome and keeps the
/// statistics.
pub struct BatchOrchestrator<R, S> {
    runner: R,
    store: S,
    cancel: CancellationToken,
}

impl<R: RunBatch, S: NoteStore> BatchOrchestrator<R, S> {
    #[must_use]
    pub fn new(runner: R, store: S) -> Self {
        Self {
            runner,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. one cancelled from a Ctrl-C handler.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `all_notes` in consecutive batches of at most `batch_size`.
    ///
    /// Always returns statistics. A batch whose runner call errors is counted
    /// in `batches_errored` and skipped; the next batch still runs.
    pub async fn run(&self, all_notes: &[NoteRecord], batch_size: usize) -> RunStatistics {
        let mut stats = RunStatistics::default();
        self.run_into(all_notes, batch_size, 0, &mut stats).await;
        stats
    }

    /// Pull notes from the store until it runs dry, `max_total_notes` is
    /// reached or the run is cancelled.
    pub async fn run_from_store(&self, limits: BatchLimits) -> RunStatistics {
        let limits = limits.clamped();
        let mut stats = RunStatistics::default();
        let mut attempted: HashSet<String> = HashSet::new();
        // Attempted notes whose success has been written back.
        let mut settled = 0usize;
        let mut next_batch_index = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                tracing::warn!("run cancelled before reading the next page");
                break;
            }

            let remaining = limits.max_total_notes.saturating_sub(attempted.len());
            if remaining == 0 {
                tracing::info!(
                    max_total_notes = limits.max_total_notes,
                    "note cap reached"
                );
                break;
            }

            // Failed or unwritten notes from earlier pages are still
            // unprocessed in the store and come back ahead of fresh ones, so
            // over-read by exactly that many.
            let wanted = limits.read_batch_size.min(remaining);
            let still_pending = attempted.len() - settled;
            let page = match self.read_page(wanted + still_pending).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(error = %e, "failed to read unprocessed notes");
                    stats.batches_errored += 1;
                    break;
                }
            };

            let fresh: Vec<NoteRecord> = page
                .into_iter()
                .filter(|note| attempted.insert(note.note_id.clone()))
                .take(wanted)
                .collect();
            if fresh.is_empty() {
                tracing::info!("no unprocessed notes left");
                break;
            }

            tracing::info!(
                notes = fresh.len(),
                attempted = attempted.len(),
                "read page of unprocessed notes"
            );
            let progress = self
                .run_into(&fresh, limits.ai_batch_size, next_batch_index, &mut stats)
                .await;
            next_batch_index = progress.next_batch_index;
            settled += progress.settled;
            if stats.cancelled {
                break;
            }
        }

        log_summary(&stats);
        stats
    }

    async fn read_page(&self, limit: usize) -> Result<Vec<NoteRecord>, BatchError> {
        Ok(self.store.get_unprocessed_notes(limit).await?)
    }

    async fn run_into(
        &self,
        notes: &[NoteRecord],
        batch_size: usize,
        first_batch_index: usize,
        stats: &mut RunStatistics,
    ) -> Progress {
        let batch_size = batch_size.max(1);
        log_content_mix(notes);

        let mut batch_index = first_batch_index;
        let mut settled = 0usize;
        for batch in notes.chunks(batch_size) {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                tracing::warn!(batch_index, "run cancelled, skipping remaining batches");
                break;
            }

            match self.runner.run_batch(batch_index, batch).await {
                Ok(report) => {
                    settled += self.persist(&report, stats).await;
                    stats.merge(&report);
                }
                Err(e) => {
                    tracing::error!(batch_index, error = %e, "batch failed");
                    stats.batches_errored += 1;
                }
            }
            batch_index += 1;
        }
        Progress {
            next_batch_index: batch_index,
            settled,
        }
    }

    /// Returns how many successful outcomes were written.
    async fn persist(&self, report: &BatchReport, stats: &mut RunStatistics) -> usize {
        let mut settled = 0usize;
        for (note_id, outcome) in &report.per_note_results {
            match self.store.write_analysis(note_id, outcome).await {
                Ok(true) => {
                    if !outcome.is_failed() {
                        settled += 1;
                    }
                }
                Ok(false) => {
                    tracing::warn!(note_id = %note_id, "write matched no stored note");
                    stats.writes_failed += 1;
                }
                Err(e) => {
                    tracing::error!(note_id = %note_id, error = %e, "failed to persist analysis");
                    stats.writes_failed += 1;
                }
            }
        }
        settled
    }
}

/// Where a [`BatchOrchestrator::run_into`] call left off.
struct Progress {
    next_batch_index: usize,
    settled: usize,
}

fn log_content_mix(notes: &[NoteRecord]) {
    if notes.is_empty() {
        return;
    }
    let (mut text, mut image, mut video, mut mixed) = (0usize, 0usize, 0usize, 0usize);
    for note in notes {
        match note.content_kind() {
            ContentKind::Text => text += 1,
            ContentKind::Image => image += 1,
            ContentKind::Video => video += 1,
            ContentKind::Mixed => mixed += 1,
        }
    }
    tracing::info!(
        notes = notes.len(),
        text,
        image,
        video,
        mixed,
        "content mix"
    );
}

fn log_summary(stats: &RunStatistics) {
    tracing::info!(
        total_notes = stats.total_notes,
        succeeded = stats.total_succeeded,
        failed = stats.total_failed,
        batches_run = stats.batches_run,
        batches_errored = stats.batches_errored,
        writes_failed = stats.writes_failed,
        cancelled = stats.cancelled,
        "run finished"
    );
}
