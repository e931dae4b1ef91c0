//! Runs one batch of notes through the model call and the parser.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use xhsop_core::{AnalysisOutcome, FailureKind, NoteRecord};

use crate::analyzer::Analyzer;
use crate::error::BatchError;
use crate::parser::AnalysisParser;

/// Per-batch execution settings.
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// In-flight model calls per batch; `1` runs notes strictly in order.
    pub max_concurrency: usize,
    /// Deadline applied to each individual model call.
    pub call_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            call_timeout: Duration::from_secs(120),
        }
    }
}

/// Outcome of one batch, one entry per submitted note in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub batch_index: usize,
    pub per_note_results: Vec<(String, AnalysisOutcome)>,
}

impl BatchReport {
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.per_note_results
            .iter()
            .filter(|(_, outcome)| !outcome.is_failed())
            .count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.per_note_results
            .iter()
            .filter(|(_, outcome)| outcome.is_failed())
            .count()
    }

    #[must_use]
    pub fn failures_by_kind(&self) -> BTreeMap<FailureKind, usize> {
        let mut counts = BTreeMap::new();
        for (_, outcome) in &self.per_note_results {
            if let Some(failure) = outcome.failure() {
                *counts.entry(failure.kind).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Executes a single batch. The orchestrator depends on this seam rather
/// than on [`BatchRunner`] directly.
pub trait RunBatch: Send + Sync {
    /// # Errors
    ///
    /// Returns [`BatchError`] only when the batch as a whole could not run.
    /// Per-note problems are reported inside the [`BatchReport`].
    fn run_batch(
        &self,
        batch_index: usize,
        notes: &[NoteRecord],
    ) -> impl Future<Output = Result<BatchReport, BatchError>> + Send;
}

/// Drives an [`Analyzer`] over a batch with bounded concurrency.
#[derive(Debug)]
pub struct BatchRunner<A> {
    analyzer: A,
    parser: AnalysisParser,
    config: RunnerConfig,
}

impl<A: Analyzer> BatchRunner<A> {
    #[must_use]
    pub fn new(analyzer: A, parser: AnalysisParser, config: RunnerConfig) -> Self {
        Self {
            analyzer,
            parser,
            config: RunnerConfig {
                max_concurrency: config.max_concurrency.max(1),
                ..config
            },
        }
    }

    /// Analyze one note. Never fails: call errors and timeouts become
    /// failure outcomes.
    pub async fn analyze_note(&self, note: &NoteRecord) -> AnalysisOutcome {
        let timeout = self.config.call_timeout;
        match tokio::time::timeout(timeout, self.analyzer.analyze(note)).await {
            Ok(Ok(raw)) => self.parser.parse(&raw),
            Ok(Err(e)) => {
                tracing::warn!(note_id = %note.note_id, error = %e, "model call failed");
                AnalysisOutcome::failed(FailureKind::AnalysisCallFailed, e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    note_id = %note.note_id,
                    timeout_secs = timeout.as_secs_f64(),
                    "model call timed out"
                );
                AnalysisOutcome::failed(
                    FailureKind::Timeout,
                    format!("model call exceeded {}s deadline", timeout.as_secs_f64()),
                )
            }
        }
    }

    async fn keyed_outcome(&self, note: &NoteRecord) -> (String, AnalysisOutcome) {
        (note.note_id.clone(), self.analyze_note(note).await)
    }
}

impl<A: Analyzer> RunBatch for BatchRunner<A> {
    async fn run_batch(
        &self,
        batch_index: usize,
        notes: &[NoteRecord],
    ) -> Result<BatchReport, BatchError> {
        self.analyzer.prepare().await?;

        let pending: Vec<_> = notes.iter().map(|note| self.keyed_outcome(note)).collect();
        let per_note_results: Vec<(String, AnalysisOutcome)> = stream::iter(pending)
            .buffered(self.config.max_concurrency)
            .collect()
            .await;

        let report = BatchReport {
            batch_index,
            per_note_results,
        };
        tracing::info!(
            batch_index,
            notes = notes.len(),
            succeeded = report.succeeded_count(),
            failed = report.failed_count(),
            "batch finished"
        );
        Ok(report)
    }
}
