use std::future::Future;
use std::sync::Arc;

use xhsop_core::NoteRecord;

use crate::error::AnalyzerError;

/// The external model call: one note in, raw response text out.
///
/// Implementations may fail on transport errors; the batch runner turns
/// those into per-note failures.
pub trait Analyzer: Send + Sync {
    fn analyze(
        &self,
        note: &NoteRecord,
    ) -> impl Future<Output = Result<String, AnalyzerError>> + Send;

    /// Batch-level readiness check, run once before each batch.
    ///
    /// An error here fails the whole batch instead of its notes.
    fn prepare(&self) -> impl Future<Output = Result<(), AnalyzerError>> + Send {
        async { Ok(()) }
    }
}

impl<A: Analyzer> Analyzer for Arc<A> {
    fn analyze(
        &self,
        note: &NoteRecord,
    ) -> impl Future<Output = Result<String, AnalyzerError>> + Send {
        (**self).analyze(note)
    }

    fn prepare(&self) -> impl Future<Output = Result<(), AnalyzerError>> + Send {
        (**self).prepare()
    }
}
