//! Postgres-backed [`NoteStore`].

use sqlx::PgPool;
use xhsop_analysis::{NoteStore, StoreError};
use xhsop_core::{AnalysisOutcome, NoteRecord};
use xhsop_db::{DbError, NoteRow};

pub(crate) struct PgNoteStore {
    pool: PgPool,
    note_ids: Vec<String>,
}

impl PgNoteStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self {
            pool,
            note_ids: Vec::new(),
        }
    }

    /// Only read the given notes. An empty list reads every pending note.
    pub(crate) fn with_note_ids(mut self, note_ids: Vec<String>) -> Self {
        self.note_ids = note_ids;
        self
    }

    pub(crate) async fn pending_rows(&self, limit: usize) -> Result<Vec<NoteRow>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        if self.note_ids.is_empty() {
            xhsop_db::list_unprocessed_notes(&self.pool, limit).await
        } else {
            xhsop_db::list_unprocessed_notes_by_ids(&self.pool, &self.note_ids, limit).await
        }
    }
}

impl NoteStore for PgNoteStore {
    async fn get_unprocessed_notes(&self, limit: usize) -> Result<Vec<NoteRecord>, StoreError> {
        let rows = self.pending_rows(limit).await.map_err(StoreError::new)?;
        Ok(rows.into_iter().map(NoteRow::into_note_record).collect())
    }

    async fn write_analysis(
        &self,
        note_id: &str,
        outcome: &AnalysisOutcome,
    ) -> Result<bool, StoreError> {
        xhsop_db::update_note_analysis(&self.pool, note_id, &outcome.to_record())
            .await
            .map_err(StoreError::new)
    }
}
