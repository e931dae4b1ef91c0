//! Database operations for the `xhs_note` table.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use xhsop_core::{AnalysisRecord, FailureKind, NoteRecord};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// The input columns of an `xhs_note` row that still needs analysis.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NoteRow {
    pub id: i64,
    pub note_id: String,
    pub title: Option<String>,
    pub note_type: Option<String>,
    pub description: Option<String>,
    /// Comma-separated image URLs, as written by the crawler.
    pub image_list: Option<String>,
    pub video_url: Option<String>,
    pub analysis_failed: bool,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl NoteRow {
    #[must_use]
    pub fn into_note_record(self) -> NoteRecord {
        NoteRecord {
            note_id: self.note_id,
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            image_urls: split_image_list(self.image_list.as_deref().unwrap_or_default()),
            video_url: self.video_url.unwrap_or_default(),
        }
    }
}

fn split_image_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

/// Row counts by analysis state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub total: i64,
    pub analyzed: i64,
    pub failed: i64,
    pub pending: i64,
    /// `(error_type, count)` for failed rows, most frequent first.
    pub failures_by_type: Vec<(String, i64)>,
}

#[derive(sqlx::FromRow)]
struct SummaryCounts {
    total: i64,
    analyzed: i64,
    failed: i64,
    pending: i64,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Notes that were never analyzed or whose last analysis failed.
///
/// Never-attempted notes come first, then by `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_unprocessed_notes(pool: &PgPool, limit: i64) -> Result<Vec<NoteRow>, DbError> {
    let rows = sqlx::query_as::<_, NoteRow>(
        "SELECT id, note_id, title, note_type, description, image_list, video_url, \
                analysis_failed, analyzed_at \
         FROM xhs_note \
         WHERE analyzed_at IS NULL OR analysis_failed \
         ORDER BY analysis_failed, id \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// The subset of `note_ids` that still needs analysis, in the same order as
/// [`list_unprocessed_notes`]. Unknown ids and analyzed notes are skipped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_unprocessed_notes_by_ids(
    pool: &PgPool,
    note_ids: &[String],
    limit: i64,
) -> Result<Vec<NoteRow>, DbError> {
    if note_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, NoteRow>(
        "SELECT id, note_id, title, note_type, description, image_list, video_url, \
                analysis_failed, analyzed_at \
         FROM xhs_note \
         WHERE note_id = ANY($1) AND (analyzed_at IS NULL OR analysis_failed) \
         ORDER BY analysis_failed, id \
         LIMIT $2",
    )
    .bind(note_ids)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Write one analysis outcome onto its note row.
///
/// Returns `false` when no row has the given `note_id`. Failure records clear
/// the result columns and set `analysis_failed`, so the note is picked up
/// again by [`list_unprocessed_notes`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_note_analysis(
    pool: &PgPool,
    note_id: &str,
    record: &AnalysisRecord,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE xhs_note \
         SET brand_list = $2, \
             spu_list = $3, \
             emotion_dict = $4, \
             evaluation_dict = $5, \
             analysis_failed = $6, \
             error_type = $7, \
             error_message = $8, \
             analyzed_at = NOW() \
         WHERE note_id = $1",
    )
    .bind(note_id)
    .bind(Json(&record.brand_list))
    .bind(Json(&record.spu_list))
    .bind(Json(&record.emotion_dict))
    .bind(Json(&record.evaluation_dict))
    .bind(record.analysis_failed)
    .bind(record.error_type.map(FailureKind::as_str))
    .bind(record.error_message.as_deref())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Count notes by analysis state and group failures by `error_type`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn analysis_summary(pool: &PgPool) -> Result<AnalysisSummary, DbError> {
    let counts = sqlx::query_as::<_, SummaryCounts>(
        "SELECT COUNT(*) AS total, \
                COUNT(*) FILTER (WHERE analyzed_at IS NOT NULL AND NOT analysis_failed) AS analyzed, \
                COUNT(*) FILTER (WHERE analysis_failed) AS failed, \
                COUNT(*) FILTER (WHERE analyzed_at IS NULL) AS pending \
         FROM xhs_note",
    )
    .fetch_one(pool)
    .await?;

    let failures_by_type = sqlx::query_as::<_, (String, i64)>(
        "SELECT COALESCE(error_type, 'unknown'), COUNT(*) \
         FROM xhs_note \
         WHERE analysis_failed \
         GROUP BY 1 \
         ORDER BY 2 DESC, 1",
    )
    .fetch_all(pool)
    .await?;

    Ok(AnalysisSummary {
        total: counts.total,
        analyzed: counts.analyzed,
        failed: counts.failed,
        pending: counts.pending,
        failures_by_type,
    })
}
