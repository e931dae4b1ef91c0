//! The `analyze` command: pull unprocessed notes, run them through the model
//! and write the outcomes back.

use tokio_util::sync::CancellationToken;
use xhsop_analysis::{
    AnalysisParser, BatchOrchestrator, BatchRunner, ChatAnalyzer, ChatConfig, EmotionSynonyms,
    RunStatistics, RunnerConfig,
};
use xhsop_core::{AppConfig, BatchLimits};

use crate::store::PgNoteStore;

#[derive(Debug, Clone, Default)]
pub(crate) struct AnalyzeOptions {
    pub batch_size: Option<usize>,
    pub limit: Option<usize>,
    pub concurrency: Option<usize>,
    pub dry_run: bool,
    /// Restrict the run to these notes; empty means every pending note.
    pub note_ids: Vec<String>,
}

/// Command-line overrides applied on top of the configured batch limits.
pub(crate) fn effective_limits(config: &AppConfig, options: &AnalyzeOptions) -> BatchLimits {
    let configured = config.batch_limits;
    BatchLimits {
        ai_batch_size: options.batch_size.unwrap_or(configured.ai_batch_size),
        read_batch_size: configured.read_batch_size,
        max_total_notes: options.limit.unwrap_or(configured.max_total_notes),
    }
    .clamped()
}

/// Run one analysis pass over the notes table.
///
/// # Errors
///
/// Returns an error if configuration is incomplete, the database or model
/// client cannot be set up, or every attempted note failed. Individual note
/// failures are recorded in the database and do not fail the command.
pub(crate) async fn run_analyze(options: AnalyzeOptions) -> anyhow::Result<()> {
    let config = xhsop_core::load_app_config()?;
    let limits = effective_limits(&config, &options);

    let pool_config = xhsop_db::PoolConfig::from_app_config(&config);
    let pool = xhsop_db::connect_pool(&config.database_url, pool_config).await?;
    xhsop_db::run_migrations(&pool).await?;

    let targeted = options.note_ids.len();
    let store = PgNoteStore::new(pool).with_note_ids(options.note_ids);

    if options.dry_run {
        let rows = store.pending_rows(limits.max_total_notes).await?;
        println!("dry-run: would analyze {} notes", rows.len());
        for row in rows {
            let retry = if row.analysis_failed { " (retry)" } else { "" };
            let note = row.into_note_record();
            println!("  {} [{}]{retry}", note.note_id, note.content_kind());
        }
        return Ok(());
    }

    let synonyms = match &config.emotion_synonyms_path {
        Some(path) => EmotionSynonyms::load(path)?,
        None => EmotionSynonyms::default(),
    };
    let chat_config = ChatConfig::from_app_config(&config);
    let runner_config = RunnerConfig {
        max_concurrency: options
            .concurrency
            .unwrap_or(config.max_concurrent_calls)
            .max(1),
        call_timeout: chat_config.call_deadline(),
    };
    let analyzer = ChatAnalyzer::new(chat_config)?;
    let runner = BatchRunner::new(analyzer, AnalysisParser::new(synonyms), runner_config);

    let cancel = CancellationToken::new();
    let orchestrator = BatchOrchestrator::new(runner, store).with_cancellation(cancel.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current batch");
            cancel.cancel();
        }
    });

    tracing::info!(
        model = %config.llm_model,
        ai_batch_size = limits.ai_batch_size,
        read_batch_size = limits.read_batch_size,
        max_total_notes = limits.max_total_notes,
        concurrency = runner_config.max_concurrency,
        targeted,
        "starting analysis run"
    );
    let stats = orchestrator.run_from_store(limits).await;
    print_statistics(&stats);

    if stats.all_failed() {
        anyhow::bail!("all {} attempted notes failed analysis", stats.total_notes);
    }
    Ok(())
}

fn print_statistics(stats: &RunStatistics) {
    println!(
        "analysis complete: {} notes, {} succeeded, {} failed ({:.1}% success)",
        stats.total_notes,
        stats.total_succeeded,
        stats.total_failed,
        stats.success_rate() * 100.0
    );
    println!(
        "batches: {} run, {} errored; {} writes failed",
        stats.batches_run, stats.batches_errored, stats.writes_failed
    );
    for (kind, count) in &stats.failures_by_kind {
        println!("  {kind}: {count}");
    }
    if stats.cancelled {
        println!("run was interrupted; remaining notes stay pending");
    }
}
