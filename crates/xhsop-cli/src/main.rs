mod analyze;
mod store;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use xhsop_analysis::{AnalysisParser, EmotionSynonyms};

#[derive(Debug, Parser)]
#[command(name = "xhsop")]
#[command(about = "Brand and sentiment analysis for Xiaohongshu notes")]
struct Cli {
    /// Log filter used when `RUST_LOG` is not set
    #[arg(long, global = true, env = "XHSOP_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyze unprocessed notes from the database
    Analyze {
        /// Notes per model batch (defaults to XHSOP_BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Maximum notes attempted in this run (defaults to XHSOP_MAX_TOTAL_NOTES)
        #[arg(long)]
        limit: Option<usize>,

        /// Concurrent model calls per batch (defaults to XHSOP_MAX_CONCURRENT_CALLS)
        #[arg(long)]
        concurrency: Option<usize>,

        /// List the notes that would be analyzed without calling the model or writing
        #[arg(long)]
        dry_run: bool,

        /// Only analyze these notes if they are still pending (repeatable)
        #[arg(long = "note-id", value_name = "NOTE_ID")]
        note_ids: Vec<String>,
    },
    /// Show analysis progress counts
    Status {
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: String,
    },
    /// Parse a raw model response from FILE (or stdin) and print the stored record
    Parse {
        file: Option<PathBuf>,

        /// YAML sentiment synonym table
        #[arg(long, env = "XHSOP_EMOTION_SYNONYMS_PATH")]
        synonyms: Option<PathBuf>,
    },
    /// Database maintenance
    Db {
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: String,

        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check that the database is reachable
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Analyze {
            batch_size,
            limit,
            concurrency,
            dry_run,
            note_ids,
        } => {
            analyze::run_analyze(analyze::AnalyzeOptions {
                batch_size,
                limit,
                concurrency,
                dry_run,
                note_ids,
            })
            .await
        }
        Commands::Status { database_url } => run_status(&database_url).await,
        Commands::Parse { file, synonyms } => run_parse(file.as_deref(), synonyms.as_deref()),
        Commands::Db {
            database_url,
            command,
        } => run_db(&database_url, &command).await,
    }
}

async fn run_status(database_url: &str) -> anyhow::Result<()> {
    let pool = xhsop_db::connect_pool(database_url, xhsop_db::PoolConfig::default()).await?;
    let summary = xhsop_db::analysis_summary(&pool).await?;

    println!("notes:    {}", summary.total);
    println!("analyzed: {}", summary.analyzed);
    println!("failed:   {}", summary.failed);
    println!("pending:  {}", summary.pending);
    for (error_type, count) in &summary.failures_by_type {
        println!("  {error_type}: {count}");
    }
    Ok(())
}

fn run_parse(file: Option<&Path>, synonyms: Option<&Path>) -> anyhow::Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => std::io::read_to_string(std::io::stdin())?,
    };
    let table = match synonyms {
        Some(path) => EmotionSynonyms::load(path)?,
        None => EmotionSynonyms::default(),
    };

    let record = AnalysisParser::new(table).parse(&raw).to_record();
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn run_db(database_url: &str, command: &DbCommands) -> anyhow::Result<()> {
    let pool = xhsop_db::connect_pool(database_url, xhsop_db::PoolConfig::default()).await?;
    match command {
        DbCommands::Migrate => {
            let applied = xhsop_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        DbCommands::Ping => {
            xhsop_db::ping(&pool).await?;
            println!("database reachable");
        }
    }
    Ok(())
}
