//! Shared domain types and configuration for the note analysis pipeline.

mod analysis;
mod app_config;
mod config;
mod note;

use thiserror::Error;

pub use analysis::{
    AnalysisFailure, AnalysisOutcome, AnalysisRecord, AnalysisResult, Emotion, FailureKind,
};
pub use app_config::{AppConfig, BatchLimits, Environment, MAX_CONTEXT_NOTES};
pub use config::{load_app_config, load_app_config_from_env};
pub use note::{ContentKind, NoteRecord};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
