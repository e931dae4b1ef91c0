//! Model-response normalization and batch orchestration for note analysis.
//!
//! Raw model text flows through [`extract_json`], JSON parsing and
//! [`normalize`] inside [`AnalysisParser::parse`], which never fails: every
//! problem becomes a tagged failure outcome. [`BatchRunner`] calls an
//! [`Analyzer`] once per note and [`BatchOrchestrator`] drives batches from a
//! [`NoteStore`], persisting outcomes and accumulating [`RunStatistics`].

pub mod analyzer;
pub mod chat;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod orchestrator;
pub mod parser;
pub mod runner;
pub mod synonyms;

mod prompt;
mod retry;

pub use analyzer::Analyzer;
pub use chat::{ChatAnalyzer, ChatConfig};
pub use error::{AnalyzerError, BatchError, NormalizeError, StoreError, SynonymTableError};
pub use extract::{extract_json, extract_with, Strategy, EXTRACTION_STRATEGIES};
pub use normalize::normalize;
pub use orchestrator::{BatchOrchestrator, NoteStore, RunStatistics};
pub use parser::AnalysisParser;
pub use runner::{BatchReport, BatchRunner, RunBatch, RunnerConfig};
pub use synonyms::EmotionSynonyms;
