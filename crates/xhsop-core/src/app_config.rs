/// Upper bound on notes handed to the model in one batch.
pub const MAX_CONTEXT_NOTES: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Batch sizing for one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// Notes per runner batch.
    pub ai_batch_size: usize,
    /// Notes fetched per storage read.
    pub read_batch_size: usize,
    /// Notes attempted per run.
    pub max_total_notes: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            ai_batch_size: 10,
            read_batch_size: 100,
            max_total_notes: 200,
        }
    }
}

impl BatchLimits {
    /// Returns limits that respect each other and [`MAX_CONTEXT_NOTES`].
    ///
    /// Every value is at least 1; the read batch never exceeds the run cap and
    /// the AI batch never exceeds the read batch.
    #[must_use]
    pub fn clamped(self) -> Self {
        let max_total_notes = self.max_total_notes.max(1);

        let mut read_batch_size = self.read_batch_size.max(1);
        if read_batch_size > max_total_notes {
            tracing::warn!(
                requested = read_batch_size,
                limit = max_total_notes,
                "read batch size exceeds the per-run cap; lowering it"
            );
            read_batch_size = max_total_notes;
        }

        let mut ai_batch_size = self.ai_batch_size.max(1);
        if ai_batch_size > MAX_CONTEXT_NOTES {
            tracing::warn!(
                requested = ai_batch_size,
                limit = MAX_CONTEXT_NOTES,
                "analysis batch size exceeds the context limit; lowering it"
            );
            ai_batch_size = MAX_CONTEXT_NOTES;
        }
        if ai_batch_size > read_batch_size {
            tracing::warn!(
                requested = ai_batch_size,
                limit = read_batch_size,
                "analysis batch size exceeds the read batch size; lowering it"
            );
            ai_batch_size = read_batch_size;
        }

        Self {
            ai_batch_size,
            read_batch_size,
            max_total_notes,
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub llm_request_timeout_secs: u64,
    pub llm_max_retries: u32,
    pub llm_retry_backoff_base_ms: u64,
    pub max_content_chars: usize,
    pub max_images_per_note: usize,
    pub batch_limits: BatchLimits,
    pub max_concurrent_calls: usize,
    pub emotion_synonyms_path: Option<std::path::PathBuf>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("llm_api_key", &"[redacted]")
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("llm_temperature", &self.llm_temperature)
            .field("llm_max_tokens", &self.llm_max_tokens)
            .field("llm_request_timeout_secs", &self.llm_request_timeout_secs)
            .field("llm_max_retries", &self.llm_max_retries)
            .field("llm_retry_backoff_base_ms", &self.llm_retry_backoff_base_ms)
            .field("max_content_chars", &self.max_content_chars)
            .field("max_images_per_note", &self.max_images_per_note)
            .field("batch_limits", &self.batch_limits)
            .field("max_concurrent_calls", &self.max_concurrent_calls)
            .field("emotion_synonyms_path", &self.emotion_synonyms_path)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_are_already_clamped() {
        let limits = BatchLimits::default();
        assert_eq!(limits.clamped(), limits);
    }

    #[test]
    fn ai_batch_is_capped_at_context_limit() {
        let limits = BatchLimits {
            ai_batch_size: 50,
            ..BatchLimits::default()
        }
        .clamped();
        assert_eq!(limits.ai_batch_size, MAX_CONTEXT_NOTES);
    }

    #[test]
    fn read_batch_is_capped_at_run_total() {
        let limits = BatchLimits {
            ai_batch_size: 10,
            read_batch_size: 500,
            max_total_notes: 200,
        }
        .clamped();
        assert_eq!(limits.read_batch_size, 200);
    }

    #[test]
    fn ai_batch_never_exceeds_read_batch() {
        let limits = BatchLimits {
            ai_batch_size: 12,
            read_batch_size: 5,
            max_total_notes: 200,
        }
        .clamped();
        assert_eq!(limits.ai_batch_size, 5);
    }

    #[test]
    fn zero_values_become_one() {
        let limits = BatchLimits {
            ai_batch_size: 0,
            read_batch_size: 0,
            max_total_notes: 0,
        }
        .clamped();
        assert_eq!(
            limits,
            BatchLimits {
                ai_batch_size: 1,
                read_batch_size: 1,
                max_total_notes: 1,
            }
        );
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig {
            database_url: "postgres://user:secret@db/notes".to_string(),
            env: Environment::Test,
            log_level: "info".to_string(),
            llm_api_key: "sk-very-secret".to_string(),
            llm_base_url: "https://openrouter.ai/api/v1".to_string(),
            llm_model: "model".to_string(),
            llm_temperature: 0.1,
            llm_max_tokens: 2000,
            llm_request_timeout_secs: 60,
            llm_max_retries: 2,
            llm_retry_backoff_base_ms: 1000,
            max_content_chars: 8000,
            max_images_per_note: 5,
            batch_limits: BatchLimits::default(),
            max_concurrent_calls: 1,
            emotion_synonyms_path: None,
            db_max_connections: 10,
            db_min_connections: 1,
            db_acquire_timeout_secs: 10,
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"), "leaked secret: {rendered}");
        assert!(rendered.contains("[redacted]"));
    }
}
