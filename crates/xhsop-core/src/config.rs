use std::str::FromStr;

use crate::app_config::{AppConfig, BatchLimits, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can pass a `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let database_url = require("DATABASE_URL")?;
    // Existing deployments only set the OpenRouter variable.
    let llm_api_key = require("XHSOP_LLM_API_KEY").or_else(|err| {
        require("OPENROUTER_API_KEY").map_err(|_| err)
    })?;

    let env = parse_environment(&or_default("XHSOP_ENV", "development"));
    let log_level = or_default("XHSOP_LOG_LEVEL", "info");

    let llm_base_url = or_default("XHSOP_LLM_BASE_URL", "https://openrouter.ai/api/v1");
    let llm_model = or_default("XHSOP_LLM_MODEL", "google/gemini-2.5-flash-preview");
    let llm_temperature: f32 = parse_var(&lookup, "XHSOP_LLM_TEMPERATURE", "0.1")?;
    let llm_max_tokens: u32 = parse_var(&lookup, "XHSOP_LLM_MAX_TOKENS", "2000")?;
    let llm_request_timeout_secs: u64 =
        parse_var(&lookup, "XHSOP_LLM_REQUEST_TIMEOUT_SECS", "60")?;
    let llm_max_retries: u32 = parse_var(&lookup, "XHSOP_LLM_MAX_RETRIES", "2")?;
    let llm_retry_backoff_base_ms: u64 =
        parse_var(&lookup, "XHSOP_LLM_RETRY_BACKOFF_BASE_MS", "1000")?;

    let max_content_chars: usize = parse_var(&lookup, "XHSOP_MAX_CONTENT_CHARS", "8000")?;
    let max_images_per_note: usize = parse_var(&lookup, "XHSOP_MAX_IMAGES_PER_NOTE", "5")?;

    let batch_limits = BatchLimits {
        ai_batch_size: parse_var(&lookup, "XHSOP_BATCH_SIZE", "10")?,
        read_batch_size: parse_var(&lookup, "XHSOP_READ_BATCH_SIZE", "100")?,
        max_total_notes: parse_var(&lookup, "XHSOP_MAX_TOTAL_NOTES", "200")?,
    };
    let max_concurrent_calls: usize = parse_var(&lookup, "XHSOP_MAX_CONCURRENT_CALLS", "1")?;

    let emotion_synonyms_path = lookup("XHSOP_EMOTION_SYNONYMS_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(std::path::PathBuf::from);

    let db_max_connections: u32 = parse_var(&lookup, "XHSOP_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections: u32 = parse_var(&lookup, "XHSOP_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs: u64 =
        parse_var(&lookup, "XHSOP_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        llm_api_key,
        llm_base_url,
        llm_model,
        llm_temperature,
        llm_max_tokens,
        llm_request_timeout_secs,
        llm_max_retries,
        llm_retry_backoff_base_ms,
        max_content_chars,
        max_images_per_note,
        batch_limits,
        max_concurrent_calls,
        emotion_synonyms_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse `var` (or `default` when unset) into `T`.
fn parse_var<F, T>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
