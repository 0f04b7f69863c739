use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::analysis::coordinator::AnalysisSettings;
use crate::analysis::invoker::RetryPolicy;
use crate::analysis::skill_matcher::MatcherSettings;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or tunables do not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub max_in_flight: usize,
    pub deadline_secs: u64,
    pub skill_match_deadline_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub call_timeout_secs: u64,
    pub similarity_threshold: f32,
    pub similarity_top_k: usize,
    pub corpus_chunk_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_in_flight: parse_env_or("ANALYSIS_MAX_IN_FLIGHT", 4)?,
            deadline_secs: parse_env_or("ANALYSIS_DEADLINE_SECS", 60)?,
            skill_match_deadline_secs: parse_env_or("SKILL_MATCH_DEADLINE_SECS", 90)?,
            retry_max_attempts: parse_env_or("RETRY_MAX_ATTEMPTS", 4)?,
            retry_base_delay_ms: parse_env_or("RETRY_BASE_DELAY_MS", 500)?,
            retry_max_delay_ms: parse_env_or("RETRY_MAX_DELAY_MS", 8000)?,
            call_timeout_secs: parse_env_or("CALL_TIMEOUT_SECS", 30)?,
            similarity_threshold: parse_env_or("SIMILARITY_THRESHOLD", 0.75)?,
            similarity_top_k: parse_env_or("SIMILARITY_TOP_K", 3)?,
            corpus_chunk_size: parse_env_or("CORPUS_CHUNK_SIZE", 500)?,
        })
    }

    /// Core tunables for the analysis coordinator.
    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            max_in_flight: self.max_in_flight,
            deadline: Duration::from_secs(self.deadline_secs),
            skill_deadline: Duration::from_secs(self.skill_match_deadline_secs),
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
                max_delay: Duration::from_millis(self.retry_max_delay_ms),
                attempt_timeout: Duration::from_secs(self.call_timeout_secs),
            },
            matcher: MatcherSettings {
                similarity_threshold: self.similarity_threshold,
                top_k: self.similarity_top_k,
                chunk_size: self.corpus_chunk_size,
            },
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => Ok(default),
    }
}
