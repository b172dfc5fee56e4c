use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::orchestrator::DEFAULT_GENERATION_TIMEOUT;
use crate::selector::DEFAULT_MAX_RULES;

/// Application configuration loaded explicitly from environment variables.
///
/// The OpenAI-compatible host is configured separately through
/// `OpenAiClientConfig::from_env` (`OPENAI_BASE_URL`, `OPENAI_TIMEOUT_SECS`).
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL. `None` keeps history in process memory.
    pub redis_url: Option<String>,
    /// Filesystem path to the voice-and-tone corpus (JSON).
    pub corpus_path: String,
    /// Model ID sent to the generation host.
    pub model: String,
    pub temperature: Option<f32>,
    /// Upper bound on the single generation call.
    pub generation_timeout: Duration,
    /// Maximum number of rules rendered into one prompt.
    pub max_rules: usize,
    /// Number of applied texts kept per target.
    pub history_capacity: usize,
}

impl Config {
    /// Required:
    /// - `VOICE_CORPUS_PATH`: path to the guideline corpus
    ///
    /// Optional:
    /// - `REDIS_URL`: Redis connection string (omit to keep history in memory)
    /// - `VOICE_MODEL` (default "default"), `VOICE_TEMPERATURE`
    /// - `VOICE_GENERATION_TIMEOUT_MS` (default 5000)
    /// - `VOICE_MAX_RULES` (default 6), `VOICE_HISTORY_CAPACITY` (default 3)
    pub fn from_env() -> Result<Self, AppError> {
        let corpus_path = std::env::var("VOICE_CORPUS_PATH").map_err(|_| {
            AppError::Config("VOICE_CORPUS_PATH environment variable is required".to_string())
        })?;

        let corpus_file = Path::new(&corpus_path);
        if !corpus_file.is_file() {
            return Err(AppError::Config(format!(
                "voice corpus not found at {}",
                corpus_file.display()
            )));
        }

        let generation_timeout = parse_var::<u64>("VOICE_GENERATION_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_GENERATION_TIMEOUT);

        Ok(Self {
            redis_url: std::env::var("REDIS_URL").ok(),
            corpus_path,
            model: std::env::var("VOICE_MODEL").unwrap_or_else(|_| "default".to_string()),
            temperature: parse_var("VOICE_TEMPERATURE")?,
            generation_timeout,
            max_rules: positive("VOICE_MAX_RULES", parse_var("VOICE_MAX_RULES")?)?
                .unwrap_or(DEFAULT_MAX_RULES),
            history_capacity: positive("VOICE_HISTORY_CAPACITY", parse_var("VOICE_HISTORY_CAPACITY")?)?
                .unwrap_or(DEFAULT_HISTORY_CAPACITY),
        })
    }

    pub fn corpus_path(&self) -> PathBuf {
        Path::new(&self.corpus_path).to_path_buf()
    }
}

/// Reads an optional variable; a present but unparsable value is a config error.
fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, AppError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{name} has an invalid value: '{raw}'"))),
        Err(_) => Ok(None),
    }
}

fn positive(name: &str, value: Option<usize>) -> Result<Option<usize>, AppError> {
    match value {
        Some(0) => Err(AppError::Config(format!("{name} must be greater than zero"))),
        other => Ok(other),
    }
}
