use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::AppError;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a road safety engineering assistant. Recommend interventions only \
from the provided database context, cite the IRC standard and clause for each \
recommendation, and keep the answer short and practical.";

#[derive(Debug, Clone)]
pub struct Config {
    pub catalog_path: PathBuf,
    pub redis_url: Option<String>,
    pub system_prompt: String,
    pub default_top_k: usize,
    pub stream_summaries: bool,
}

impl Config {
    /// Required:
    /// - `CATALOG_PATH` (the converted interventions JSON)
    ///
    /// Optional:
    /// - `REDIS_URL`
    /// - `SYSTEM_PROMPT_PATH` (falls back to a built-in prompt)
    /// - `DEFAULT_TOP_K` (default: 3)
    /// - `OLLAMA_STREAM` (set to "1"/"true" to aggregate streamed chunks)
    pub fn from_env() -> Result<Self, AppError> {
        let catalog_path = std::env::var("CATALOG_PATH")
            .map_err(|_| AppError::Config("CATALOG_PATH environment variable is required".to_string()))?;
        let catalog_path = Path::new(&catalog_path).to_path_buf();

        let system_prompt = match std::env::var("SYSTEM_PROMPT_PATH") {
            Ok(path) => match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path, error = %e, "system prompt file unreadable, using built-in default");
                    DEFAULT_SYSTEM_PROMPT.to_string()
                }
            },
            Err(_) => DEFAULT_SYSTEM_PROMPT.to_string(),
        };

        let default_top_k = std::env::var("DEFAULT_TOP_K")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&k| k > 0)
            .unwrap_or(3);

        let stream_summaries = std::env::var("OLLAMA_STREAM")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            catalog_path,
            redis_url: std::env::var("REDIS_URL").ok(),
            system_prompt,
            default_top_k,
            stream_summaries,
        })
    }
}
