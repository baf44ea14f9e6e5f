use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::WorkerError;

/// Top-level configuration for one worker session.
///
/// Every section has working defaults, so `WorkerConfig::default()` is a
/// usable local setup (Ollama on localhost). A YAML file only needs the
/// keys it wants to override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub provider: ProviderConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Endpoint override; each provider has its own default.
    pub base_url: Option<String>,
    /// API key given directly in config. Takes precedence over the env var.
    pub api_key: Option<String>,
    /// Name of the environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
    /// Chat model override; resolved per provider kind when unset.
    pub chat_model: Option<String>,
    /// Embedding model override; resolved per provider kind when unset.
    pub embedding_model: Option<String>,
    pub temperature: f64,
    /// Transparent retries inside the HTTP client for 429/5xx/connection
    /// errors. The pipeline itself never retries.
    pub max_retries: usize,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Ollama,
            base_url: None,
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            chat_model: None,
            embedding_model: None,
            temperature: 0.3,
            max_retries: 2,
            timeout_secs: 120,
        }
    }
}

impl ProviderConfig {
    pub fn chat_model(&self) -> &str {
        self.chat_model.as_deref().unwrap_or(match self.kind {
            ProviderKind::Ollama => "llama3.2",
            ProviderKind::OpenAi => "gpt-4o",
        })
    }

    pub fn embedding_model(&self) -> &str {
        self.embedding_model.as_deref().unwrap_or(match self.kind {
            ProviderKind::Ollama => "nomic-embed-text",
            ProviderKind::OpenAi => "text-embedding-3-large",
        })
    }

    /// Key from config, falling back to the `api_key_env` variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| env::var(&self.api_key_env).ok().filter(|key| !key.is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length, in characters.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks.
    pub chunk_overlap: usize,
    /// Separator priority for the recursive splitter.
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 750,
            chunk_overlap: 100,
            separators: vec![
                "○".to_string(),
                "●".to_string(),
                ">".to_string(),
                "-".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks returned per search, clamped to the index size.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetUnit {
    Tokens,
    Messages,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Cumulative budget for the retained history window.
    pub budget: usize,
    pub unit: BudgetUnit,
    /// Number of trailing messages summarized for query reformulation.
    pub digest_window: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            budget: 100_000,
            unit: BudgetUnit::Tokens,
            digest_window: 5,
        }
    }
}

impl WorkerConfig {
    /// Read and validate a YAML config file. Missing keys keep defaults.
    pub fn load(path: &Path) -> Result<Self, WorkerError> {
        let contents = fs::read_to_string(path).map_err(WorkerError::config)?;
        let config: WorkerConfig =
            serde_yaml::from_str(&contents).map_err(WorkerError::config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.chunking.chunk_size == 0 {
            return Err(WorkerError::Config(
                "chunking.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(WorkerError::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(WorkerError::Config(
                "retrieval.top_k must be at least 1".to_string(),
            ));
        }
        if self.history.budget == 0 {
            return Err(WorkerError::Config(
                "history.budget must be at least 1".to_string(),
            ));
        }
        if self.history.digest_window == 0 {
            return Err(WorkerError::Config(
                "history.digest_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_describe_local_ollama() {
        let config = WorkerConfig::default();
        assert_eq!(config.provider.kind, ProviderKind::Ollama);
        assert_eq!(config.provider.chat_model(), "llama3.2");
        assert_eq!(config.provider.embedding_model(), "nomic-embed-text");
        assert_eq!(config.provider.temperature, 0.3);
        assert_eq!(config.provider.max_retries, 2);
        assert_eq!(config.chunking.chunk_size, 750);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.chunking.separators, vec!["○", "●", ">", "-"]);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.history.budget, 100_000);
        assert_eq!(config.history.unit, BudgetUnit::Tokens);
        assert_eq!(config.history.digest_window, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn openai_kind_switches_model_defaults() {
        let config = ProviderConfig {
            kind: ProviderKind::OpenAi,
            ..Default::default()
        };
        assert_eq!(config.chat_model(), "gpt-4o");
        assert_eq!(config.embedding_model(), "text-embedding-3-large");
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "provider:\n  kind: openai\n  api_key: sk-test\nchunking:\n  chunk_size: 400\n"
        )
        .unwrap();

        let config = WorkerConfig::load(file.path()).unwrap();
        assert_eq!(config.provider.kind, ProviderKind::OpenAi);
        assert_eq!(config.chunking.chunk_size, 400);
        // untouched sections keep their defaults
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.retrieval.top_k, 3);
    }

    #[test]
    fn load_rejects_overlap_not_smaller_than_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "chunking:\n  chunk_size: 100\n  chunk_overlap: 100\n").unwrap();

        let err = WorkerConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, WorkerError::Config(_)));
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn api_key_prefers_config_over_env() {
        let config = ProviderConfig {
            api_key: Some("from-config".to_string()),
            api_key_env: "ASKDOC_TEST_KEY_UNSET".to_string(),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("from-config"));
    }

    #[test]
    fn api_key_falls_back_to_env() {
        env::set_var("ASKDOC_TEST_KEY_FALLBACK", "from-env");
        let config = ProviderConfig {
            api_key: None,
            api_key_env: "ASKDOC_TEST_KEY_FALLBACK".to_string(),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("from-env"));
        env::remove_var("ASKDOC_TEST_KEY_FALLBACK");
    }
}
