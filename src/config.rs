//! Environment-driven configuration.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base URL of the job manager.
    pub manager_host: String,
    /// Number of concurrent worker loops.
    pub pool_count: usize,
    /// Fixed delay between poll retries and `wait` backoffs.
    pub retry_after: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            manager_host: env_required("MANAGER_HOST")?,
            pool_count: env_parsed("WORKER_COUNT", 4),
            retry_after: Duration::from_secs(env_parsed("RETRY_AFTER_SECS", 5)),
        })
    }
}

/// Inference backend configuration (vLLM, OpenAI-compatible).
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub base_url: String,
    pub model_name: String,
    pub max_tokens: u32,
}

impl InferenceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: std::env::var("VLLM_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
            model_name: env_required("MODEL_NAME")?,
            max_tokens: env_parsed("VLLM_MAX_TOKENS", 1024),
        })
    }
}

/// Vector-store (Weaviate) read configuration.
#[derive(Debug, Clone)]
pub struct WeaviateConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
}

impl WeaviateConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_required("WEAVIATE_HOST")?;
        let port: u16 = env_parsed("WEAVIATE_PORT", 8080);
        Ok(Self {
            base_url: format!("http://{host}:{port}"),
            api_key: std::env::var("WEAVIATE_API_KEY")
                .ok()
                .map(SecretString::from),
        })
    }
}

/// Results-endpoint configuration.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub endpoint: String,
}

impl SinkConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: env_required("RESULT_ENDPOINT")?,
        })
    }
}

/// Lexicon file locations for the map description handler.
#[derive(Debug, Clone)]
pub struct LexiconConfig {
    pub liths_path: String,
    pub lith_atts_path: String,
}

impl LexiconConfig {
    pub fn from_env() -> Self {
        Self {
            liths_path: std::env::var("LITH_LEXICON_PATH")
                .unwrap_or_else(|_| "prompts/liths.csv".to_string()),
            lith_atts_path: std::env::var("LITH_ATT_LEXICON_PATH")
                .unwrap_or_else(|_| "prompts/lith_atts.csv".to_string()),
        }
    }
}
