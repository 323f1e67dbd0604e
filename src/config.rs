use serde::{Deserialize, Serialize};
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CHUNK_TOKEN_LIMIT: usize = 512;
const DEFAULT_CHUNK_OVERLAP_SENTENCES: usize = 4;

/// Runtime configuration for the Bindery server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Directory that receives one folder per uploaded document.
    pub upload_root: String,
    /// Endpoint of the self-hosted enrichment service.
    pub local_llm_url: String,
    /// Optional endpoint of the hosted enrichment service.
    pub openai_llm_url: Option<String>,
    /// API key forwarded to the enrichment service as `X-API-KEY`.
    pub llm_api_key: String,
    /// Seconds allowed for establishing the enrichment connection.
    pub llm_connect_timeout_secs: u64,
    /// Token budget for a single chunk.
    pub chunk_token_limit: usize,
    /// Number of trailing sentences carried into the next chunk.
    pub chunk_overlap_sentences: usize,
    /// Optional tiktoken encoding name used for token counting.
    pub tokenizer_encoding: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Enrichment backends an upload may be routed to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentBackend {
    /// Self-hosted endpoint configured through `LOCAL_LLM_URL`.
    #[default]
    Local,
    /// Hosted endpoint configured through `OPENAI_LLM_URL`.
    OpenAI,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            upload_root: load_env("BINDERY_UPLOAD_ROOT")?,
            local_llm_url: load_env("LOCAL_LLM_URL")?,
            openai_llm_url: load_env_optional("OPENAI_LLM_URL"),
            llm_api_key: load_env("LLM_API_KEY")?,
            llm_connect_timeout_secs: load_env_optional("LLM_CONNECT_TIMEOUT_SECS")
                .map(|value| {
                    value.parse().map_err(|_| {
                        ConfigError::InvalidValue("LLM_CONNECT_TIMEOUT_SECS".to_string())
                    })
                })
                .transpose()?
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            chunk_token_limit: load_env_optional("CHUNK_TOKEN_LIMIT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("CHUNK_TOKEN_LIMIT".to_string()))
                })
                .transpose()?
                .unwrap_or(DEFAULT_CHUNK_TOKEN_LIMIT),
            chunk_overlap_sentences: load_env_optional("CHUNK_OVERLAP_SENTENCES")
                .map(|value| {
                    value.parse().map_err(|_| {
                        ConfigError::InvalidValue("CHUNK_OVERLAP_SENTENCES".to_string())
                    })
                })
                .transpose()?
                .unwrap_or(DEFAULT_CHUNK_OVERLAP_SENTENCES),
            tokenizer_encoding: load_env_optional("TOKENIZER_ENCODING"),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }

    /// Resolve the enrichment endpoint for the requested backend.
    ///
    /// Falls back to the local endpoint with a warning when the hosted URL
    /// was never configured.
    pub fn endpoint_for(&self, backend: EnrichmentBackend) -> &str {
        match backend {
            EnrichmentBackend::Local => &self.local_llm_url,
            EnrichmentBackend::OpenAI => match &self.openai_llm_url {
                Some(url) => url,
                None => {
                    tracing::warn!(
                        "OPENAI_LLM_URL is not configured; routing to the local endpoint"
                    );
                    &self.local_llm_url
                }
            },
        }
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

impl std::str::FromStr for EnrichmentBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        upload_root = %config.upload_root,
        local_llm_url = %config.local_llm_url,
        server_port = ?config.server_port,
        chunk_token_limit = config.chunk_token_limit,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
