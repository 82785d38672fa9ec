use std::env;
use std::path::PathBuf;
use anyhow::{Result, Context};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub max_file_size_mb: usize,
    pub max_concurrent_requests: usize,
    pub request_timeout_seconds: u64,
    pub upload_dir: PathBuf,
    pub database_path: PathBuf,
    pub max_context_chars: usize,
    pub llm: LlmConfig,
}

/// Settings for the chat-completion provider.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub reasoning_model: String,
    pub answer_model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_seconds: u64,
}

// Keeps the API key out of logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("reasoning_model", &self.reasoning_model)
            .field("answer_model", &self.answer_model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            reasoning_model: "deepseek-r1-distill-llama-70b".to_string(),
            answer_model: "llama-3.1-70b-versatile".to_string(),
            temperature: 0.6,
            top_p: 0.95,
            timeout_seconds: 120,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 5000,
            max_file_size_mb: 50,
            max_concurrent_requests: 100,
            request_timeout_seconds: 120,
            upload_dir: PathBuf::from("./uploads"),
            database_path: PathBuf::from("./docqa.db"),
            max_context_chars: 16_000,
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");
        let defaults = Config::default();

        // PORT takes precedence for hosting platforms that inject it.
        let server_port = match env::var("PORT") {
            Ok(_) => Self::parse_env_var("PORT", defaults.server_port),
            Err(_) => Self::parse_env_var("SERVER_PORT", defaults.server_port),
        }
        .context("Failed to parse server port")?;

        let request_timeout_seconds =
            Self::parse_env_var("REQUEST_TIMEOUT_SECONDS", defaults.request_timeout_seconds)
                .context("Failed to parse REQUEST_TIMEOUT_SECONDS")?;

        let config = Config {
            server_host: Self::env_string("SERVER_HOST", &defaults.server_host),
            server_port,
            max_file_size_mb: Self::parse_env_var("MAX_FILE_SIZE_MB", defaults.max_file_size_mb)
                .context("Failed to parse MAX_FILE_SIZE_MB")?,
            max_concurrent_requests: Self::parse_env_var(
                "MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            )
            .context("Failed to parse MAX_CONCURRENT_REQUESTS")?,
            request_timeout_seconds,
            upload_dir: PathBuf::from(Self::env_string(
                "UPLOAD_DIR",
                &defaults.upload_dir.to_string_lossy(),
            )),
            database_path: PathBuf::from(Self::env_string(
                "DATABASE_PATH",
                &defaults.database_path.to_string_lossy(),
            )),
            max_context_chars: Self::parse_env_var("MAX_CONTEXT_CHARS", defaults.max_context_chars)
                .context("Failed to parse MAX_CONTEXT_CHARS")?,
            llm: LlmConfig {
                api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
                base_url: Self::env_string("LLM_BASE_URL", &defaults.llm.base_url),
                reasoning_model: Self::env_string("REASONING_MODEL", &defaults.llm.reasoning_model),
                answer_model: Self::env_string("ANSWER_MODEL", &defaults.llm.answer_model),
                temperature: Self::parse_env_var("LLM_TEMPERATURE", defaults.llm.temperature)
                    .context("Failed to parse LLM_TEMPERATURE")?,
                top_p: Self::parse_env_var("LLM_TOP_P", defaults.llm.top_p)
                    .context("Failed to parse LLM_TOP_P")?,
                timeout_seconds: request_timeout_seconds,
            },
        };

        config.validate()?;

        if config.llm.api_key.is_empty() {
            warn!("GROQ_API_KEY not set; chat requests will fail until it is configured");
        }

        info!("Configuration loaded successfully: {:?}", config);
        Ok(config)
    }

    fn env_string(var_name: &str, default: &str) -> String {
        match env::var(var_name) {
            Ok(val) if !val.trim().is_empty() => val,
            _ => {
                info!("{} not set, using default: {}", var_name, default);
                default.to_string()
            }
        }
    }

    fn parse_env_var<T>(var_name: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr + Copy + std::fmt::Debug,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(val) => match val.trim().parse() {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {} (using default: {:?})", var_name, e, default);
                    Ok(default)
                }
            },
            Err(_) => {
                info!("{} not set, using default: {:?}", var_name, default);
                Ok(default)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            return Err(anyhow::anyhow!("SERVER_PORT must be greater than 0"));
        }
        if self.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(anyhow::anyhow!("MAX_CONCURRENT_REQUESTS must be greater than 0"));
        }
        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("REQUEST_TIMEOUT_SECONDS must be greater than 0"));
        }
        if self.max_context_chars == 0 {
            return Err(anyhow::anyhow!("MAX_CONTEXT_CHARS must be greater than 0"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow::anyhow!("LLM_TEMPERATURE must be between 0 and 2"));
        }
        if !(self.llm.top_p > 0.0 && self.llm.top_p <= 1.0) {
            return Err(anyhow::anyhow!("LLM_TOP_P must be in (0, 1]"));
        }
        Ok(())
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }
}
