use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Number of concurrent blob-store operations allowed at once.
const DEFAULT_BLOB_POOL_SIZE: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub google: GoogleConfig,
    pub models: ModelConfig,
    pub storage: StorageConfig,
    pub prompt: PromptConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Which text provider backs the proxy ("gemini" or "mock").
    pub provider: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Blob-store backend ("s3" or "local").
    pub backend: String,
    /// Bucket name. Empty means image handling is unconfigured.
    pub bucket: String,
    /// Base directory for the "local" backend.
    pub local_path: String,
    /// Key prefix under which uploaded images are stored.
    pub image_prefix: String,
    /// Concurrent blob operations allowed at once.
    pub pool_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    /// File that persists the system prompt across restarts.
    pub path: String,
}

impl ChatConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(ChatConfig {
            common: common_config,
            google: GoogleConfig {
                api_key: get_env("GOOGLE_API_KEY", None, is_prod)?,
            },
            models: ModelConfig {
                provider: get_env("CHAT_PROVIDER", Some("gemini"), is_prod)?,
            },
            storage: StorageConfig {
                backend: get_env("STORAGE_BACKEND", Some("s3"), is_prod)?,
                bucket: get_env("STORAGE_BUCKET", Some(""), is_prod)?,
                local_path: get_env("STORAGE_LOCAL_PATH", Some("target/storage"), is_prod)?,
                image_prefix: get_env("STORAGE_IMAGE_PREFIX", Some("images"), is_prod)?,
                pool_size: get_env(
                    "STORAGE_POOL_SIZE",
                    Some(&DEFAULT_BLOB_POOL_SIZE.to_string()),
                    is_prod,
                )?
                .parse()
                .unwrap_or(DEFAULT_BLOB_POOL_SIZE),
            },
            prompt: PromptConfig {
                path: get_env("PROMPT_PATH", Some("prompt.txt"), is_prod)?,
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
