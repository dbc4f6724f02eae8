//! Configuration module
//!
//! This module provides configuration structures for the request client,
//! validator, asset upload and batch orchestration. Values come from the
//! environment (a `.env` file is honored) and fall back to the defaults below.

use std::env;
use std::time::Duration;

// Common constants
const API_URL: &str = "http://localhost:8000";
const REQUEST_TIMEOUT_SECS: u64 = 15;
const REQUEST_MAX_RETRIES: u32 = 2;
const REQUEST_RETRY_DELAY_MS: u64 = 300;
const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const ALLOWED_CONTENT_TYPES: &str = "image/jpeg,image/png,application/pdf";
const UPLOAD_BASE_URL: &str = "https://api.cloudinary.com";
const UPLOAD_PRESET: &str = "certificate_upload";
const UPLOAD_FOLDER: &str = "certificates";
const UPLOAD_CHUNK_SIZE_BYTES: usize = 64 * 1024;
const UPLOAD_TIMEOUT_SECS: u64 = 120;
const BATCH_MAX_CONCURRENCY: usize = 4;

/// Resilient request client settings
#[derive(Clone, Debug)]
pub struct RequestConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            base_url: API_URL.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            max_retries: REQUEST_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(REQUEST_RETRY_DELAY_MS),
        }
    }
}

/// Local file acceptance rules
#[derive(Clone, Debug)]
pub struct ValidationConfig {
    pub allowed_content_types: Vec<String>,
    pub max_file_size_bytes: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            allowed_content_types: split_list(ALLOWED_CONTENT_TYPES),
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
        }
    }
}

/// Remote asset store settings
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub base_url: String,
    pub cloud_name: Option<String>,
    pub upload_preset: String,
    pub folder: String,
    pub chunk_size: usize,
    pub timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: UPLOAD_BASE_URL.to_string(),
            cloud_name: None,
            upload_preset: UPLOAD_PRESET.to_string(),
            folder: UPLOAD_FOLDER.to_string(),
            chunk_size: UPLOAD_CHUNK_SIZE_BYTES,
            timeout: Duration::from_secs(UPLOAD_TIMEOUT_SECS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BatchConfig {
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: BATCH_MAX_CONCURRENCY,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub request: RequestConfig,
    pub validation: ValidationConfig,
    pub upload: UploadConfig,
    pub batch: BatchConfig,
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let base_url = env::var("CREDCHECK_API_URL")
            .or_else(|_| env::var("API_URL"))
            .unwrap_or_else(|_| API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let request = RequestConfig {
            base_url,
            timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS)),
            max_retries: env_parse("REQUEST_MAX_RETRIES", REQUEST_MAX_RETRIES),
            retry_base_delay: Duration::from_millis(env_parse(
                "REQUEST_RETRY_DELAY_MS",
                REQUEST_RETRY_DELAY_MS,
            )),
        };

        let validation = ValidationConfig {
            allowed_content_types: split_list(
                &env::var("ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|_| ALLOWED_CONTENT_TYPES.to_string()),
            ),
            max_file_size_bytes: env_parse("MAX_FILE_SIZE_BYTES", MAX_FILE_SIZE_BYTES),
        };

        let upload = UploadConfig {
            base_url: env::var("UPLOAD_BASE_URL")
                .unwrap_or_else(|_| UPLOAD_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            cloud_name: env::var("UPLOAD_CLOUD_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            upload_preset: env::var("UPLOAD_PRESET").unwrap_or_else(|_| UPLOAD_PRESET.to_string()),
            folder: env::var("UPLOAD_FOLDER").unwrap_or_else(|_| UPLOAD_FOLDER.to_string()),
            chunk_size: env_parse("UPLOAD_CHUNK_SIZE_BYTES", UPLOAD_CHUNK_SIZE_BYTES),
            timeout: Duration::from_secs(env_parse("UPLOAD_TIMEOUT_SECS", UPLOAD_TIMEOUT_SECS)),
        };

        let batch = BatchConfig {
            max_concurrency: env_parse("BATCH_MAX_CONCURRENCY", BATCH_MAX_CONCURRENCY),
        };

        let config = Config {
            request,
            validation,
            upload,
            batch,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.request.base_url.starts_with("http://")
            && !self.request.base_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "CREDCHECK_API_URL must start with http:// or https://"
            ));
        }

        if self.validation.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_CONTENT_TYPES must list at least one content type"
            ));
        }

        if self.validation.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_BYTES must be greater than 0"));
        }

        if self.upload.chunk_size == 0 {
            return Err(anyhow::anyhow!(
                "UPLOAD_CHUNK_SIZE_BYTES must be greater than 0"
            ));
        }

        if self.batch.max_concurrency == 0 {
            return Err(anyhow::anyhow!("BATCH_MAX_CONCURRENCY must be greater than 0"));
        }

        Ok(())
    }
}
