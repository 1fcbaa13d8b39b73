//! TOML configuration.
//!
//! Every section is optional; a missing field takes its default. The config
//! is built once in `main` and passed by reference into each component.
//!
//! ```toml
//! [llm]
//! model = "google/gemma-2-9b-it:free"
//! temperature = 0.7
//!
//! [summarize]
//! max_tokens_per_chunk = 8000
//! concurrency = 4
//!
//! [local]
//! folder = "downloaded_files"
//! exclude_globs = ["*.tmp"]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Errors that abort a run before any network activity.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("OpenRouter API key not set: pass --api-key, set llm.api_key, or export {0}")]
    MissingApiKey(String),
    #[error("Google Drive access token not set: pass --access-token or export {0}")]
    MissingDriveCredentials(String),
    #[error("could not extract folder ID from URL: {0}")]
    InvalidDriveUrl(String),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub summarize: SummarizeConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used when the document is passed by URL instead of as text.
    #[serde(default = "default_url_model")]
    pub url_model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_text_timeout")]
    pub text_timeout_secs: u64,
    #[serde(default = "default_document_timeout")]
    pub document_timeout_secs: u64,
    #[serde(default = "default_referer")]
    pub referer: String,
    #[serde(default = "default_app_title")]
    pub app_title: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            url_model: default_url_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            text_timeout_secs: default_text_timeout(),
            document_timeout_secs: default_document_timeout(),
            referer: default_referer(),
            app_title: default_app_title(),
        }
    }
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_model() -> String {
    "google/gemma-2-9b-it:free".to_string()
}
fn default_url_model() -> String {
    "google/gemini-flash-1.5:free".to_string()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_text_timeout() -> u64 {
    60
}
fn default_document_timeout() -> u64 {
    120
}
fn default_referer() -> String {
    "https://github.com".to_string()
}
fn default_app_title() -> String {
    "Document Summarizer".to_string()
}

impl LlmConfig {
    /// Resolve the API key: explicit value first, then the environment.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(&self.api_key_env)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
            .ok_or_else(|| ConfigError::MissingApiKey(self.api_key_env.clone()))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizeConfig {
    /// Input budget per prompt, in tokens; converted to chars at 4 per token.
    #[serde(default = "default_max_tokens_per_chunk")]
    pub max_tokens_per_chunk: usize,
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
    #[serde(default = "default_url_summary_max_tokens")]
    pub url_summary_max_tokens: u32,
    #[serde(default = "default_master_max_tokens")]
    pub master_max_tokens: u32,
    /// Documents summarized at once. 1 keeps the run strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: default_max_tokens_per_chunk(),
            summary_max_tokens: default_summary_max_tokens(),
            url_summary_max_tokens: default_url_summary_max_tokens(),
            master_max_tokens: default_master_max_tokens(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_max_tokens_per_chunk() -> usize {
    8000
}
fn default_summary_max_tokens() -> u32 {
    1000
}
fn default_url_summary_max_tokens() -> u32 {
    1500
}
fn default_master_max_tokens() -> u32 {
    2000
}
fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalConfig {
    #[serde(default = "default_folder")]
    pub folder: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_folder() -> PathBuf {
    PathBuf::from("downloaded_files")
}
fn default_include_globs() -> Vec<String> {
    vec!["*".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct DriveConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_download_base")]
    pub download_base: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Upper bound on ids taken from a scraped public folder page.
    #[serde(default = "default_scrape_limit")]
    pub scrape_limit: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Where `--keep-downloads` writes fetched files.
    #[serde(default = "default_folder")]
    pub download_dir: PathBuf,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            download_base: default_download_base(),
            access_token: None,
            access_token_env: default_access_token_env(),
            page_size: default_page_size(),
            scrape_limit: default_scrape_limit(),
            user_agent: default_user_agent(),
            download_dir: default_folder(),
        }
    }
}

fn default_api_base() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}
fn default_download_base() -> String {
    "https://drive.google.com".to_string()
}
fn default_access_token_env() -> String {
    "GOOGLE_DRIVE_ACCESS_TOKEN".to_string()
}
fn default_page_size() -> u32 {
    100
}
fn default_scrape_limit() -> usize {
    20
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

impl DriveConfig {
    pub fn resolve_access_token(&self) -> Result<String, ConfigError> {
        self.access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                std::env::var(&self.access_token_env)
                    .ok()
                    .filter(|t| !t.trim().is_empty())
            })
            .ok_or_else(|| ConfigError::MissingDriveCredentials(self.access_token_env.clone()))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("summary_report.json")
}

impl Config {
    /// All defaults; used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.summarize.max_tokens_per_chunk == 0 {
            return Err(ConfigError::Invalid(
                "summarize.max_tokens_per_chunk must be > 0".to_string(),
            ));
        }
        if self.summarize.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "summarize.concurrency must be >= 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(
                "llm.temperature must be in [0.0, 2.0]".to_string(),
            ));
        }
        if self.llm.text_timeout_secs == 0 || self.llm.document_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "llm timeouts must be > 0".to_string(),
            ));
        }
        if !(1..=1000).contains(&self.drive.page_size) {
            return Err(ConfigError::Invalid(
                "drive.page_size must be in 1..=1000".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Load `path` if it exists; fall back to defaults when the file is absent.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}
