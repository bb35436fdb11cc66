//! Project configuration.
//!
//! Settings come from `config.yaml` at the project root. The API credential
//! can be overridden from the environment (a `.env` file is loaded first), so
//! the YAML document can be committed without secrets.
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `openai.api_key`.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_REFINE_MODEL: &str = "gpt-4o";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub conversion: ConversionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model for conversion and validation calls.
    #[serde(default = "default_model")]
    pub model: String,
    /// Model for prompt refinement.
    #[serde(default = "default_refine_model")]
    pub refine_model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            refine_model: default_refine_model(),
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversionConfig {
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_refine_model() -> String {
    DEFAULT_REFINE_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Parse a YAML config document.
pub fn parse_config(text: &str) -> Result<AppConfig> {
    serde_yaml::from_str(text).context("parse config YAML")
}

/// Load `config.yaml` from `path`.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    parse_config(&text).with_context(|| format!("load {}", path.display()))
}

impl AppConfig {
    /// Resolve the API key: the environment value wins over the config file.
    ///
    /// Blank values are treated as absent.
    pub fn resolve_api_key(&self, env_value: Option<String>) -> Result<String> {
        let from_env = env_value.filter(|value| !value.trim().is_empty());
        if let Some(key) = from_env {
            return Ok(key);
        }
        let from_config = self
            .openai
            .api_key
            .clone()
            .filter(|value| !value.trim().is_empty());
        if let Some(key) = from_config {
            tracing::info!("using API key from config.yaml");
            return Ok(key);
        }
        Err(anyhow!(
            "OpenAI API key is missing; set {API_KEY_ENV} or openai.api_key in config.yaml"
        ))
    }
}
