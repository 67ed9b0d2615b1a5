//! TOML configuration for analysis runs.
//!
//! Every section is optional; a missing file yields [`Config::default`].
//! Validation happens once in [`load_config`] / [`Config::validate`] so an
//! invalid threshold or retry policy is rejected before any run starts.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::similarity::StopWords;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Stop-word list applied when building the vocabulary: `english` or `none`.
    #[serde(default = "default_stop_words")]
    pub stop_words: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            stop_words: default_stop_words(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    0.8
}
fn default_stop_words() -> String {
    "english".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Value of the `X-RapidAPI-Host` header. Derived from `endpoint` when unset.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Worker pool ceiling. Defaults to `min(available_parallelism, 5)`.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            host: None,
            api_key_env: default_api_key_env(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
            workers: None,
            max_chars: default_max_chars(),
            min_chars: default_min_chars(),
        }
    }
}

fn default_endpoint() -> String {
    "https://open-ai21.p.rapidapi.com/conversationllama".to_string()
}
fn default_api_key_env() -> String {
    "X_RAPIDAPI_KEY".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    2000
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_chars() -> usize {
    5000
}
fn default_min_chars() -> usize {
    100
}

/// Upper bound on the default worker pool size.
const MAX_DEFAULT_WORKERS: usize = 5;

impl DetectionConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(MAX_DEFAULT_WORKERS)
        })
    }

    pub fn host_header(&self) -> String {
        if let Some(host) = &self.host {
            return host.clone();
        }
        self.endpoint
            .split("://")
            .nth(1)
            .unwrap_or(&self.endpoint)
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    /// Reads the credential from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => anyhow::bail!(
                "{} environment variable not set; it is required for AI detection",
                self.api_key_env
            ),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_report_file_name")]
    pub file_name: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            file_name: default_report_file_name(),
        }
    }
}

fn default_report_file_name() -> String {
    "analysis_report.json".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.analysis.similarity_threshold)?;

        StopWords::parse(&self.analysis.stop_words)?;

        if self.detection.max_attempts == 0 {
            anyhow::bail!("detection.max_attempts must be >= 1");
        }
        if self.detection.timeout_secs == 0 {
            anyhow::bail!("detection.timeout_secs must be > 0");
        }
        if self.detection.workers == Some(0) {
            anyhow::bail!("detection.workers must be >= 1");
        }
        if self.detection.max_chars == 0 {
            anyhow::bail!("detection.max_chars must be > 0");
        }
        if !self.report.file_name.ends_with(".json") {
            anyhow::bail!("report.file_name must end with .json");
        }

        Ok(())
    }
}

pub fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        anyhow::bail!(
            "similarity threshold must be in [0.0, 1.0], got {}",
            threshold
        );
    }
    Ok(())
}

/// Loads and validates the config at `path`, falling back to defaults when
/// the file does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    let config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    config.validate()?;
    Ok(config)
}
