//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::Result;
use crate::error::Error;

/// Environment variable holding the Gemini API key
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gemini API key (overridden by `GOOGLE_API_KEY`)
    #[serde(default)]
    pub gemini_api_key: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum model/tool round trips per query
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Ask the model to answer in markdown
    #[serde(default = "default_true")]
    pub markdown: bool,

    /// Stream the response as it is generated
    #[serde(default = "default_true")]
    pub stream: bool,

    /// Audio files up to this size are sent inline instead of uploaded
    #[serde(default = "default_inline_audio_limit")]
    pub inline_audio_limit: u64,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub media: MediaPaths,
}

/// File processing poll settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Web search tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_results: default_max_results(),
        }
    }
}

/// Default media locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPaths {
    #[serde(default = "default_image")]
    pub image: PathBuf,

    #[serde(default = "default_video")]
    pub video: PathBuf,

    #[serde(default = "default_audio")]
    pub audio: PathBuf,
}

impl Default for MediaPaths {
    fn default() -> Self {
        Self {
            image: default_image(),
            video: default_video(),
            audio: default_audio(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}

fn default_max_iterations() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_inline_audio_limit() -> u64 {
    20 * 1024 * 1024
}

fn default_max_retries() -> u32 {
    10
}

fn default_interval_secs() -> u64 {
    2
}

fn default_max_results() -> usize {
    5
}

fn default_image() -> PathBuf {
    PathBuf::from("resources/sample_image.jpg")
}

fn default_video() -> PathBuf {
    PathBuf::from("resources/sample_video.mp4")
}

fn default_audio() -> PathBuf {
    PathBuf::from("resources/sample_audio.mp3")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            model: default_model(),
            max_iterations: default_max_iterations(),
            markdown: true,
            stream: true,
            inline_audio_limit: default_inline_audio_limit(),
            poll: PollConfig::default(),
            search: SearchConfig::default(),
            media: MediaPaths::default(),
        }
    }
}

impl Config {
    /// Apply an API key from the environment, if one is set
    pub fn apply_env_key(&mut self, value: Option<String>) {
        if let Some(key) = value.filter(|k| !k.trim().is_empty()) {
            self.gemini_api_key = key.trim().to_string();
        }
    }

    /// Fail early when no API key is available
    pub fn validate(&self) -> Result<()> {
        if self.gemini_api_key.trim().is_empty() {
            return Err(Error::Config(format!(
                "Please set the {} environment variable.",
                API_KEY_ENV
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be at least 1".to_string()));
        }
        Ok(())
    }

    /// API key with everything but the edges hidden
    pub fn masked_api_key(&self) -> String {
        let key = &self.gemini_api_key;
        if key.is_empty() {
            "not set".to_string()
        } else if key.chars().count() > 8 {
            let head: String = key.chars().take(4).collect();
            let mut tail: Vec<char> = key.chars().rev().take(4).collect();
            tail.reverse();
            format!("{}...{}", head, tail.into_iter().collect::<String>())
        } else {
            "****".to_string()
        }
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".multimodal-agent")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from the default location, then apply `GOOGLE_API_KEY`
pub fn load() -> Result<Config> {
    let mut config = load_from(&config_path())?;
    config.apply_env_key(std::env::var(API_KEY_ENV).ok());
    Ok(config)
}

/// Load configuration from a file, falling back to defaults if it is missing
pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("No config at {:?}, using defaults", path);
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Write the default configuration file, refusing to clobber an existing one
pub fn init() -> Result<PathBuf> {
    let path = config_path();
    if path.exists() {
        return Err(Error::Config(format!("Config already exists at {:?}", path)));
    }
    save_to(&Config::default(), &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model, "gemini-2.0-flash-exp");
        assert_eq!(config.poll.max_retries, 10);
        assert_eq!(config.poll.interval(), Duration::from_secs(2));
        assert!(config.markdown);
        assert!(config.search.enabled);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"model": "gemini-1.5-pro"}"#).unwrap();
        assert_eq!(config.model, "gemini-1.5-pro");
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.media.video, PathBuf::from("resources/sample_video.mp4"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.model, default_model());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.poll.max_retries = 3;
        save_to(&config, &path).unwrap();

        let loaded = load_from(&path).unwrap();
        assert_eq!(loaded.poll.max_retries, 3);
    }

    #[test]
    fn test_env_key_overrides() {
        let mut config = Config::default();
        config.gemini_api_key = "from-file".to_string();

        config.apply_env_key(Some("   ".to_string()));
        assert_eq!(config.gemini_api_key, "from-file");

        config.apply_env_key(Some("from-env".to_string()));
        assert_eq!(config.gemini_api_key, "from-env");
    }

    #[test]
    fn test_validate_requires_key() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_masked_api_key() {
        let mut config = Config::default();
        assert_eq!(config.masked_api_key(), "not set");
        config.gemini_api_key = "AIzaSyExampleKey1234".to_string();
        assert_eq!(config.masked_api_key(), "AIza...1234");
    }

    #[test]
    fn test_masked_api_key_multibyte_edges() {
        let mut config = Config::default();
        config.gemini_api_key = "kéé-AIzaSy-long-kéy".to_string();
        assert_eq!(config.masked_api_key(), "kéé-...-kéy");

        config.gemini_api_key = "ééééé".to_string();
        assert_eq!(config.masked_api_key(), "****");
    }
}
