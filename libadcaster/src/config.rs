//! Configuration management for Adcaster

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub generator: Option<GeneratorConfig>,
    #[serde(default)]
    pub facebook: Option<FacebookConfig>,
    #[serde(default)]
    pub twitter: Option<TwitterConfig>,
    #[serde(default)]
    pub instagram: Option<InstagramConfig>,
    #[serde(default)]
    pub linkedin: Option<LinkedinConfig>,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Generative API used for ad copy, hashtags, and images.
/// OpenAI-compatible; `api_base` allows pointing at a proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub api_key: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_image_size")]
    pub image_size: String,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_text_model() -> String {
    "gpt-4".to_string()
}

fn default_image_model() -> String {
    "dall-e-2".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    pub enabled: bool,
    pub access_token: String,
    pub page_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    pub enabled: bool,
    pub bearer_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    pub enabled: bool,
    pub access_token: String,
    pub business_account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedinConfig {
    pub enabled: bool,
    pub access_token: String,
    pub organization_id: String,
}

/// Per-unit rates, overridable per deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_post_rate")]
    pub post_rate: f64,
    #[serde(default = "default_image_rate")]
    pub image_generation_rate: f64,
    #[serde(default = "default_analytics_rate")]
    pub analytics_rate: f64,
    #[serde(default = "default_scheduled_post_rate")]
    pub scheduled_post_rate: f64,
}

fn default_post_rate() -> f64 {
    0.50
}

fn default_image_rate() -> f64 {
    0.25
}

fn default_analytics_rate() -> f64 {
    0.10
}

fn default_scheduled_post_rate() -> f64 {
    0.40
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            post_rate: default_post_rate(),
            image_generation_rate: default_image_rate(),
            analytics_rate: default_analytics_rate(),
            scheduled_post_rate: default_scheduled_post_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Seconds between daemon polls of the schedule table
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_poll_interval() -> u64 {
    1
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
    #[serde(default = "default_posts_per_day")]
    pub posts_per_day: u32,
}

fn default_platforms() -> Vec<String> {
    vec![
        "facebook".to_string(),
        "twitter".to_string(),
        "instagram".to_string(),
        "linkedin".to_string(),
    ]
}

fn default_posts_per_day() -> u32 {
    1
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            platforms: default_platforms(),
            posts_per_day: default_posts_per_day(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/adcaster/adcaster.db".to_string(),
            },
            generator: None,
            facebook: None,
            twitter: None,
            instagram: None,
            linkedin: None,
            billing: BillingConfig::default(),
            scheduling: SchedulingConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }

    /// Names of the platforms with credentials present and enabled
    pub fn enabled_platforms(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.facebook.as_ref().is_some_and(|c| c.enabled) {
            names.push("facebook".to_string());
        }
        if self.twitter.as_ref().is_some_and(|c| c.enabled) {
            names.push("twitter".to_string());
        }
        if self.instagram.as_ref().is_some_and(|c| c.enabled) {
            names.push("instagram".to_string());
        }
        if self.linkedin.as_ref().is_some_and(|c| c.enabled) {
            names.push("linkedin".to_string());
        }
        names
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("ADCASTER_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("adcaster").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("adcaster"))
}
