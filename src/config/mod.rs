use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::logging::LoggingConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for fetching product pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub request_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub max_redirects: usize,
    pub domain_delay_ms: u64,
    pub user_agents: Vec<String>,
}

/// Settings for the image existence checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Checks issued concurrently inside one batch
    pub batch_size: usize,
    pub probe_timeout_seconds: u64,
    pub max_redirects: usize,
    /// Body bytes read for signature sniffing
    pub prefix_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub placeholder_width: u32,
    pub placeholder_height: u32,
    pub max_generated_candidates: Option<usize>,
    pub scrape_page: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            connect_timeout_seconds: 10,
            max_redirects: 10,
            domain_delay_ms: 500,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15".to_string(),
            ],
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            probe_timeout_seconds: 10,
            max_redirects: 5,
            prefix_bytes: 16,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            placeholder_width: 800,
            placeholder_height: 800,
            max_generated_candidates: None,
            scrape_page: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults
    pub async fn load() -> Result<Self> {
        let config_path = get_config_path();

        if config_path.exists() {
            return Self::load_from_file(&config_path).await;
        }

        info!("No configuration file found, using defaults");
        let mut config = Self::default();
        ConfigOverrides::apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file; `PIF_*` overrides still apply
    pub async fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Self::load_from_file_with(path, ConfigOverrides::apply).await
    }

    async fn load_from_file_with<P, F>(path: P, overrides: F) -> Result<Self>
    where
        P: AsRef<std::path::Path>,
        F: FnOnce(&mut AppConfig),
    {
        let content = tokio::fs::read_to_string(path).await?;
        let mut config: AppConfig = toml::from_str(&content)?;

        overrides(&mut config);
        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to a file
    pub async fn save_to<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.validation.batch_size == 0 {
            return Err(anyhow::anyhow!("Validation batch_size must be > 0"));
        }

        if self.validation.probe_timeout_seconds == 0 || self.http.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("Timeouts must be > 0"));
        }

        if self.validation.prefix_bytes < 12 {
            return Err(anyhow::anyhow!("Validation prefix_bytes must be >= 12 to sniff image signatures"));
        }

        if self.http.user_agents.is_empty() {
            return Err(anyhow::anyhow!("At least one user agent must be configured"));
        }

        if self.pipeline.placeholder_width == 0 || self.pipeline.placeholder_height == 0 {
            return Err(anyhow::anyhow!("Placeholder dimensions must be > 0"));
        }

        if self.pipeline.max_generated_candidates == Some(0) {
            return Err(anyhow::anyhow!("max_generated_candidates must be > 0 when set"));
        }

        Ok(())
    }
}

/// Get the configuration file path
pub fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "productimages", "finder")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("config.toml"))
}

/// Get the default log directory
pub fn get_log_directory() -> PathBuf {
    directories::ProjectDirs::from("com", "productimages", "finder")
        .map(|dirs| dirs.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Environment-based configuration overrides
pub struct ConfigOverrides;

impl ConfigOverrides {
    /// Apply environment variable overrides to configuration
    pub fn apply(config: &mut AppConfig) {
        Self::apply_from(config, |key| std::env::var(key).ok());
    }

    fn apply_from<F>(config: &mut AppConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(batch) = lookup("PIF_BATCH_SIZE").and_then(|v| v.parse::<usize>().ok()) {
            config.validation.batch_size = batch;
        }

        if let Some(timeout) = lookup("PIF_PROBE_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
            config.validation.probe_timeout_seconds = timeout;
        }

        if let Some(timeout) = lookup("PIF_REQUEST_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
            config.http.request_timeout_seconds = timeout;
        }

        if let Some(cap) = lookup("PIF_MAX_CANDIDATES").and_then(|v| v.parse::<usize>().ok()) {
            config.pipeline.max_generated_candidates = Some(cap);
        }

        if let Some(scrape) = lookup("PIF_SCRAPE_PAGE") {
            config.pipeline.scrape_page = scrape.to_lowercase() == "true";
        }

        if let Some(level) = lookup("PIF_LOG_LEVEL") {
            config.logging.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.validation.batch_size, 5);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = AppConfig::default();
        config.validation.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PIF_BATCH_SIZE", "8"),
            ("PIF_MAX_CANDIDATES", "2000"),
            ("PIF_SCRAPE_PAGE", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        ConfigOverrides::apply_from(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.validation.batch_size, 8);
        assert_eq!(config.pipeline.max_generated_candidates, Some(2000));
        assert!(!config.pipeline.scrape_page);
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.validation.batch_size = 3;
        config.save_to(&path).await.unwrap();

        let loaded = AppConfig::load_from_file_with(&path, |_| {}).await.unwrap();
        assert_eq!(loaded.validation.batch_size, 3);
        assert_eq!(loaded.http.user_agents.len(), config.http.user_agents.len());
    }

    #[tokio::test]
    async fn test_file_config_still_takes_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.validation.batch_size = 3;
        config.pipeline.scrape_page = true;
        config.save_to(&path).await.unwrap();

        let env: HashMap<&str, &str> = [("PIF_BATCH_SIZE", "9"), ("PIF_SCRAPE_PAGE", "false")]
            .into_iter()
            .collect();
        let loaded = AppConfig::load_from_file_with(&path, |config| {
            ConfigOverrides::apply_from(config, |key| env.get(key).map(|v| v.to_string()))
        })
        .await
        .unwrap();

        assert_eq!(loaded.validation.batch_size, 9);
        assert!(!loaded.pipeline.scrape_page);
    }

    #[tokio::test]
    async fn test_override_that_breaks_validation_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        AppConfig::default().save_to(&path).await.unwrap();

        let result = AppConfig::load_from_file_with(&path, |config| {
            ConfigOverrides::apply_from(config, |key| (key == "PIF_BATCH_SIZE").then(|| "0".to_string()))
        })
        .await;
        assert!(result.is_err());
    }
}
