//! Configuration management for the branchdesk CLI and client

use config::{Config, Environment};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::error::{DeskError, Result};
use crate::ui::UI;
use crate::ConfigCommand;

const DEFAULT_ENDPOINT: &str = "http://localhost:4000";

/// Which data source read paths with a fixture counterpart use.
///
/// `Fallback` reads live and substitutes the fixture only when the backend
/// is unreachable or answers with an unusable shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceMode {
    Live,
    Fixture,
    #[default]
    Fallback,
}

impl DataSourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Fixture => "fixture",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskConfig {
    pub endpoint: String,
    pub timeout: u64,
    pub storage_dir: PathBuf,
    #[serde(default)]
    pub data_source: DataSourceMode,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_shadow_ttl_days")]
    pub shadow_ttl_days: i64,
}

fn default_page_size() -> usize {
    10
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_shadow_ttl_days() -> i64 {
    30
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: 30,
            storage_dir: default_storage_dir(),
            data_source: DataSourceMode::default(),
            page_size: default_page_size(),
            debounce_ms: default_debounce_ms(),
            shadow_ttl_days: default_shadow_ttl_days(),
        }
    }
}

impl DeskConfig {
    pub async fn load() -> Result<Self> {
        Self::load_from(&default_config_path()).await
    }

    /// Load from `config_file`, creating it with defaults when missing and
    /// rewriting it when it no longer parses.
    pub async fn load_from(config_file: &Path) -> Result<Self> {
        if config_file.exists() {
            let content = fs::read_to_string(config_file).await?;

            match serde_json::from_str::<Self>(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    tracing::warn!(
                        "Config file {} is unreadable ({}), resetting to defaults",
                        config_file.display(),
                        e
                    );
                    let config = Self::default();
                    config.save(config_file).await?;
                    Ok(config)
                }
            }
        } else {
            let config = Self::default();
            config.save(config_file).await?;
            Ok(config)
        }
    }

    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, content).await?;
        Ok(())
    }

    pub fn session_path(&self) -> PathBuf {
        self.storage_dir.join("session.json")
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn shadow_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.shadow_ttl_days)
    }

    /// Client settings from this file, with `BRANCHDESK_*` variables on top
    pub fn to_client_config(&self) -> Result<ClientConfig> {
        let endpoint = self.endpoint.trim_end_matches('/').to_string();
        let use_proxy = !endpoint.contains("localhost") && !endpoint.contains("127.0.0.1");

        ClientConfigBuilder::new()
            .base_url(endpoint)
            .timeout(self.timeout)
            .use_proxy(use_proxy)
            .build()
    }
}

pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("branchdesk")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

pub fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("branchdesk")
}

/// Client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_use_proxy")]
    pub use_proxy: bool,
}

fn default_timeout() -> u64 {
    30
}

fn default_use_proxy() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ENDPOINT.to_string(),
            timeout: default_timeout(),
            use_proxy: default_use_proxy(),
        }
    }
}

/// Builder for ClientConfig. Values set here are the base layer;
/// `BRANCHDESK_*` environment variables override them.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    timeout: Option<u64>,
    use_proxy: Option<bool>,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn use_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = Some(use_proxy);
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        self.build_with(env_layer())
    }

    fn build_with(self, env: Environment) -> Result<ClientConfig> {
        let base = ClientConfig {
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            timeout: self.timeout.unwrap_or_else(default_timeout),
            use_proxy: self.use_proxy.unwrap_or_else(default_use_proxy),
        };

        let config = ClientConfig::layered(base, env)?;
        config.validate()?;
        Ok(config)
    }
}

fn env_layer() -> Environment {
    Environment::with_prefix("BRANCHDESK").try_parsing(true)
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// `base` as defaults, then `env`
    fn layered(base: ClientConfig, env: Environment) -> Result<Self> {
        let config = Config::builder()
            .set_default("base_url", base.base_url)?
            .set_default("timeout", base.timeout as i64)?
            .set_default("use_proxy", base.use_proxy)?
            .add_source(env)
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(DeskError::invalid_endpoint("Base URL cannot be empty"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(DeskError::invalid_endpoint(format!(
                "Base URL must start with http:// or https://: {}",
                self.base_url
            )));
        }
        if self.timeout == 0 {
            return Err(DeskError::config("Timeout must be at least one second"));
        }
        Ok(())
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.strip_prefix('/').unwrap_or(endpoint);
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }
}

/// Handles `branchdesk config ...`
pub struct ConfigService {
    config: DeskConfig,
    config_path: PathBuf,
    ui: UI,
}

impl ConfigService {
    pub fn new(config: DeskConfig) -> Self {
        Self::with_config_path(config, default_config_path())
    }

    pub fn with_config_path(config: DeskConfig, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
            ui: UI::new(),
        }
    }

    pub async fn handle_config(&mut self, command: ConfigCommand) -> Result<()> {
        match command {
            ConfigCommand::Show => {
                self.show();
                return Ok(());
            }
            ConfigCommand::SetEndpoint { url } => {
                let candidate = ClientConfig {
                    base_url: url.trim_end_matches('/').to_string(),
                    ..ClientConfig::default()
                };
                candidate.validate()?;
                self.config.endpoint = candidate.base_url;
            }
            ConfigCommand::SetTimeout { seconds } => {
                if seconds == 0 {
                    return Err(DeskError::invalid_input("Timeout must be at least one second"));
                }
                self.config.timeout = seconds;
            }
            ConfigCommand::SetDataSource { mode } => {
                self.config.data_source = mode;
            }
            ConfigCommand::SetPageSize { size } => {
                if size == 0 {
                    return Err(DeskError::invalid_input("Page size must be positive"));
                }
                self.config.page_size = size;
            }
            ConfigCommand::SetDebounce { millis } => {
                self.config.debounce_ms = millis;
            }
            ConfigCommand::Reset => {
                self.config = DeskConfig::default();
            }
        }

        self.config.save(&self.config_path).await?;
        self.ui.success("Configuration saved");
        self.show();
        Ok(())
    }

    fn show(&self) {
        self.ui.card(
            "Configuration",
            vec![
                ("Endpoint", self.config.endpoint.clone()),
                ("Timeout", format!("{}s", self.config.timeout)),
                ("Data source", self.config.data_source.as_str().to_string()),
                ("Page size", self.config.page_size.to_string()),
                ("Debounce", format!("{}ms", self.config.debounce_ms)),
                ("Shadow TTL", format!("{} days", self.config.shadow_ttl_days)),
                ("Storage", self.config.storage_dir.display().to_string()),
                ("Config file", self.config_path.display().to_string()),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_joins_without_double_slash() {
        let config = ClientConfig {
            base_url: "http://localhost:4000/".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(
            config.endpoint_url("/api/syllabuses"),
            "http://localhost:4000/api/syllabuses"
        );
        assert_eq!(
            config.endpoint_url("payments/transaction"),
            "http://localhost:4000/payments/transaction"
        );
    }

    #[test]
    fn validate_rejects_schemeless_urls() {
        let config = ClientConfig {
            base_url: "localhost:4000".to_string(),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn load_creates_defaults_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = DeskConfig::load_from(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.debounce_ms, 500);
        assert_eq!(config.data_source, DataSourceMode::Fallback);

        let mut changed = config.clone();
        changed.page_size = 25;
        changed.data_source = DataSourceMode::Live;
        changed.save(&path).await.unwrap();

        let reloaded = DeskConfig::load_from(&path).await.unwrap();
        assert_eq!(reloaded.page_size, 25);
        assert_eq!(reloaded.data_source, DataSourceMode::Live);
    }

    #[tokio::test]
    async fn corrupt_config_is_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let config = DeskConfig::load_from(&path).await.unwrap();
        assert_eq!(config.timeout, 30);
        let rewritten = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(rewritten.contains("\"endpoint\""));
    }

    #[test]
    fn older_config_files_get_new_defaults() {
        let json = r#"{"endpoint":"http://api.example.com","timeout":10,"verbose":false,"storage_dir":"/tmp/x"}"#;
        // files written before a field existed, or with a dropped one, still load
        let config: DeskConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.shadow_ttl_days, 30);
        assert_eq!(config.data_source, DataSourceMode::Fallback);
    }

    fn env(vars: &[(&str, &str)]) -> Environment {
        let vars: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env_layer().source(Some(vars))
    }

    #[test]
    fn environment_overrides_the_config_file() {
        let config = ClientConfigBuilder::new()
            .base_url("http://localhost:4000")
            .timeout(30)
            .use_proxy(false)
            .build_with(env(&[
                ("BRANCHDESK_BASE_URL", "https://env.example.test"),
                ("BRANCHDESK_TIMEOUT", "5"),
            ]))
            .unwrap();

        assert_eq!(config.base_url, "https://env.example.test");
        assert_eq!(config.timeout, 5);
        assert!(!config.use_proxy);
    }

    #[test]
    fn file_values_hold_without_environment() {
        let config = ClientConfigBuilder::new()
            .base_url("http://api.example.com")
            .timeout(12)
            .build_with(env(&[]))
            .unwrap();

        assert_eq!(config.base_url, "http://api.example.com");
        assert_eq!(config.timeout, 12);
        assert!(config.use_proxy);
    }

    #[test]
    fn invalid_environment_url_is_rejected() {
        let err = ClientConfigBuilder::new()
            .build_with(env(&[("BRANCHDESK_BASE_URL", "env.example.test")]))
            .unwrap_err();
        assert!(matches!(
            err,
            DeskError::Config {
                code: crate::error::ErrorCode::InvalidEndpoint,
                ..
            }
        ));
    }
}
