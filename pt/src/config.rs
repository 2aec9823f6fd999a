//! Petitioner configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Main Petitioner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generative-text provider configuration
    pub llm: LlmConfig,

    /// Identity provider configuration
    pub identity: IdentityConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Export configuration
    pub export: ExportConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// The generation API key must come from the environment; there is no
    /// built-in fallback key, so a missing variable is fatal.
    pub fn validate(&self) -> Result<()> {
        debug!(api_key_env = %self.llm.api_key_env, "validate: called");
        if std::env::var(&self.llm.api_key_env).map(|v| v.trim().is_empty()).unwrap_or(true) {
            return Err(eyre::eyre!(
                "Generation API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if self.identity.provider == IdentityProviderKind::IdentityToolkit
            && std::env::var(&self.identity.api_key_env).is_err()
        {
            return Err(eyre::eyre!(
                "Identity API key not found. Set the {} environment variable.",
                self.identity.api_key_env
            ));
        }
        if self.llm.retry.max_attempts == 0 {
            return Err(eyre::eyre!("llm.retry.max-attempts must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .petitioner.yml
        let local_config = PathBuf::from(".petitioner.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/petitioner/petitioner.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("petitioner").join("petitioner.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are ignored here; `load` reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(p) => p.clone(),
            None => {
                let local = PathBuf::from(".petitioner.yml");
                if local.exists() {
                    local
                } else {
                    dirs::config_dir()?.join("petitioner").join("petitioner.yml")
                }
            }
        };
        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Generative-text provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "gemini" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Rate-limit retry policy
    pub retry: RetryConfig,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| eyre::eyre!("Environment variable {} is not set", self.api_key_env))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.5-flash-preview-05-20".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_ms: 120_000,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry settings for rate-limited generation requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubled for each later attempt
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Upper bound of the random jitter added to each backoff
    #[serde(rename = "max-jitter-ms")]
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_jitter_ms: 1000,
        }
    }
}

/// Which identity provider backs the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityProviderKind {
    /// Accounts stored in the local petition store
    #[default]
    Local,
    /// Hosted Identity Toolkit REST API
    IdentityToolkit,
}

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub provider: IdentityProviderKind,

    /// Minimum password length accepted at sign-up
    #[serde(rename = "min-password-len")]
    pub min_password_len: usize,

    /// Environment variable with the Identity Toolkit API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Identity Toolkit base URL
    #[serde(rename = "base-url")]
    pub base_url: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            provider: IdentityProviderKind::Local,
            min_password_len: 6,
            api_key_env: "PETITIONER_IDENTITY_API_KEY".to_string(),
            base_url: "https://identitytoolkit.googleapis.com".to_string(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the petition store and session file
    #[serde(rename = "store-dir")]
    pub store_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/petitioner on Linux)
        let store_dir = dirs::data_dir()
            .map(|d| d.join("petitioner"))
            .unwrap_or_else(|| PathBuf::from(".petitioner"));

        Self { store_dir }
    }
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// File name used when exporting a generated petition
    #[serde(rename = "file-name")]
    pub file_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: crate::generation::EXPORT_FILE_NAME.to_string(),
        }
    }
}
