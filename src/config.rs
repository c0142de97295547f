//! Configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main refiner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capability provider configuration
    pub provider: ProviderConfig,

    /// Engine tuning
    pub engine: EngineConfig,

    /// Readiness policy selection
    pub readiness: ReadinessConfig,

    /// Session storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.provider.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "provider API key not found. Set the {} environment variable.",
                self.provider.api_key_env
            ));
        }
        self.readiness.validate()?;
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .refiner.yml
        let local_config = PathBuf::from(".refiner.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/refiner/refiner.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("refiner").join("refiner.yml");
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

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Capability provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider name (currently only "anthropic" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per reply
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl ProviderConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .context(format!("environment variable {} not set", self.api_key_env))
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 120_000,
        }
    }
}

/// Engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Most questions to hold pending at once
    #[serde(rename = "max-questions")]
    pub max_questions: usize,

    /// Upper bound on any single provider call, in milliseconds.
    /// Elapse surfaces as a Timeout error; the session stays resumable.
    #[serde(rename = "call-timeout-ms")]
    pub call_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_questions: 3,
            call_timeout_ms: 150_000,
        }
    }
}

/// Readiness policy selection
///
/// The concrete condition for leaving Clarification is deployment policy,
/// not engine logic; pick one here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Policy name: "min-answered" or "required-fields"
    pub policy: String,

    /// For "min-answered": how many answered fields are enough
    #[serde(rename = "min-answered")]
    pub min_answered: usize,

    /// For "required-fields": which keys must be answered
    #[serde(rename = "required-fields")]
    pub required_fields: Vec<String>,
}

impl ReadinessConfig {
    /// Reject unknown policy names early
    pub fn validate(&self) -> Result<()> {
        match self.policy.as_str() {
            "min-answered" | "required-fields" => Ok(()),
            other => Err(eyre::eyre!(
                "unknown readiness policy: '{}'. Supported: min-answered, required-fields",
                other
            )),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            policy: "min-answered".to_string(),
            min_answered: 2,
            required_fields: Vec::new(),
        }
    }
}

/// Session storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for session documents; defaults to the platform data dir
    #[serde(rename = "sessions-dir")]
    pub sessions_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the sessions directory, falling back to the platform default
    pub fn resolve_sessions_dir(&self) -> PathBuf {
        self.sessions_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("refiner")
                .join("sessions")
        })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { sessions_dir: None }
    }
}
