//! Gateway client configuration
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;
use std::fmt;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub api: ApiConfig,
    pub session: SessionConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
    /// Force JSON log output regardless of environment
    #[serde(default)]
    pub log_json: bool,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// REST API settings used for gateway endpoint discovery
#[derive(Clone, Deserialize)]
pub struct ApiConfig {
    /// Bot credential. Never logged.
    pub token: String,
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub version: u8,
    #[serde(default)]
    pub user_agent_suffix: String,
}

impl ApiConfig {
    /// Versioned REST base, e.g. `https://discord.com/api/v10`
    #[must_use]
    pub fn versioned_base_url(&self) -> String {
        format!("{}/v{}", self.base_url.trim_end_matches('/'), self.version)
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("version", &self.version)
            .field("user_agent_suffix", &self.user_agent_suffix)
            .finish()
    }
}

/// Gateway session settings
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Skip endpoint discovery and connect here directly
    #[serde(default)]
    pub gateway_url: Option<String>,
    /// Capability flags, OR'd together for Identify
    #[serde(default)]
    pub intents: Vec<u64>,
    #[serde(default = "default_compress")]
    pub compress: bool,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

// Default value functions
fn default_app_name() -> String {
    "cord-gateway".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_api_base_url() -> String {
    "https://discord.com/api".to_string()
}

fn default_api_version() -> u8 {
    10
}

fn default_compress() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
                log_json: parse_bool(&lookup, "LOG_JSON")?.unwrap_or(false),
            },
            api: ApiConfig {
                token: lookup("GATEWAY_TOKEN")
                    .filter(|s| !s.trim().is_empty())
                    .ok_or(ConfigError::MissingVar("GATEWAY_TOKEN"))?,
                base_url: lookup("API_BASE_URL").unwrap_or_else(default_api_base_url),
                version: parse_number(&lookup, "API_VERSION")?.unwrap_or_else(default_api_version),
                user_agent_suffix: lookup("USER_AGENT_SUFFIX").unwrap_or_default(),
            },
            session: SessionConfig {
                gateway_url: lookup("GATEWAY_URL").filter(|s| !s.trim().is_empty()),
                intents: parse_intents(lookup("GATEWAY_INTENTS"))?,
                compress: parse_bool(&lookup, "GATEWAY_COMPRESS")?.unwrap_or_else(default_compress),
                reconnect_delay_ms: parse_number(&lookup, "GATEWAY_RECONNECT_DELAY_MS")?
                    .unwrap_or_else(default_reconnect_delay_ms),
            },
        })
    }
}

fn parse_number<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key, raw))
        })
        .transpose()
}

fn parse_bool<F>(lookup: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key, raw)),
        })
        .transpose()
}

fn parse_intents(raw: Option<String>) -> Result<Vec<u64>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| ConfigError::InvalidValue("GATEWAY_INTENTS", s.to_string()))
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
