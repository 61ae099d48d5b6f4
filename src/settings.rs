//! Connection settings for the shared store.

use crate::error::{ConfigError, Result};
use config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings describing which store, collection and channel to use.
///
/// Settings are read from an optional file (YAML, TOML or JSON, detected by
/// extension) and then overridden by environment variables.
///
/// # Examples
///
/// ```rust,no_run
/// use redis_config_store::settings::StoreSettings;
/// use std::path::Path;
///
/// # fn example() -> redis_config_store::error::Result<()> {
/// // APP_KEY=my-config APP_CHANNEL=my-config-changes
/// let settings = StoreSettings::load(Some(Path::new("config/store.yaml")), "APP")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Store connection URL (e.g., redis://localhost:6379)
    #[serde(default = "default_url")]
    pub url: String,

    /// Database number
    #[serde(default)]
    pub database: i64,

    /// Name of the hash collection holding the configuration
    pub key: String,

    /// Change notification channel, if notifications are wanted
    #[serde(default)]
    pub channel: Option<String>,
}

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

impl StoreSettings {
    /// Create settings for `key` with default connection values.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            url: default_url(),
            database: 0,
            key: key.into(),
            channel: None,
        }
    }

    /// Load settings from an optional file plus `PREFIX_*` environment overrides.
    ///
    /// Nested keys use `__` as separator.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the merged values cannot be
    /// deserialized, or the result fails [`validate`](Self::validate).
    pub fn load(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::LoadError(format!(
                    "Settings file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: StoreSettings = builder
            .build()?
            .try_deserialize()
            .map_err(|e| ConfigError::LoadError(format!("Invalid store settings: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would fail at construction time.
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(ConfigError::missing("url"));
        }
        if self.key.is_empty() {
            return Err(ConfigError::missing("key"));
        }
        if self.channel.as_deref() == Some("") {
            return Err(ConfigError::missing("channel"));
        }
        Ok(())
    }
}
