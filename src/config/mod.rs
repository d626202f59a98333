//! Application configuration.
//!
//! Configuration is read from `~/.config/sitebridge/config.toml` unless an
//! explicit path is given. If the default file doesn't exist, one with
//! comments is created; a missing explicit file simply yields defaults.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database file. Defaults to `<data_dir>/sitebridge/sitebridge.db`.
    pub database_path: Option<PathBuf>,

    /// Scheme and host used when printing published feed URLs.
    pub public_base_url: Option<String>,

    pub scheduler: SchedulerConfig,
    pub fetch: FetchConfig,
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Run the background refresh loop under `sitebridge run` (default: true)
    pub enabled: bool,

    /// Seconds between due checks (default: 30)
    pub tick_secs: u64,

    /// Upper bound for one profile's full extraction (default: 45)
    pub extraction_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_secs: 30,
            extraction_timeout_secs: 45,
        }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Request timeout in seconds (default: 15)
    pub timeout_secs: u64,

    /// Largest accepted response body (default: 2 MiB)
    pub max_response_bytes: usize,

    pub user_agent: String,

    /// Same-host redirects followed before giving up (default: 5)
    pub max_redirects: usize,
}

pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: concat!("sitebridge/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,

    /// Wait after navigation for client-side rendering, in milliseconds (default: 1000)
    pub settle_ms: u64,

    /// Chromium binary; detected automatically when unset.
    pub executable: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            settle_ms: 1000,
            executable: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or from the default location.
    ///
    /// Missing fields use default values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let config_path = Self::default_config_path()?;
                if !config_path.exists() {
                    Self::create_default_config(&config_path)?;
                    return Ok(Self::default());
                }
                Self::load_from(&config_path)
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content).map_err(|e| match e {
            ParseFailure::Toml(source) => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            ParseFailure::Invalid(message) => ConfigError::Invalid {
                path: path.to_path_buf(),
                message,
            },
        })
    }

    fn parse(content: &str) -> Result<Self, ParseFailure> {
        let mut config: AppConfig = toml::from_str(content).map_err(ParseFailure::Toml)?;
        config.public_base_url = config
            .public_base_url
            .as_deref()
            .map(normalize_base_url)
            .transpose()
            .map_err(ParseFailure::Invalid)?
            .flatten();
        Ok(config)
    }

    /// Get the default config file path: `~/.config/sitebridge/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("sitebridge").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> &'static str {
        r##"# sitebridge configuration

# SQLite database location (default: <data dir>/sitebridge/sitebridge.db)
# database_path = "/var/lib/sitebridge/sitebridge.db"

# Scheme and host used for published feed URLs, e.g. "https://feeds.example.com"
# public_base_url = "https://feeds.example.com"

[scheduler]
# Refresh due profiles in the background while `sitebridge run` is active
enabled = true

# Seconds between due checks
tick_secs = 30

# Upper bound for one profile's fetch and extraction, in seconds
extraction_timeout_secs = 45

[fetch]
# Request timeout in seconds
timeout_secs = 15

# Largest accepted source page, in bytes
max_response_bytes = 2097152

# Same-host redirects to follow
max_redirects = 5

[browser]
# Run Chromium without a visible window
headless = true

# Wait after navigation for client-side rendering (milliseconds)
settle_ms = 1000
"##
    }
}

#[derive(Debug)]
enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(String),
}

/// Reduce a base URL to scheme and host (plus port). Blank means unset.
fn normalize_base_url(raw: &str) -> Result<Option<String>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let invalid = || format!("public_base_url must be an http or https URL, got `{}`", raw);
    let url = Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(Some(url.origin().ascii_serialization()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config file at {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}
