use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::dimensions::UserGranularity;
use crate::error::{EtlError, EtlResult};
use crate::facts::DEFAULT_DURATION_TOLERANCE;
use crate::source::ParsePolicy;

/// Configuration for cadenza.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. Environment variables (CADENZA_* prefix)
/// 2. Config file (`--config <path>`, else ~/.config/cadenza/config.toml)
/// 3. Built-in defaults (lowest priority)
///
/// Required keys are optional here so that a partial config can be loaded
/// and reported; [`Config::validate`] enforces them.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Access credential id.
    ///
    /// Can be set via:
    /// - ENV: CADENZA_AWS_ACCESS_KEY_ID
    /// - Config: aws_access_key_id = "..."
    pub aws_access_key_id: Option<String>,

    /// Access credential secret.
    ///
    /// Can be set via:
    /// - ENV: CADENZA_AWS_SECRET_ACCESS_KEY
    /// - Config: aws_secret_access_key = "..."
    pub aws_secret_access_key: Option<String>,

    /// Root holding the catalog and event directories.
    pub input_data: Option<PathBuf>,

    /// Root the tables are written under.
    pub output_data: Option<PathBuf>,

    #[serde(default = "default_catalog_dir")]
    pub catalog_dir: String,

    #[serde(default = "default_events_dir")]
    pub events_dir: String,

    #[serde(default)]
    pub on_malformed: ParsePolicy,

    #[serde(default)]
    pub user_granularity: UserGranularity,

    /// Environment variables arrive as strings, so a numeric string is
    /// accepted too.
    #[serde(default = "default_tolerance", deserialize_with = "seconds")]
    pub duration_tolerance_secs: f64,

    /// Workflow state store.
    ///
    /// Default: ~/.local/share/cadenza/pipeline.db
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aws_access_key_id: None,
            aws_secret_access_key: None,
            input_data: None,
            output_data: None,
            catalog_dir: default_catalog_dir(),
            events_dir: default_events_dir(),
            on_malformed: ParsePolicy::default(),
            user_granularity: UserGranularity::default(),
            duration_tolerance_secs: DEFAULT_DURATION_TOLERANCE,
            state_path: default_state_path(),
        }
    }
}

fn redact(value: Option<&String>) -> &'static str {
    if value.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("aws_access_key_id", &redact(self.aws_access_key_id.as_ref()))
            .field(
                "aws_secret_access_key",
                &redact(self.aws_secret_access_key.as_ref()),
            )
            .field("input_data", &self.input_data)
            .field("output_data", &self.output_data)
            .field("catalog_dir", &self.catalog_dir)
            .field("events_dir", &self.events_dir)
            .field("on_malformed", &self.on_malformed)
            .field("user_granularity", &self.user_granularity)
            .field("duration_tolerance_secs", &self.duration_tolerance_secs)
            .field("state_path", &self.state_path)
            .finish()
    }
}

impl Config {
    /// Load configuration from `path` (or the default location when `None`)
    /// and `CADENZA_*` environment variables.
    ///
    /// An explicit path must exist; the default one is optional.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be parsed.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => {
                anyhow::ensure!(path.exists(), "Config file not found: {}", path.display());
                Some(path.to_path_buf())
            }
            None => Some(config_file_path()).filter(|p| p.exists()),
        };

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if let Some(config_path) = &config_path {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .with_context(|| format!("Failed to load config file {path_str}"))?;
        }

        let env_opts = env::Options::with_top_level("cadenza");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;
        log::debug!("Loaded configuration: {config:?}");
        Ok(config)
    }

    /// Check required values and produce run [`Settings`].
    ///
    /// # Errors
    ///
    /// [`EtlError::MissingConfig`] for an absent or blank required key,
    /// [`EtlError::InvalidConfig`] for an unusable tolerance.
    pub fn validate(&self) -> EtlResult<Settings> {
        let access_key_id = required_text(self.aws_access_key_id.as_deref(), "aws_access_key_id")?;
        let secret_access_key =
            required_text(self.aws_secret_access_key.as_deref(), "aws_secret_access_key")?;
        let input_data = required_path(self.input_data.as_deref(), "input_data")?;
        let output_data = required_path(self.output_data.as_deref(), "output_data")?;

        let tolerance = self.duration_tolerance_secs;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(EtlError::InvalidConfig {
                key: "duration_tolerance_secs",
                message: format!("must be a finite, non-negative number of seconds, got {tolerance}"),
            });
        }

        Ok(Settings {
            credentials: Credentials {
                access_key_id,
                secret_access_key,
            },
            input_data,
            output_data,
            catalog_dir: self.catalog_dir.clone(),
            events_dir: self.events_dir.clone(),
            on_malformed: self.on_malformed,
            user_granularity: self.user_granularity,
            duration_tolerance_secs: tolerance,
            state_path: self.state_path.clone(),
        })
    }
}

fn required_text(value: Option<&str>, key: &'static str) -> EtlResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(EtlError::MissingConfig { key }),
    }
}

fn required_path(value: Option<&Path>, key: &'static str) -> EtlResult<PathBuf> {
    match value {
        Some(p) if !p.as_os_str().is_empty() => Ok(p.to_path_buf()),
        _ => Err(EtlError::MissingConfig { key }),
    }
}

/// Access credentials. The secret never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials: Credentials,
    pub input_data: PathBuf,
    pub output_data: PathBuf,
    pub catalog_dir: String,
    pub events_dir: String,
    pub on_malformed: ParsePolicy,
    pub user_granularity: UserGranularity,
    pub duration_tolerance_secs: f64,
    pub state_path: PathBuf,
}

impl Settings {
    /// `<input>/<catalog_dir>`
    #[must_use]
    pub fn catalog_root(&self) -> PathBuf {
        self.input_data.join(&self.catalog_dir)
    }

    /// `<input>/<events_dir>`
    #[must_use]
    pub fn events_root(&self) -> PathBuf {
        self.input_data.join(&self.events_dir)
    }
}

fn default_catalog_dir() -> String {
    "song_data".to_string()
}

fn default_events_dir() -> String {
    "event_log".to_string()
}

fn default_tolerance() -> f64 {
    DEFAULT_DURATION_TOLERANCE
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SecondsValue {
    Number(f64),
    Text(String),
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match SecondsValue::deserialize(deserializer)? {
        SecondsValue::Number(value) => Ok(value),
        SecondsValue::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("`{text}` is not a number of seconds"))),
    }
}

/// Get the default workflow state path.
///
/// Returns: ~/.local/share/cadenza/pipeline.db (or platform equivalent)
#[must_use]
pub fn default_state_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cadenza")
        .join("pipeline.db")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/cadenza/config.toml
/// - macOS: ~/Library/Application Support/cadenza/config.toml
/// - Windows: %APPDATA%\cadenza\config.toml
#[must_use]
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cadenza")
        .join("config.toml")
}

/// Get the example config file content.
#[must_use]
pub fn example_config() -> &'static str {
    r#"# Cadenza Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. Environment variables (CADENZA_* prefix)
# 2. This config file
# 3. Built-in defaults (lowest priority)

# Access credentials (required)
#
# Can also be set via:
# - Environment: CADENZA_AWS_ACCESS_KEY_ID / CADENZA_AWS_SECRET_ACCESS_KEY
aws_access_key_id = "your-access-key-id"
aws_secret_access_key = "your-secret-access-key"

# Input root holding the catalog and event directories (required)
input_data = "/data/input"

# Output root for the star-schema tables (required)
output_data = "/data/output"

# Subdirectories of the input root
#catalog_dir = "song_data"
#events_dir = "event_log"

# What to do with a record that cannot be parsed: "abort" or "skip"
#on_malformed = "abort"

# Users table: "history" keeps one row per (user, level),
# "latest" keeps one row per user with their most recent level
#user_granularity = "history"

# Max difference in seconds between an event's length and a catalog
# song's duration for the two to match
#duration_tolerance_secs = 0.001

# Workflow state store
#
# Default: Platform-specific data directory
#state_path = "/path/to/pipeline.db"
"#
}

/// Write the example config to `path` unless something is already there.
pub fn write_example_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
