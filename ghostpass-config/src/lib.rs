//! # Ghost Pass Config
//!
//! Configuration for Ghost Pass clients: where the issuer and verifier
//! functions live, the session credential to call them with, and the timing
//! knobs of the presenter and scanner.
//!
//! A configuration can be built in code, read from JSON or TOML, or taken
//! from environment variables:
//!
//! ```no_run
//! use ghostpass_config::GhostPassConfig;
//!
//! let config = GhostPassConfig::builder()
//!     .base_url("functions.ghostpass.app")
//!     .session_token("session-from-sign-in")
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.presenter_settings().token_ttl.as_secs(), 30);
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default lifetime of an issued pass
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 30;
/// Default time a scan outcome stays on screen
pub const DEFAULT_DISPLAY_WINDOW_SECS: u64 = 5;
/// Default countdown tick
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
/// Environment prefix used by [`try_load_default_config`]
pub const ENV_PREFIX: &str = "GHOSTPASS";

/// Errors that can occur when working with Ghost Pass configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Base URL is required but was not provided. Please specify the host of the Ghost Pass functions.")]
    MissingBaseUrl,

    #[error("Invalid port number. Port must be a valid number between 1-65535.")]
    InvalidPort,

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Invalid certificate format: {0}. Please ensure the certificate is properly PEM-encoded.")]
    InvalidCertificate(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("I/O error occurred while reading configuration: {0}. Please check file permissions and paths.")]
    IOError(String),

    #[error("Failed to parse configuration data: {0}. Please ensure the configuration format is correct.")]
    ParseError(String),

    #[error("Global configuration has already been initialized. Call get_default_config() to access it or create a new local configuration.")]
    AlreadyInitialized,

    #[error("Environment variable error: {0}. Please ensure all required environment variables are set correctly.")]
    EnvVarError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(error: std::io::Error) -> Self {
        ConfigError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

#[cfg(feature = "toml")]
impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

#[cfg(feature = "toml")]
impl From<toml::ser::Error> for ConfigError {
    fn from(error: toml::ser::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

impl From<env::VarError> for ConfigError {
    fn from(error: env::VarError) -> Self {
        ConfigError::EnvVarError(error.to_string())
    }
}

/// Configuration for a Ghost Pass client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostPassConfig {
    /// Host (optionally with scheme) serving the issuer and verifier functions
    pub base_url: String,
    #[serde(default)]
    pub port: Option<u16>,
    /// Bearer credential of the signed-in wallet or scanner operator
    #[serde(default)]
    pub session_token: Option<String>,
    /// Extra root certificate for the functions host, PEM-encoded
    #[serde(default)]
    pub server_ca: Option<String>,
    /// Root public key of the issuer, PEM or `ed25519/<hex>`
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_display_window_secs")]
    pub display_window_secs: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_sound_enabled")]
    pub sound_enabled: bool,
}

fn default_token_ttl_secs() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}

fn default_display_window_secs() -> u64 {
    DEFAULT_DISPLAY_WINDOW_SECS
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_sound_enabled() -> bool {
    true
}

/// Timing the presenter runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenterSettings {
    pub token_ttl: Duration,
    pub tick_interval: Duration,
}

impl Default for PresenterSettings {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
        }
    }
}

/// Display window and audio preference of the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerSettings {
    pub display_window: Duration,
    pub sound_enabled: bool,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            display_window: Duration::from_secs(DEFAULT_DISPLAY_WINDOW_SECS),
            sound_enabled: true,
        }
    }
}

/// Builder for GhostPassConfig
///
/// ```no_run
/// # fn main() -> Result<(), ghostpass_config::ConfigError> {
/// use ghostpass_config::GhostPassConfigBuilder;
///
/// let config = GhostPassConfigBuilder::new()
///     .base_url("functions.ghostpass.app")
///     .port(443)
///     .display_window_secs(3)
///     .sound_enabled(false)
///     .build()?;
///
/// // change one field of an existing configuration
/// let quiet = config.to_builder().tick_interval_ms(500).build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default, Debug)]
pub struct GhostPassConfigBuilder {
    base_url: Option<String>,
    port: Option<u16>,
    session_token: Option<String>,
    server_ca: Option<String>,
    public_key: Option<String>,
    token_ttl_secs: Option<u64>,
    display_window_secs: Option<u64>,
    tick_interval_ms: Option<u64>,
    sound_enabled: Option<bool>,
}

impl GhostPassConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder seeded with an existing configuration
    pub fn from_config(config: &GhostPassConfig) -> Self {
        Self {
            base_url: Some(config.base_url.clone()),
            port: config.port,
            session_token: config.session_token.clone(),
            server_ca: config.server_ca.clone(),
            public_key: config.public_key.clone(),
            token_ttl_secs: Some(config.token_ttl_secs),
            display_window_secs: Some(config.display_window_secs),
            tick_interval_ms: Some(config.tick_interval_ms),
            sound_enabled: Some(config.sound_enabled),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn server_ca(mut self, ca: impl Into<String>) -> Self {
        self.server_ca = Some(ca.into());
        self
    }

    pub fn public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }

    pub fn token_ttl_secs(mut self, secs: u64) -> Self {
        self.token_ttl_secs = Some(secs);
        self
    }

    pub fn display_window_secs(mut self, secs: u64) -> Self {
        self.display_window_secs = Some(secs);
        self
    }

    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = Some(ms);
        self
    }

    pub fn sound_enabled(mut self, enabled: bool) -> Self {
        self.sound_enabled = Some(enabled);
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing or any field is invalid
    pub fn build(self) -> Result<GhostPassConfig, ConfigError> {
        let config = GhostPassConfig {
            base_url: self.base_url.ok_or(ConfigError::MissingBaseUrl)?,
            port: self.port,
            session_token: self.session_token,
            server_ca: self.server_ca,
            public_key: self.public_key,
            token_ttl_secs: self.token_ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS),
            display_window_secs: self
                .display_window_secs
                .unwrap_or(DEFAULT_DISPLAY_WINDOW_SECS),
            tick_interval_ms: self.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS),
            sound_enabled: self.sound_enabled.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Reads `{prefix}_{name}`; a missing variable is `None`.
fn optional_var(prefix: &str, name: &str) -> Result<Option<String>, ConfigError> {
    match env::var(format!("{prefix}_{name}")) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Like [`optional_var`], but `{prefix}_{name}_FILE` takes precedence and
/// names a file whose contents are the value.
fn optional_var_or_file(prefix: &str, name: &str) -> Result<Option<String>, ConfigError> {
    match optional_var(prefix, &format!("{name}_FILE"))? {
        Some(path) => fs::read_to_string(&path).map(Some).map_err(|e| {
            ConfigError::IOError(format!("Failed to read {name} file {path}: {e}"))
        }),
        None => optional_var(prefix, name),
    }
}

fn parse_var<T: std::str::FromStr>(
    prefix: &str,
    name: &str,
    field: &'static str,
) -> Result<Option<T>, ConfigError> {
    optional_var(prefix, name)?
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
                field,
                reason: format!("could not parse {raw:?}"),
            })
        })
        .transpose()
}

fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(stripped) => dirs::home_dir().map(|home| home.join(stripped)),
        None => Some(Path::new(path).to_path_buf()),
    }
}

impl GhostPassConfig {
    /// Configuration pointing at `base_url` with default timings
    pub fn new(base_url: impl Into<String>) -> Self {
        GhostPassConfig {
            base_url: base_url.into(),
            port: None,
            session_token: None,
            server_ca: None,
            public_key: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            display_window_secs: DEFAULT_DISPLAY_WINDOW_SECS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            sound_enabled: true,
        }
    }

    pub fn builder() -> GhostPassConfigBuilder {
        GhostPassConfigBuilder::new()
    }

    /// Convert this configuration to a builder for modification
    pub fn to_builder(&self) -> GhostPassConfigBuilder {
        GhostPassConfigBuilder::from_config(self)
    }

    /// Create a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: GhostPassConfig = serde_json::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration from a TOML file
    #[cfg(feature = "toml")]
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: GhostPassConfig = toml::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON or TOML file, chosen by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            #[cfg(feature = "toml")]
            Some("toml") => Self::from_toml(path),
            _ => Self::from_file(path),
        }
    }

    /// Write the configuration as JSON, or TOML when the path ends in `.toml`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|ext| ext.to_str()) {
            #[cfg(feature = "toml")]
            Some("toml") => toml::to_string_pretty(self)?,
            _ => serde_json::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Create a configuration from environment variables
    ///
    /// Variables are named with the given prefix followed by:
    /// - BASE_URL (required)
    /// - PORT
    /// - SESSION_TOKEN
    /// - SERVER_CA (content, not path)
    /// - PUBLIC_KEY
    /// - TOKEN_TTL_SECS, DISPLAY_WINDOW_SECS, TICK_INTERVAL_MS
    /// - SOUND_ENABLED (`true` or `false`)
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if BASE_URL is missing or any variable is invalid.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::load_env(prefix, false)
    }

    /// Create a configuration from environment variables or files
    ///
    /// Same as [`GhostPassConfig::from_env`], except that SESSION_TOKEN,
    /// SERVER_CA and PUBLIC_KEY may instead be given as a path in a variable
    /// with the `_FILE` suffix, e.g. `GHOSTPASS_SERVER_CA_FILE`.
    pub fn from_env_or_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::load_env(prefix, true)
    }

    fn load_env(prefix: &str, allow_files: bool) -> Result<Self, ConfigError> {
        let base_url = env::var(format!("{prefix}_BASE_URL"))?;

        let port = match optional_var(prefix, "PORT")? {
            Some(port_str) => Some(
                port_str
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidPort)?,
            ),
            None => None,
        };

        let read = |name: &str| {
            if allow_files {
                optional_var_or_file(prefix, name)
            } else {
                optional_var(prefix, name)
            }
        };

        let config = GhostPassConfig {
            base_url,
            port,
            session_token: read("SESSION_TOKEN")?.map(|t| t.trim().to_string()),
            server_ca: read("SERVER_CA")?,
            public_key: read("PUBLIC_KEY")?,
            token_ttl_secs: parse_var(prefix, "TOKEN_TTL_SECS", "token_ttl_secs")?
                .unwrap_or(DEFAULT_TOKEN_TTL_SECS),
            display_window_secs: parse_var(prefix, "DISPLAY_WINDOW_SECS", "display_window_secs")?
                .unwrap_or(DEFAULT_DISPLAY_WINDOW_SECS),
            tick_interval_ms: parse_var(prefix, "TICK_INTERVAL_MS", "tick_interval_ms")?
                .unwrap_or(DEFAULT_TICK_INTERVAL_MS),
            sound_enabled: parse_var(prefix, "SOUND_ENABLED", "sound_enabled")?.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }

        if let Some(port) = self.port {
            if port == 0 {
                return Err(ConfigError::InvalidPort);
            }
        }

        if self.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "token_ttl_secs",
                reason: "must be at least one second".to_string(),
            });
        }
        if self.display_window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "display_window_secs",
                reason: "must be at least one second".to_string(),
            });
        }
        let ttl_ms = self.token_ttl_secs.saturating_mul(1000);
        if self.tick_interval_ms == 0 || self.tick_interval_ms > ttl_ms {
            return Err(ConfigError::InvalidValue {
                field: "tick_interval_ms",
                reason: "must be positive and no longer than the token TTL".to_string(),
            });
        }

        if let Some(token) = &self.session_token {
            if token.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "session_token",
                    reason: "must not be empty when set".to_string(),
                });
            }
        }

        if let Some(ca) = &self.server_ca {
            if !ca.contains("BEGIN CERTIFICATE") {
                return Err(ConfigError::InvalidCertificate(
                    "CA certificate does not contain 'BEGIN CERTIFICATE' marker".to_string(),
                ));
            }
        }

        if let Some(key) = &self.public_key {
            let key = key.trim();
            if !key.contains("BEGIN PUBLIC KEY") && !key.contains('/') {
                return Err(ConfigError::InvalidPublicKey(
                    "expected a PEM public key or 'algorithm/hexkey'".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn presenter_settings(&self) -> PresenterSettings {
        PresenterSettings {
            token_ttl: Duration::from_secs(self.token_ttl_secs),
            tick_interval: Duration::from_millis(self.tick_interval_ms),
        }
    }

    pub fn scanner_settings(&self) -> ScannerSettings {
        ScannerSettings {
            display_window: Duration::from_secs(self.display_window_secs),
            sound_enabled: self.sound_enabled,
        }
    }
}

static DEFAULT_CONFIG: OnceLock<GhostPassConfig> = OnceLock::new();

/// Set the default global configuration
///
/// Returns an error if a default configuration is already set.
pub fn set_default_config(config: GhostPassConfig) -> Result<(), ConfigError> {
    config.validate()?;
    DEFAULT_CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)
}

/// Get the default global configuration, if set
pub fn get_default_config() -> Option<&'static GhostPassConfig> {
    DEFAULT_CONFIG.get()
}

/// Files searched by [`try_load_default_config`], in order
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut candidates = vec![
        "./ghostpass.json",
        "~/.ghostpass/config.json",
        "/etc/ghostpass/config.json",
    ];
    if cfg!(feature = "toml") {
        candidates.extend([
            "./ghostpass.toml",
            "~/.ghostpass/config.toml",
            "/etc/ghostpass/config.toml",
        ]);
    }

    candidates.into_iter().filter_map(expand_home).collect()
}

/// Try to load a default configuration from standard locations
///
/// This function attempts to load a configuration from:
/// 1. Environment variables with the prefix "GHOSTPASS"
/// 2. A file at ./ghostpass.json
/// 3. A file at ~/.ghostpass/config.json
/// 4. A file at /etc/ghostpass/config.json
/// 5. If the "toml" feature is enabled, the TOML variants of the same paths
///
/// Returns None if no configuration could be found.
pub fn try_load_default_config() -> Option<GhostPassConfig> {
    if let Ok(config) = GhostPassConfig::from_env_or_file(ENV_PREFIX) {
        return Some(config);
    }

    default_config_paths()
        .into_iter()
        .filter(|path| path.exists())
        .find_map(|path| GhostPassConfig::load(&path).ok())
}
