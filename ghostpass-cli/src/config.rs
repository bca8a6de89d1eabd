use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Keys accepted by `config get` and `config set`
pub const CONFIG_KEYS: &[&str] = &[
    "default_server",
    "default_port",
    "session_token",
    "server_ca_path",
    "authority_key_path",
    "public_key",
    "token_ttl_secs",
    "sound_enabled",
];

/// Global CLI configuration, stored as TOML in `~/.ghostpass/cli.toml`
#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct CliConfig {
    /// Issuer/verifier to use when `--server` is not given
    pub default_server: Option<String>,
    pub default_port: Option<u16>,
    pub session_token: Option<String>,
    pub server_ca_path: Option<PathBuf>,
    /// Private key for minting locally when `--key` is not given
    pub authority_key_path: Option<PathBuf>,
    /// Issuer public key for `verify`
    pub public_key: Option<String>,
    pub token_ttl_secs: Option<u64>,
    pub sound_enabled: Option<bool>,
}

impl CliConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| CliError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not determine home directory".to_string()))?;
        Ok(home.join(".ghostpass"))
    }

    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("cli.toml"))
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "default_server" => self.default_server = Some(value.to_string()),
            "default_port" => self.default_port = Some(parse_value(key, value)?),
            "session_token" => self.session_token = Some(value.to_string()),
            "server_ca_path" => self.server_ca_path = Some(value.into()),
            "authority_key_path" => self.authority_key_path = Some(value.into()),
            "public_key" => self.public_key = Some(value.to_string()),
            "token_ttl_secs" => self.token_ttl_secs = Some(parse_value(key, value)?),
            "sound_enabled" => self.sound_enabled = Some(parse_value(key, value)?),
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// Display value of a key; `None` when unset. The session credential is
    /// never shown.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());
        let value = match key {
            "default_server" => self.default_server.clone(),
            "default_port" => self.default_port.map(|p| p.to_string()),
            "session_token" => self.session_token.as_ref().map(|_| "(set)".to_string()),
            "server_ca_path" => path(&self.server_ca_path),
            "authority_key_path" => path(&self.authority_key_path),
            "public_key" => self.public_key.clone(),
            "token_ttl_secs" => self.token_ttl_secs.map(|t| t.to_string()),
            "sound_enabled" => self.sound_enabled.map(|s| s.to_string()),
            _ => return Err(unknown_key(key)),
        };
        Ok(value)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::InvalidInput(format!("Invalid value for {key}: {value}")))
}

fn unknown_key(key: &str) -> CliError {
    CliError::InvalidInput(format!(
        "Unknown configuration key: {key} (expected one of: {})",
        CONFIG_KEYS.join(", ")
    ))
}
