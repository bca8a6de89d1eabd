use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ghostpass_sdk::{
    GhostPass, PassAuthority, PermissionSet, PresenterSettings, ScannerSettings, TokenIssuer,
    TokenVerifier,
};
use ghostpass_token::{keypair_from_pem_file, DEFAULT_TTL_SECS};
use tracing::debug;

use crate::cli::AuthorityArgs;
use crate::config::CliConfig;
use crate::error::{CliError, Result};

/// Issuer and verifier a command talks to
pub enum Backend {
    /// In-process authority holding a root key
    Local(Arc<PassAuthority>),
    /// Remote issuer/verifier functions
    Remote(GhostPass),
}

impl Backend {
    /// Resolve flags and config into a backend. An explicit `--server`
    /// wins over a configured authority key.
    pub fn resolve(args: &AuthorityArgs, config: &CliConfig) -> Result<Self> {
        let key = args.key.clone().or_else(|| {
            args.server
                .is_none()
                .then(|| config.authority_key_path.clone())
                .flatten()
        });

        if let Some(key) = key {
            if !key.exists() {
                return Err(CliError::FileNotFound(key.display().to_string()));
            }
            let ttl = config
                .token_ttl_secs
                .map(|t| t as i64)
                .unwrap_or(DEFAULT_TTL_SECS);
            debug!(key = %key.display(), ttl, "using local authority");
            let authority = PassAuthority::new(keypair_from_pem_file(&key)?).with_ttl(ttl);
            return Ok(Backend::Local(Arc::new(authority)));
        }

        let server = args
            .server
            .clone()
            .or_else(|| config.default_server.clone())
            .ok_or_else(|| {
                CliError::Config(
                    "No server specified and no default configured.\n\n\
                     Run: ghostpass config set default_server <url>\n\
                     Or mint locally with: --key <private key pem>"
                        .to_string(),
                )
            })?;

        let mut builder = GhostPass::builder().base_url(server);
        if let Some(port) = args.port.or(config.default_port) {
            builder = builder.port(port);
        }
        if let Some(session) = args.session.clone().or_else(|| config.session_token.clone()) {
            builder = builder.session_token(session);
        }
        if let Some(ca) = args.ca.as_ref().or(config.server_ca_path.as_ref()) {
            builder = builder.server_ca(read_file(ca)?);
        }
        if let Some(public_key) = &config.public_key {
            builder = builder.public_key(public_key.clone());
        }
        if let Some(ttl) = config.token_ttl_secs {
            builder = builder.token_ttl_secs(ttl);
        }
        if let Some(sound) = config.sound_enabled {
            builder = builder.sound_enabled(sound);
        }

        Ok(Backend::Remote(builder.build()?))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Backend::Local(_))
    }

    pub fn issuer(&self) -> Arc<dyn TokenIssuer> {
        match self {
            Backend::Local(authority) => authority.clone(),
            Backend::Remote(sdk) => sdk.issuer(),
        }
    }

    pub fn verifier(&self) -> Arc<dyn TokenVerifier> {
        match self {
            Backend::Local(authority) => authority.clone(),
            Backend::Remote(sdk) => sdk.verifier(),
        }
    }

    pub fn presenter_settings(&self) -> PresenterSettings {
        match self {
            Backend::Local(authority) => PresenterSettings {
                token_ttl: Duration::from_secs(authority.ttl_secs().max(1) as u64),
                ..PresenterSettings::default()
            },
            Backend::Remote(sdk) => sdk.config().presenter_settings(),
        }
    }

    pub fn scanner_settings(&self, config: &CliConfig) -> ScannerSettings {
        match self {
            Backend::Local(_) => ScannerSettings {
                sound_enabled: config.sound_enabled.unwrap_or(true),
                ..ScannerSettings::default()
            },
            Backend::Remote(sdk) => sdk.config().scanner_settings(),
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.display().to_string()));
    }
    Ok(fs::read_to_string(path)?)
}

/// Wallet defaults with `NAME=BOOL` (or bare `NAME`, meaning on) overrides
pub fn parse_permissions(flags: &[String]) -> Result<PermissionSet> {
    let mut permissions = PermissionSet::wallet_defaults();
    for flag in flags {
        let (name, enabled) = match flag.split_once('=') {
            Some((name, value)) => {
                let enabled = value.trim().parse::<bool>().map_err(|_| {
                    CliError::InvalidInput(format!("Invalid permission value in {flag:?}"))
                })?;
                (name.trim(), enabled)
            }
            None => (flag.trim(), true),
        };
        if name.is_empty() {
            return Err(CliError::InvalidInput(format!("Empty permission name in {flag:?}")));
        }
        permissions.set(name, enabled);
    }
    Ok(permissions)
}
