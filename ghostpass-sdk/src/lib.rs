//! # Ghost Pass SDK
//!
//! Client-side pieces of the Ghost Pass token lifecycle: the wallet's QR
//! presenter, the gateway scanner, and adapters for the issuer and verifier
//! they talk to.
//!
//! This crate combines functionality from:
//! - `ghostpass-token`: token model, QR payloads, local verification and the
//!   in-process reference authority
//! - `ghostpass-config`: configuration management
//! - `ghostpass-api`: HTTP client for the remote issuer and verifier
//!
//! ## Features
//!
//! - **Presenter**: rotates short-lived passes on a countdown, with stale
//!   responses discarded by request generation
//! - **Scanner**: decodes structured and legacy payloads, verifies them and
//!   clears the outcome after a display window
//! - **Pluggable authority**: anything implementing [`TokenIssuer`] /
//!   [`TokenVerifier`]; HTTP and in-process implementations are provided
//! - **Local verification**: check pass signatures offline with a configured
//!   public key
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use ghostpass_sdk::{
//!     GhostPass, PassAuthority, PermissionSet, SilentCuePlayer, SubjectId,
//! };
//!
//! # async fn run() -> Result<(), ghostpass_sdk::SdkError> {
//! let authority = Arc::new(PassAuthority::generate());
//! let sdk = GhostPass::builder()
//!     .base_url("https://passes.example.com")
//!     .session_token("session-abc")
//!     .build()?;
//!
//! let presenter = sdk.presenter_with(
//!     authority.clone(),
//!     Some(SubjectId::new("wallet-42")),
//!     PermissionSet::wallet_defaults(),
//! );
//! presenter.mount().await?;
//!
//! let scanner = sdk.scanner_with(authority, Arc::new(SilentCuePlayer));
//! if let Some(pass) = presenter.view().pass {
//!     scanner.submit(pass.qr_payload).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod cue;
mod error;
mod issuer;
mod presenter;
mod scanner;
mod verifier;

use std::sync::Arc;

pub use cue::{Cue, CuePlayer, SilentCuePlayer};
pub use error::SdkError;
pub use issuer::TokenIssuer;
pub use presenter::{
    DisplayedPass, Presenter, PresenterPhase, PresenterView, ISSUE_FAILED_BANNER,
};
pub use scanner::{
    DenyReason, ScanOutcome, Scanner, CONNECTION_REASON, DEFAULT_DENY_REASON, EXPIRED_GUIDANCE,
};
pub use verifier::TokenVerifier;

// Re-export everything from the component crates
pub use ghostpass_token::{
    codes, public_key_from_str, verify_token, DisplayAttributes, IssuedToken, PassAuthority,
    PassClaims, PayloadError, PayloadFormat, PermissionSet, Profile, QrPayload, SubjectId,
    TokenError, Verdict, HEALTH, IDENTITY, PAYMENT,
};
// Re-exported biscuit types
pub use ghostpass_token::{Biscuit, KeyPair, PublicKey};

pub use ghostpass_config::{
    ConfigError, GhostPassConfig, GhostPassConfigBuilder, PresenterSettings, ScannerSettings,
};

pub use ghostpass_api::{
    ApiError, GhostPassClient, GhostPassClientBuilder, IssueTokenRequest, IssueTokenResponse,
    PublicKeyResponse, VerifyTokenRequest, VerifyTokenResponse,
};

/// Ghost Pass client
///
/// High-level entry point that wires configuration, the HTTP client and the
/// presenter/scanner components together.
#[derive(Debug)]
pub struct GhostPass {
    client: Arc<GhostPassClient>,
    config: GhostPassConfig,
}

impl GhostPass {
    /// Create a new instance from a configuration
    pub fn new(config: GhostPassConfig) -> Result<Self, SdkError> {
        config.validate()?;
        let client = GhostPassClientBuilder::new().from_config(&config).build()?;

        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    pub fn builder() -> GhostPassBuilder {
        GhostPassBuilder::new()
    }

    /// Request a fresh pass from the remote issuer
    pub async fn issue(
        &self,
        subject: &SubjectId,
        permissions: &PermissionSet,
    ) -> Result<IssuedToken, SdkError> {
        TokenIssuer::issue(self.client.as_ref(), subject, permissions).await
    }

    /// Ask the remote verifier about a token
    pub async fn verify(
        &self,
        token: &str,
        profile: Option<&str>,
        format: PayloadFormat,
    ) -> Result<Verdict, SdkError> {
        TokenVerifier::verify(self.client.as_ref(), token, profile, format).await
    }

    /// Check a pass offline against the configured public key.
    ///
    /// Covers signature and validity window only; revocation and grants are
    /// known to the issuer alone.
    pub fn verify_local(&self, token: &str) -> Result<PassClaims, SdkError> {
        let public_key = self
            .config
            .public_key
            .as_deref()
            .ok_or_else(|| SdkError::Generic("Public key not configured".to_string()))?;

        let public_key = public_key_from_str(public_key)?;
        Ok(verify_token(token, public_key)?)
    }

    /// The remote issuer as a shareable trait object
    pub fn issuer(&self) -> Arc<dyn TokenIssuer> {
        self.client.clone()
    }

    /// The remote verifier as a shareable trait object
    pub fn verifier(&self) -> Arc<dyn TokenVerifier> {
        self.client.clone()
    }

    /// Presenter backed by the remote issuer
    pub fn presenter(&self, subject: Option<SubjectId>, permissions: PermissionSet) -> Presenter {
        self.presenter_with(self.client.clone(), subject, permissions)
    }

    /// Presenter backed by any issuer, using this instance's timing
    pub fn presenter_with(
        &self,
        issuer: Arc<dyn TokenIssuer>,
        subject: Option<SubjectId>,
        permissions: PermissionSet,
    ) -> Presenter {
        Presenter::spawn(issuer, subject, permissions, self.config.presenter_settings())
    }

    /// Scanner backed by the remote verifier
    pub fn scanner(&self, cues: Arc<dyn CuePlayer>) -> Scanner {
        self.scanner_with(self.client.clone(), cues)
    }

    /// Scanner backed by any verifier, using this instance's timing
    pub fn scanner_with(&self, verifier: Arc<dyn TokenVerifier>, cues: Arc<dyn CuePlayer>) -> Scanner {
        Scanner::spawn(verifier, cues, self.config.scanner_settings())
    }

    /// Fetch the issuer's public key
    pub async fn get_public_key(&self) -> Result<String, SdkError> {
        Ok(self.client.get_public_key().await?)
    }

    pub fn client(&self) -> &GhostPassClient {
        &self.client
    }

    pub fn config(&self) -> &GhostPassConfig {
        &self.config
    }
}

/// Builder for [`GhostPass`] instances
#[derive(Default)]
pub struct GhostPassBuilder {
    config_builder: GhostPassConfigBuilder,
}

impl GhostPassBuilder {
    pub fn new() -> Self {
        Self {
            config_builder: GhostPassConfig::builder(),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: &GhostPassConfig) -> Self {
        Self {
            config_builder: config.to_builder(),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(base_url);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config_builder = self.config_builder.port(port);
        self
    }

    /// Bearer credential of the signed-in holder or operator
    pub fn session_token(mut self, token: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.session_token(token);
        self
    }

    pub fn server_ca(mut self, server_ca: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.server_ca(server_ca);
        self
    }

    /// Public key for local verification
    pub fn public_key(mut self, public_key: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.public_key(public_key);
        self
    }

    pub fn token_ttl_secs(mut self, secs: u64) -> Self {
        self.config_builder = self.config_builder.token_ttl_secs(secs);
        self
    }

    pub fn display_window_secs(mut self, secs: u64) -> Self {
        self.config_builder = self.config_builder.display_window_secs(secs);
        self
    }

    pub fn sound_enabled(mut self, enabled: bool) -> Self {
        self.config_builder = self.config_builder.sound_enabled(enabled);
        self
    }

    pub fn build(self) -> Result<GhostPass, SdkError> {
        let config = self.config_builder.build()?;
        GhostPass::new(config)
    }
}

/// Fetch a public key without a configured client
pub async fn fetch_public_key(
    base_url: impl Into<String>,
    port: Option<u16>,
    server_ca: Option<&str>,
) -> Result<String, SdkError> {
    Ok(GhostPassClient::fetch_public_key(base_url, port, server_ca).await?)
}
