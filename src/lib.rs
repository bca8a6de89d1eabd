//! # Ghost Pass
//!
//! Ephemeral QR passes for wallets and door scanners.
//!
//! A wallet shows a QR code whose pass lives for thirty seconds. A
//! [`Presenter`] keeps that code fresh, requesting a new pass from the issuer
//! whenever the countdown runs out. At the door a [`Scanner`] decodes what
//! the camera read, asks the verifier about it and shows one outcome:
//! verified, expired or denied.
//!
//! The QR payload only ever carries a token reference and a profile pointer.
//! Names, badges and capabilities are resolved by the verifier.
//!
//! ## Crates
//!
//! - `ghostpass-token`: pass model, QR payload codec, biscuit minting and
//!   local verification, in-process reference authority
//! - `ghostpass-config`: configuration loading and validation
//! - `ghostpass-api`: HTTP client for the remote issuer and verifier
//! - `ghostpass-sdk`: presenter, scanner and issuer/verifier adapters
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ghostpass::{GhostPass, PermissionSet, ScanOutcome, SilentCuePlayer, SubjectId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sdk = GhostPass::builder()
//!     .base_url("https://passes.example.com")
//!     .session_token("session-abc")
//!     .build()?;
//!
//! // wallet side
//! let presenter = sdk.presenter(
//!     Some(SubjectId::new("wallet-42")),
//!     PermissionSet::wallet_defaults(),
//! );
//! presenter.mount().await?;
//!
//! // door side
//! let scanner = sdk.scanner(Arc::new(SilentCuePlayer));
//! scanner.submit("VALID:CC-12345678").await?;
//! let outcome = scanner
//!     .subscribe()
//!     .wait_for(ScanOutcome::is_terminal)
//!     .await?
//!     .clone();
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use ghostpass::{try_load_default_config, GhostPass};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // GHOSTPASS_* variables first, then ./ghostpass.json, ~/.ghostpass/config.json, ...
//! let config = try_load_default_config().ok_or("no Ghost Pass configuration found")?;
//!
//! let sdk = GhostPass::new(config)?;
//! # Ok(())
//! # }
//! ```

pub use ghostpass_sdk::*;

pub use ghostpass_config::{
    default_config_paths, get_default_config, set_default_config, try_load_default_config,
    ENV_PREFIX,
};
pub use ghostpass_token::{
    create_pass_biscuit, decode_token, encode_token, keypair_from_pem_file,
    public_key_from_pem_file, public_key_to_string, LegacyPayload, StructuredPayload, Token,
};
