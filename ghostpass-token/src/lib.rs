//! # Ghost Pass Token
//!
//! Ephemeral pass tokens for Ghost Pass wallets.
//!
//! A pass token is a biscuit signed by the issuer's root key that carries
//! only a random pass id and an expiration instant. Who the pass belongs to
//! and which capabilities it exposes stay with the issuer and are resolved at
//! verification time, so a leaked QR code reveals nothing about its holder.
//!
//! ## Features
//!
//! - Minting: create short-lived pass biscuits
//! - Local verification: check signature and validity window offline
//! - QR payloads: encode and decode the structured and legacy wire shapes
//! - In-process authority: a complete issuer and verifier for local use
//!
//! ## Usage
//!
//! ```no_run
//! use ghostpass_token::{PassAuthority, PayloadFormat, PermissionSet, SubjectId};
//!
//! fn main() -> Result<(), ghostpass_token::TokenError> {
//!     let authority = PassAuthority::generate();
//!     let subject = SubjectId::new("wallet-42");
//!
//!     let token = authority.issue(&subject, &PermissionSet::wallet_defaults())?;
//!     let verdict = authority.verify(&token.opaque_value, Some("wallet-42"), PayloadFormat::Structured);
//!
//!     println!("verifier answered {}", verdict.result_code());
//!     Ok(())
//! }
//! ```

mod authority;
mod error;
mod mint;
mod model;
mod payload;
mod revocation;
mod token;
mod utils;
mod verdict;
mod verify;

pub use authority::{PassAuthority, Profile};
pub use error::TokenError;
pub use mint::{
    create_pass_biscuit, create_pass_biscuit_builder, create_pass_biscuit_with_id, MintedPass,
    TokenTimeConfig, DEFAULT_TTL_SECS,
};
pub use model::{IssuedToken, PermissionSet, SubjectId, Token, HEALTH, IDENTITY, PAYMENT};
pub use payload::{
    LegacyPayload, PayloadError, PayloadFormat, QrPayload, StructuredPayload, LEGACY_PREFIX,
    PAYLOAD_VERSION,
};
pub use revocation::{authority_revocation_id, get_pass_revocation_id};
pub use token::{parse_token, verify_token, verify_token_at};
pub use utils::{decode_token, encode_token, keypair_from_pem_file, public_key_from_pem_file};
pub use verdict::{codes, DisplayAttributes, Verdict};
pub use verify::{
    biscuit_key_from_string, public_key_from_str, public_key_to_string, verify_pass_biscuit,
    PassClaims,
};

// Re-export biscuit types that are needed for public API
pub use biscuit_auth::{Biscuit, KeyPair, PublicKey};
