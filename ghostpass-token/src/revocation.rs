//! Revocation identifiers for pass tokens
//!
//! Passes are single-block and short-lived, so the authority block's
//! revocation id is the only one that matters.

use biscuit_auth::{Biscuit, PublicKey};

use crate::error::TokenError;
use crate::utils::decode_token;

/// Hex revocation id of the authority block, if the token has one
pub fn authority_revocation_id(biscuit: &Biscuit) -> Option<String> {
    biscuit
        .revocation_identifiers()
        .first()
        .map(hex::encode)
}

/// Get the revocation id of a base64-encoded pass token
///
/// # Arguments
/// * `token` - Base64-encoded pass token
/// * `public_key` - Public key to parse the token
pub fn get_pass_revocation_id(token: &str, public_key: PublicKey) -> Result<String, TokenError> {
    let bytes = decode_token(token)?;
    let biscuit = Biscuit::from(&bytes, public_key)?;

    authority_revocation_id(&biscuit).ok_or_else(|| {
        TokenError::generic("Failed to extract revocation ID from pass token".to_string())
    })
}
