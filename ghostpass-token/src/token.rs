use biscuit_auth::{Biscuit, PublicKey};
use chrono::Utc;

use crate::error::TokenError;
use crate::utils::decode_token;
use crate::verify::{verify_pass_biscuit, PassClaims};

/// Check an opaque pass against the issuer root key, right now.
///
/// Fails when the signature does not chain to `public_key` or the pass is
/// past its `expires_at`. Revocation and profile checks live in
/// [`crate::PassAuthority`], which knows the issued passes.
pub fn verify_token(token_string: &str, public_key: PublicKey) -> Result<PassClaims, TokenError> {
    verify_token_at(token_string, public_key, Utc::now().timestamp())
}

/// [`verify_token`] with an explicit clock, in unix seconds
pub fn verify_token_at(
    token_string: &str,
    public_key: PublicKey,
    now: i64,
) -> Result<PassClaims, TokenError> {
    verify_pass_biscuit(&decode_token(token_string)?, public_key, now)
}

/// Signature-checked Biscuit for inspection; expiry is not evaluated
pub fn parse_token(token_string: &str, public_key: PublicKey) -> Result<Biscuit, TokenError> {
    let bytes = decode_token(token_string)?;
    Ok(Biscuit::from(&bytes, public_key)?)
}
