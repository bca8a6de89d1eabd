use base64::{engine::general_purpose::STANDARD, Engine};
use std::fs;
use std::path::Path;

use crate::error::TokenError;

pub use biscuit_auth::{KeyPair, PublicKey};

/// Opaque text form of a serialized pass, as carried in the QR payload
pub fn encode_token(token_bytes: &[u8]) -> String {
    STANDARD.encode(token_bytes)
}

/// Inverse of [`encode_token`]. Surrounding whitespace is ignored, since
/// scanners and terminals tend to add a trailing newline.
pub fn decode_token(token_string: &str) -> Result<Vec<u8>, TokenError> {
    STANDARD
        .decode(token_string.trim())
        .map_err(|e| TokenError::generic(format!("Token is not valid base64: {e}")))
}

fn read_key_file(path: &Path) -> Result<String, TokenError> {
    fs::read_to_string(path)
        .map_err(|e| TokenError::generic(format!("Cannot read key file {}: {e}", path.display())))
}

/// Load an issuer root public key from a PEM file
pub fn public_key_from_pem_file(path: impl AsRef<Path>) -> Result<PublicKey, TokenError> {
    let pem = read_key_file(path.as_ref())?;
    PublicKey::from_pem(&pem).map_err(|e| TokenError::invalid_key_format(e.to_string()))
}

/// Load the issuer signing key from a private key PEM file
pub fn keypair_from_pem_file(path: impl AsRef<Path>) -> Result<KeyPair, TokenError> {
    let pem = read_key_file(path.as_ref())?;
    KeyPair::from_private_key_pem(&pem).map_err(|e| TokenError::invalid_key_format(e.to_string()))
}
