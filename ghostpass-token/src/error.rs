use thiserror::Error;

use crate::payload::PayloadError;

/// Errors produced while minting, decoding or verifying Ghost Pass tokens
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Biscuit error: {0}")]
    Biscuit(#[from] biscuit_auth::error::Token),

    #[error("Token expired at {expires_at}")]
    Expired { expires_at: i64 },

    #[error("Token not valid before {issued_at}")]
    NotYetValid { issued_at: i64 },

    #[error("Token rejected: {0}")]
    Unauthorized(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Invalid hex encoding: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Invalid QR payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("{0}")]
    Generic(String),
}

impl TokenError {
    pub fn generic(msg: impl Into<String>) -> Self {
        TokenError::Generic(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        TokenError::Unauthorized(msg.into())
    }

    pub fn invalid_key_format(msg: impl Into<String>) -> Self {
        TokenError::InvalidKeyFormat(msg.into())
    }

    /// True when the token was well-formed and correctly signed but its
    /// validity window has closed.
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::Expired { .. })
    }
}
