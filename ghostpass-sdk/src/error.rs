use thiserror::Error;

use ghostpass_api::ApiError;
use ghostpass_config::ConfigError;
use ghostpass_token::{PayloadError, TokenError};

/// Errors that can occur in the Ghost Pass SDK
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// API error
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Token error
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// QR payload error
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The presenter or scanner task has shut down
    #[error("component has stopped")]
    ComponentStopped,

    /// Generic error
    #[error("{0}")]
    Generic(String),
}

impl SdkError {
    /// The caller's session was missing, expired or refused
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            SdkError::Api(ApiError::Unauthorized(_)) | SdkError::Token(TokenError::Unauthorized(_))
        )
    }

    /// No authoritative answer was obtained
    pub fn is_transport(&self) -> bool {
        match self {
            SdkError::Api(e) => e.is_transport(),
            SdkError::Json(_) => true,
            _ => false,
        }
    }
}
