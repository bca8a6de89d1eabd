use async_trait::async_trait;

use ghostpass_api::{ApiError, GhostPassClient};
use ghostpass_token::{DisplayAttributes, PassAuthority, PayloadFormat, Verdict};

use crate::error::SdkError;

/// Authority that judges scanned tokens.
///
/// Safe to call with expired or already-seen tokens; has no side effects on
/// the caller's side.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(
        &self,
        token: &str,
        profile: Option<&str>,
        format: PayloadFormat,
    ) -> Result<Verdict, SdkError>;
}

#[async_trait]
impl TokenVerifier for GhostPassClient {
    async fn verify(
        &self,
        token: &str,
        profile: Option<&str>,
        format: PayloadFormat,
    ) -> Result<Verdict, SdkError> {
        let response = self
            .verify_token(token, profile, &format.to_string())
            .await?;

        let attributes = response
            .attributes
            .map(serde_json::from_value::<DisplayAttributes>)
            .transpose()
            .map_err(|e| ApiError::InvalidResponse(format!("Malformed attributes: {e}")))?;

        Ok(Verdict::from_parts(
            &response.result,
            response.reason,
            attributes,
        ))
    }
}

#[async_trait]
impl TokenVerifier for PassAuthority {
    async fn verify(
        &self,
        token: &str,
        profile: Option<&str>,
        format: PayloadFormat,
    ) -> Result<Verdict, SdkError> {
        Ok(PassAuthority::verify(self, token, profile, format))
    }
}
