use async_trait::async_trait;

use ghostpass_api::GhostPassClient;
use ghostpass_token::{IssuedToken, PassAuthority, PermissionSet, SubjectId};

use crate::error::SdkError;

/// Source of fresh pass tokens.
///
/// Every call yields a new token; callers may retry freely.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(
        &self,
        subject: &SubjectId,
        permissions: &PermissionSet,
    ) -> Result<IssuedToken, SdkError>;
}

#[async_trait]
impl TokenIssuer for GhostPassClient {
    async fn issue(
        &self,
        subject: &SubjectId,
        permissions: &PermissionSet,
    ) -> Result<IssuedToken, SdkError> {
        let flags = permissions
            .iter()
            .map(|(name, enabled)| (name.to_string(), enabled))
            .collect();

        let grant = self.issue_token(subject.as_str(), flags).await?;
        Ok(IssuedToken {
            token: grant.token,
            expires_at: grant.expires_at,
            issued_at: grant.issued_at,
        })
    }
}

#[async_trait]
impl TokenIssuer for PassAuthority {
    async fn issue(
        &self,
        subject: &SubjectId,
        permissions: &PermissionSet,
    ) -> Result<IssuedToken, SdkError> {
        let token = PassAuthority::issue(self, subject, permissions)?;
        Ok(token.issued())
    }
}
