//! QR wire payloads
//!
//! Two shapes are accepted when decoding: the structured JSON payload the
//! wallet renders today, and the older flat `VALID:AA-12345678` string.
//! Decoding always tries the structured shape first.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version tag written into structured payloads
pub const PAYLOAD_VERSION: u32 = 1;

/// Literal marker that starts a legacy payload
pub const LEGACY_PREFIX: &str = "VALID";

static LEGACY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^VALID:([A-Z]{2}-[0-9]{8})$").expect("legacy pattern is a valid regex")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("empty input")]
    Empty,

    #[error("unsupported payload version {0}")]
    UnsupportedVersion(u32),

    #[error("structured payload has an empty {0} field")]
    EmptyField(&'static str),

    #[error("input matches no known payload format")]
    InvalidFormat,

    #[error("failed to encode payload: {0}")]
    Encode(String),
}

/// Which wire shape a payload arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    Structured,
    Legacy,
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadFormat::Structured => f.write_str("structured"),
            PayloadFormat::Legacy => f.write_str("legacy"),
        }
    }
}

/// JSON payload: a token reference plus a profile pointer, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredPayload {
    #[serde(
        rename = "v",
        alias = "version",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<u32>,
    pub token: String,
    #[serde(alias = "profile_id", alias = "profileId")]
    pub profile: String,
    #[serde(
        rename = "exp",
        alias = "expires_at",
        alias = "expiresAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<i64>,
}

impl StructuredPayload {
    pub fn new(token: impl Into<String>, profile: impl Into<String>, expires_at: i64) -> Self {
        Self {
            version: Some(PAYLOAD_VERSION),
            token: token.into(),
            profile: profile.into(),
            expires_at: Some(expires_at),
        }
    }

    fn validate(self) -> Result<Self, PayloadError> {
        if let Some(version) = self.version {
            if version > PAYLOAD_VERSION {
                return Err(PayloadError::UnsupportedVersion(version));
            }
        }
        if self.token.trim().is_empty() {
            return Err(PayloadError::EmptyField("token"));
        }
        if self.profile.trim().is_empty() {
            return Err(PayloadError::EmptyField("profile"));
        }
        Ok(self)
    }
}

/// Flat legacy payload, e.g. `VALID:CC-12345678`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyPayload {
    /// Normalized (upper-case) identifier, e.g. `CC-12345678`
    pub identifier: String,
}

impl LegacyPayload {
    fn parse(input: &str) -> Option<Self> {
        LEGACY_PATTERN.captures(input).map(|caps| Self {
            identifier: caps[1].to_ascii_uppercase(),
        })
    }
}

/// A decoded QR or manual-entry payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrPayload {
    Structured(StructuredPayload),
    Legacy(LegacyPayload),
}

impl QrPayload {
    /// Decode scanner input, structured shape first, legacy shape second.
    ///
    /// Structured payloads with an unsupported version or empty fields are
    /// reported with their specific error; anything else that matches
    /// neither shape is `PayloadError::InvalidFormat`.
    pub fn parse(input: &str) -> Result<Self, PayloadError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(PayloadError::Empty);
        }

        if let Ok(structured) = serde_json::from_str::<StructuredPayload>(input) {
            return structured.validate().map(QrPayload::Structured);
        }

        LegacyPayload::parse(input)
            .map(QrPayload::Legacy)
            .ok_or(PayloadError::InvalidFormat)
    }

    /// Render the payload in its wire shape
    pub fn encode(&self) -> Result<String, PayloadError> {
        match self {
            QrPayload::Structured(payload) => {
                serde_json::to_string(payload).map_err(|e| PayloadError::Encode(e.to_string()))
            }
            QrPayload::Legacy(payload) => Ok(format!("{LEGACY_PREFIX}:{}", payload.identifier)),
        }
    }

    pub fn format(&self) -> PayloadFormat {
        match self {
            QrPayload::Structured(_) => PayloadFormat::Structured,
            QrPayload::Legacy(_) => PayloadFormat::Legacy,
        }
    }

    /// The value handed to the verifier as the token reference
    pub fn token(&self) -> &str {
        match self {
            QrPayload::Structured(payload) => &payload.token,
            QrPayload::Legacy(payload) => &payload.identifier,
        }
    }

    /// The profile pointer, which for legacy passes is the identifier itself
    pub fn profile(&self) -> &str {
        match self {
            QrPayload::Structured(payload) => &payload.profile,
            QrPayload::Legacy(payload) => &payload.identifier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_roundtrip() {
        let payload = QrPayload::Structured(StructuredPayload::new("b64token", "wallet-7", 1_700));
        let encoded = payload.encode().unwrap();
        assert_eq!(
            encoded,
            r#"{"v":1,"token":"b64token","profile":"wallet-7","exp":1700}"#
        );
        assert_eq!(QrPayload::parse(&encoded).unwrap(), payload);
    }

    #[test]
    fn structured_accepts_aliases_and_missing_optionals() {
        let parsed =
            QrPayload::parse(r#" {"token":"abc","profile_id":"wallet-1","expires_at":5} "#)
                .unwrap();
        match parsed {
            QrPayload::Structured(p) => {
                assert_eq!(p.version, None);
                assert_eq!(p.profile, "wallet-1");
                assert_eq!(p.expires_at, Some(5));
            }
            other => panic!("expected structured payload, got {other:?}"),
        }
    }

    #[test]
    fn structured_rejects_future_version_and_empty_token() {
        assert_eq!(
            QrPayload::parse(r#"{"v":2,"token":"abc","profile":"w"}"#),
            Err(PayloadError::UnsupportedVersion(2))
        );
        assert_eq!(
            QrPayload::parse(r#"{"token":"  ","profile":"w"}"#),
            Err(PayloadError::EmptyField("token"))
        );
    }

    #[test]
    fn legacy_payload_is_fallback() {
        let parsed = QrPayload::parse("VALID:CC-12345678").unwrap();
        assert_eq!(parsed.format(), PayloadFormat::Legacy);
        assert_eq!(parsed.token(), "CC-12345678");
        assert_eq!(parsed.profile(), "CC-12345678");
        assert_eq!(parsed.encode().unwrap(), "VALID:CC-12345678");

        let typed = QrPayload::parse("valid:cc-12345678\n").unwrap();
        assert_eq!(typed.token(), "CC-12345678");
    }

    #[test]
    fn unknown_shapes_are_invalid() {
        for input in [
            "not-a-token",
            "VALID:C-12345678",
            "VALID:CC-1234567",
            "VALID:CC-123456789",
            "OTHER:CC-12345678",
            r#"{"profile":"w"}"#,
            "[1,2,3]",
        ] {
            assert_eq!(
                QrPayload::parse(input),
                Err(PayloadError::InvalidFormat),
                "input {input:?}"
            );
        }
        assert_eq!(QrPayload::parse("   "), Err(PayloadError::Empty));
    }
}
