use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result codes on the verifier wire
pub mod codes {
    pub const ALLOW: &str = "ALLOW";
    pub const EXPIRED: &str = "EXPIRED";
    pub const DENY: &str = "DENY";
    pub const INVALID_TOKEN: &str = "INVALID_TOKEN";
    pub const NOT_YET_VALID: &str = "NOT_YET_VALID";
    pub const REVOKED: &str = "REVOKED";
    pub const UNKNOWN_PASS: &str = "UNKNOWN_PASS";
    pub const PROFILE_MISMATCH: &str = "PROFILE_MISMATCH";
}

/// Attributes the verifier chooses to show at the door.
///
/// Scanners render these as-is; they never derive them from the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        alias = "statusColor",
        skip_serializing_if = "Option::is_none"
    )]
    pub status_color: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub badges: Vec<String>,
    /// Anything else the verifier sent along
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Categorical answer from a verifier
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Allow { attributes: DisplayAttributes },
    Expired { reason: Option<String> },
    Deny { code: String, reason: Option<String> },
}

impl Verdict {
    pub fn allow(attributes: DisplayAttributes) -> Self {
        Verdict::Allow { attributes }
    }

    pub fn expired() -> Self {
        Verdict::Expired { reason: None }
    }

    pub fn deny(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Verdict::Deny {
            code: code.into(),
            reason: Some(reason.into()),
        }
    }

    /// Classify a wire result. `ALLOW` and `EXPIRED` are matched
    /// case-insensitively; every other code is a denial.
    pub fn from_parts(
        result: &str,
        reason: Option<String>,
        attributes: Option<DisplayAttributes>,
    ) -> Self {
        let normalized = result.trim().to_ascii_uppercase();
        match normalized.as_str() {
            codes::ALLOW => Verdict::Allow {
                attributes: attributes.unwrap_or_default(),
            },
            codes::EXPIRED => Verdict::Expired { reason },
            "" => Verdict::Deny {
                code: codes::DENY.to_string(),
                reason,
            },
            _ => Verdict::Deny {
                code: normalized,
                reason,
            },
        }
    }

    pub fn result_code(&self) -> &str {
        match self {
            Verdict::Allow { .. } => codes::ALLOW,
            Verdict::Expired { .. } => codes::EXPIRED,
            Verdict::Deny { code, .. } => code,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Allow { .. } => None,
            Verdict::Expired { reason } | Verdict::Deny { reason, .. } => reason.as_deref(),
        }
    }

    pub fn attributes(&self) -> Option<&DisplayAttributes> {
        match self {
            Verdict::Allow { attributes } => Some(attributes),
            _ => None,
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_wire_codes() {
        assert!(Verdict::from_parts("allow", None, None).is_allow());
        assert_eq!(
            Verdict::from_parts("EXPIRED", None, None),
            Verdict::Expired { reason: None }
        );

        let deny = Verdict::from_parts("revoked", Some("pass revoked".into()), None);
        assert_eq!(deny.result_code(), codes::REVOKED);
        assert_eq!(deny.reason(), Some("pass revoked"));

        assert_eq!(Verdict::from_parts("  ", None, None).result_code(), codes::DENY);
    }

    #[test]
    fn attributes_keep_unknown_fields() {
        let attrs: DisplayAttributes = serde_json::from_str(
            r#"{"name":"Ada","statusColor":"green","badges":["vip"],"tier":"gold"}"#,
        )
        .unwrap();

        assert_eq!(attrs.name.as_deref(), Some("Ada"));
        assert_eq!(attrs.status_color.as_deref(), Some("green"));
        assert_eq!(attrs.badges, vec!["vip".to_string()]);
        assert_eq!(attrs.extra.get("tier"), Some(&Value::from("gold")));
    }
}
