use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Capability names understood by the wallet
pub const IDENTITY: &str = "identity";
pub const PAYMENT: &str = "payment";
pub const HEALTH: &str = "health";

/// Opaque reference to a wallet or profile.
///
/// Doubles as the profile pointer embedded in structured QR payloads, so it
/// must never carry personal data itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SubjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Named boolean capabilities a holder chooses to expose through a token.
///
/// Ordered so that two sets with the same flags serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    flags: BTreeMap<String, bool>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity and payment on, health off.
    pub fn wallet_defaults() -> Self {
        Self::new()
            .with(IDENTITY, true)
            .with(PAYMENT, true)
            .with(HEALTH, false)
    }

    pub fn with(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.flags.insert(name.into(), enabled);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, enabled: bool) {
        self.flags.insert(name.into(), enabled);
    }

    /// Flip a capability and return its new value. Unknown names start
    /// disabled, so the first toggle enables them.
    pub fn toggle(&mut self, name: &str) -> bool {
        let flag = self.flags.entry(name.to_string()).or_insert(false);
        *flag = !*flag;
        *flag
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// Names of the capabilities currently switched on
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.flags
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.flags.iter().map(|(name, enabled)| (name.as_str(), *enabled))
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = (S, bool)>>(iter: T) -> Self {
        Self {
            flags: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// What an issuer hands back: the opaque value and its validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Opaque, unguessable token value
    pub token: String,
    /// Unix timestamp (seconds) at which the token stops being valid
    pub expires_at: i64,
    /// Unix timestamp (seconds) at which the token was minted, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
}

/// Server-side view of a token: who it was minted for and what it asserts.
///
/// Only the `opaque_value` ever leaves the issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub subject_id: SubjectId,
    pub permissions: PermissionSet,
    pub issued_at: i64,
    pub expires_at: i64,
    pub opaque_value: String,
}

impl Token {
    /// A token is valid on the half-open window `[issued_at, expires_at)`.
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.issued_at <= now && now < self.expires_at
    }

    pub fn remaining_secs(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }

    pub fn issued(&self) -> IssuedToken {
        IssuedToken {
            token: self.opaque_value.clone(),
            expires_at: self.expires_at,
            issued_at: Some(self.issued_at),
        }
    }
}
