//! In-process pass authority
//!
//! Mints pass tokens and answers verification requests the same way the
//! hosted issuer and verifier functions do. Used by the CLI's local mode and
//! as the deterministic backend in tests.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use biscuit_auth::{KeyPair, PublicKey};
use chrono::Utc;
use tracing::{debug, info};

use crate::error::TokenError;
use crate::mint::{create_pass_biscuit, TokenTimeConfig, DEFAULT_TTL_SECS};
use crate::model::{PermissionSet, SubjectId, Token, IDENTITY};
use crate::payload::PayloadFormat;
use crate::utils::{decode_token, encode_token};
use crate::verdict::{codes, DisplayAttributes, Verdict};
use crate::verify::verify_pass_biscuit;

/// Display data the authority resolves for a subject at verification time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub display_name: Option<String>,
    pub status_color: Option<String>,
    pub badges: Vec<String>,
}

impl Profile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            display_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_status_color(mut self, color: impl Into<String>) -> Self {
        self.status_color = Some(color.into());
        self
    }

    pub fn with_badge(mut self, badge: impl Into<String>) -> Self {
        self.badges.push(badge.into());
        self
    }
}

#[derive(Debug, Clone)]
struct PassGrant {
    subject: SubjectId,
    permissions: PermissionSet,
    expires_at: i64,
    revocation_id: String,
}

#[derive(Debug, Default)]
struct Registry {
    grants: HashMap<String, PassGrant>,
    profiles: HashMap<SubjectId, Profile>,
    legacy_passes: HashMap<String, SubjectId>,
    revoked: HashSet<String>,
    revoked_subjects: HashSet<SubjectId>,
}

impl Registry {
    fn attributes_for(&self, subject: &SubjectId, permissions: &PermissionSet) -> DisplayAttributes {
        let profile = self.profiles.get(subject).cloned().unwrap_or_default();

        let mut badges = profile.badges;
        badges.extend(
            permissions
                .enabled()
                .filter(|name| *name != IDENTITY)
                .map(str::to_string),
        );

        DisplayAttributes {
            name: if permissions.is_enabled(IDENTITY) {
                profile.display_name
            } else {
                None
            },
            status_color: Some(profile.status_color.unwrap_or_else(|| "green".to_string())),
            badges,
            ..DisplayAttributes::default()
        }
    }
}

/// Issuer and verifier backed by a local signing key and an in-memory
/// grant registry.
pub struct PassAuthority {
    keypair: KeyPair,
    ttl_secs: i64,
    registry: RwLock<Registry>,
}

impl PassAuthority {
    pub fn new(keypair: KeyPair) -> Self {
        Self {
            keypair,
            ttl_secs: DEFAULT_TTL_SECS,
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Authority with a freshly generated signing key
    pub fn generate() -> Self {
        Self::new(KeyPair::new())
    }

    pub fn with_ttl(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public()
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_profile(&self, subject: SubjectId, profile: Profile) {
        self.write().profiles.insert(subject, profile);
    }

    /// Accept a flat `VALID:` identifier as a pass for `subject`
    pub fn register_legacy_pass(&self, identifier: impl Into<String>, subject: SubjectId) {
        let identifier = identifier.into().to_ascii_uppercase();
        self.write().legacy_passes.insert(identifier, subject);
    }

    /// Revoke a single pass by pass id or hex revocation id
    pub fn revoke_pass(&self, id: impl Into<String>) {
        self.write().revoked.insert(id.into());
    }

    /// Revoke every pass of a subject, including ones not yet minted
    pub fn revoke_subject(&self, subject: SubjectId) {
        self.write().revoked_subjects.insert(subject);
    }

    /// Number of grants the registry still holds
    pub fn active_grants(&self) -> usize {
        self.read().grants.len()
    }

    /// Forget grants whose passes have lapsed. Lapsed passes still verify as
    /// `EXPIRED` because expiry is read from the token itself.
    pub fn prune_expired(&self, now: i64) -> usize {
        let mut registry = self.write();
        let before = registry.grants.len();
        registry.grants.retain(|_, grant| grant.expires_at > now);
        before - registry.grants.len()
    }

    pub fn issue(
        &self,
        subject: &SubjectId,
        permissions: &PermissionSet,
    ) -> Result<Token, TokenError> {
        self.issue_at(subject, permissions, Utc::now().timestamp())
    }

    /// Mint a pass for `subject` valid on `[now, now + ttl)`.
    pub fn issue_at(
        &self,
        subject: &SubjectId,
        permissions: &PermissionSet,
        now: i64,
    ) -> Result<Token, TokenError> {
        if self.read().revoked_subjects.contains(subject) {
            return Err(TokenError::unauthorized(format!(
                "Subject {subject} may not hold passes"
            )));
        }

        let minted = create_pass_biscuit(
            &self.keypair,
            TokenTimeConfig::with_duration(self.ttl_secs).starting_at(now),
        )?;

        let pruned = self.prune_expired(now);
        if pruned > 0 {
            debug!(pruned, "dropped lapsed pass grants");
        }

        self.write().grants.insert(
            minted.pass_id.clone(),
            PassGrant {
                subject: subject.clone(),
                permissions: permissions.clone(),
                expires_at: minted.expires_at,
                revocation_id: minted.revocation_id.clone(),
            },
        );

        info!(
            pass_id = %minted.pass_id,
            %subject,
            expires_at = minted.expires_at,
            "issued pass"
        );

        Ok(Token {
            subject_id: subject.clone(),
            permissions: permissions.clone(),
            issued_at: minted.issued_at,
            expires_at: minted.expires_at,
            opaque_value: encode_token(&minted.token),
        })
    }

    pub fn verify(&self, token: &str, profile: Option<&str>, format: PayloadFormat) -> Verdict {
        self.verify_at(token, profile, format, Utc::now().timestamp())
    }

    /// Answer a verification request as of `now`.
    ///
    /// Order: decode, signature, validity window, revocation, grant lookup,
    /// profile pointer. Never mutates the registry.
    pub fn verify_at(
        &self,
        token: &str,
        profile: Option<&str>,
        format: PayloadFormat,
        now: i64,
    ) -> Verdict {
        let verdict = match format {
            PayloadFormat::Legacy => self.verify_legacy(token),
            PayloadFormat::Structured => self.verify_structured(token, profile, now),
        };

        info!(%format, result = verdict.result_code(), "verified pass");
        verdict
    }

    fn verify_legacy(&self, identifier: &str) -> Verdict {
        let registry = self.read();
        let identifier = identifier.trim().to_ascii_uppercase();

        let Some(subject) = registry.legacy_passes.get(&identifier) else {
            return Verdict::deny(codes::UNKNOWN_PASS, "Pass not recognised");
        };
        if registry.revoked.contains(&identifier) || registry.revoked_subjects.contains(subject) {
            return Verdict::deny(codes::REVOKED, "Pass has been revoked");
        }

        let permissions = PermissionSet::new().with(IDENTITY, true);
        Verdict::allow(registry.attributes_for(subject, &permissions))
    }

    fn verify_structured(&self, token: &str, profile: Option<&str>, now: i64) -> Verdict {
        let bytes = match decode_token(token) {
            Ok(bytes) => bytes,
            Err(_) => return Verdict::deny(codes::INVALID_TOKEN, "Malformed token"),
        };

        let claims = match verify_pass_biscuit(&bytes, self.public_key(), now) {
            Ok(claims) => claims,
            Err(TokenError::Expired { .. }) => return Verdict::expired(),
            Err(TokenError::NotYetValid { .. }) => {
                return Verdict::deny(codes::NOT_YET_VALID, "Pass is not valid yet")
            }
            Err(e) => {
                debug!(error = %e, "pass failed signature checks");
                return Verdict::deny(codes::INVALID_TOKEN, "Token could not be verified");
            }
        };

        let registry = self.read();
        if registry.revoked.contains(&claims.pass_id)
            || registry.revoked.contains(&claims.revocation_id)
        {
            return Verdict::deny(codes::REVOKED, "Pass has been revoked");
        }

        let Some(grant) = registry.grants.get(&claims.pass_id) else {
            return Verdict::deny(codes::UNKNOWN_PASS, "Pass not recognised");
        };
        if grant.revocation_id != claims.revocation_id {
            return Verdict::deny(codes::INVALID_TOKEN, "Token could not be verified");
        }
        if registry.revoked_subjects.contains(&grant.subject) {
            return Verdict::deny(codes::REVOKED, "Pass has been revoked");
        }
        if let Some(pointer) = profile {
            if pointer != grant.subject.as_str() {
                return Verdict::deny(codes::PROFILE_MISMATCH, "Pass belongs to another profile");
            }
        }

        Verdict::allow(registry.attributes_for(&grant.subject, &grant.permissions))
    }
}
