extern crate biscuit_auth as biscuit;

use biscuit::macros::biscuit;
use biscuit::{BiscuitBuilder, KeyPair};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::TokenError;
use crate::revocation::authority_revocation_id;

/// Lifetime of a freshly minted pass, in seconds
pub const DEFAULT_TTL_SECS: i64 = 30;

/// TokenTimeConfig allows control over token creation times and durations
#[derive(Debug, Clone, Copy)]
pub struct TokenTimeConfig {
    /// Optional custom start time (now time override)
    pub start_time: Option<i64>,
    /// Duration in seconds (default: 30 seconds)
    pub duration: i64,
}

impl Default for TokenTimeConfig {
    fn default() -> Self {
        Self {
            start_time: None,
            duration: DEFAULT_TTL_SECS,
        }
    }
}

impl TokenTimeConfig {
    pub fn with_duration(duration: i64) -> Self {
        Self {
            start_time: None,
            duration,
        }
    }

    pub fn starting_at(mut self, start_time: i64) -> Self {
        self.start_time = Some(start_time);
        self
    }
}

/// A pass token fresh out of the mint, with the metadata the issuer keeps
/// server-side.
#[derive(Debug, Clone)]
pub struct MintedPass {
    /// Random identifier the token points at
    pub pass_id: String,
    /// Serialized biscuit
    pub token: Vec<u8>,
    pub issued_at: i64,
    pub expires_at: i64,
    /// Hex revocation id of the authority block
    pub revocation_id: String,
}

/// Builds the authority block of a pass.
///
/// Only the pass id and its validity window go into the token; subject and
/// permissions stay in the issuer's registry.
pub fn create_pass_biscuit_builder(
    pass_id: String,
    time_config: TokenTimeConfig,
) -> (BiscuitBuilder, i64, i64) {
    let issued_at = time_config
        .start_time
        .unwrap_or_else(|| Utc::now().timestamp());
    let expiration = issued_at + time_config.duration;

    let builder = biscuit!(
        r#"
            pass({pass_id});
            issued_at({issued_at});
            expiration({expiration});
            check if time($time), $time >= {issued_at}, $time < {expiration};
        "#
    );

    (builder, issued_at, expiration)
}

pub fn create_pass_biscuit(
    key: &KeyPair,
    time_config: TokenTimeConfig,
) -> Result<MintedPass, TokenError> {
    create_pass_biscuit_with_id(Uuid::new_v4().to_string(), key, time_config)
}

pub fn create_pass_biscuit_with_id(
    pass_id: String,
    key: &KeyPair,
    time_config: TokenTimeConfig,
) -> Result<MintedPass, TokenError> {
    let (builder, issued_at, expires_at) =
        create_pass_biscuit_builder(pass_id.clone(), time_config);
    let biscuit = builder.build(key)?;

    let revocation_id = authority_revocation_id(&biscuit)
        .ok_or_else(|| TokenError::generic("Minted pass has no revocation id"))?;

    debug!(%pass_id, expires_at, "minted pass biscuit");

    Ok(MintedPass {
        pass_id,
        token: biscuit.to_vec()?,
        issued_at,
        expires_at,
        revocation_id,
    })
}
