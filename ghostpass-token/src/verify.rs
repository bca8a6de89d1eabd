extern crate biscuit_auth as biscuit;

use biscuit::macros::authorizer;
use biscuit::Algorithm as Alg;
use biscuit::{AuthorizerBuilder, Biscuit, PublicKey};

use crate::error::TokenError;
use crate::revocation::authority_revocation_id;

/// What a correctly signed, unexpired pass asserts about itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassClaims {
    pub pass_id: String,
    pub issued_at: i64,
    pub expires_at: i64,
    pub revocation_id: String,
}

fn build_pass_authorizer(now: i64) -> AuthorizerBuilder {
    authorizer!(
        r#"
            time({now});
            allow if pass($id);
        "#
    )
}

/// Verifies a pass biscuit locally at the instant `now` (unix seconds).
///
/// Checks the signature against `public_key`, then the validity window. A
/// pass is valid on `[issued_at, expires_at)`, so `now == expires_at` is
/// already expired.
///
/// # Errors
///
/// - `TokenError::Biscuit` if the token is malformed or the signature is invalid
/// - `TokenError::NotYetValid` if `now < issued_at`
/// - `TokenError::Expired` if the token is well-formed but `now >= expires_at`
/// - `TokenError::Unauthorized` if the token is not a pass or its checks fail
pub fn verify_pass_biscuit(
    token: &[u8],
    public_key: PublicKey,
    now: i64,
) -> Result<PassClaims, TokenError> {
    let biscuit = Biscuit::from(token, public_key)?;
    let revocation_id = authority_revocation_id(&biscuit)
        .ok_or_else(|| TokenError::unauthorized("Token has no authority block"))?;

    let mut authorizer = build_pass_authorizer(now).build(&biscuit)?;

    let passes: Vec<(String,)> = authorizer.query("data($id) <- pass($id)")?;
    let issued: Vec<(i64,)> = authorizer.query("data($iat) <- issued_at($iat)")?;
    let expirations: Vec<(i64,)> = authorizer.query("data($exp) <- expiration($exp)")?;

    let pass_id = passes
        .into_iter()
        .next()
        .map(|(id,)| id)
        .ok_or_else(|| TokenError::unauthorized("Token does not name a pass"))?;
    let expires_at = expirations
        .into_iter()
        .map(|(exp,)| exp)
        .min()
        .ok_or_else(|| TokenError::unauthorized("Token carries no expiration"))?;
    let issued_at = issued
        .into_iter()
        .map(|(iat,)| iat)
        .max()
        .ok_or_else(|| TokenError::unauthorized("Token carries no issue time"))?;

    if now < issued_at {
        return Err(TokenError::NotYetValid { issued_at });
    }
    if now >= expires_at {
        return Err(TokenError::Expired { expires_at });
    }

    if authorizer.authorize().is_err() {
        return Err(TokenError::unauthorized("Pass checks failed"));
    }

    Ok(PassClaims {
        pass_id,
        issued_at,
        expires_at,
        revocation_id,
    })
}

/// Takes a public key encoded as a string in the format "ed25519/..." or "secp256r1/..."
/// and returns a PublicKey.
pub fn biscuit_key_from_string(key: String) -> Result<PublicKey, TokenError> {
    let parts = key.split('/').collect::<Vec<&str>>();
    if parts.len() != 2 {
        return Err(TokenError::invalid_key_format(
            "Key must be in format 'algorithm/hexkey'",
        ));
    }

    let alg = match parts[0] {
        "ed25519" => Alg::Ed25519,
        "secp256r1" => Alg::Secp256r1,
        _ => {
            return Err(TokenError::invalid_key_format(
                "Unsupported algorithm, must be ed25519 or secp256r1",
            ))
        }
    };

    let key = hex::decode(parts[1])?;

    let key = PublicKey::from_bytes(&key, alg)
        .map_err(|e| TokenError::invalid_key_format(e.to_string()))?;

    Ok(key)
}

/// Parses a public key given either as PEM or as "algorithm/hexkey"
pub fn public_key_from_str(key: &str) -> Result<PublicKey, TokenError> {
    let key = key.trim();
    if key.starts_with("-----BEGIN") {
        PublicKey::from_pem(key).map_err(|e| TokenError::invalid_key_format(e.to_string()))
    } else {
        biscuit_key_from_string(key.to_string())
    }
}

/// Formats a public key as "algorithm/hexkey", the inverse of
/// [`biscuit_key_from_string`]
pub fn public_key_to_string(key: &PublicKey) -> String {
    format!("{}/{}", key.algorithm_string(), hex::encode(key.to_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mint::{create_pass_biscuit, TokenTimeConfig};
    use biscuit::KeyPair;
    use chrono::Utc;

    #[test]
    fn test_verify_rejects_other_key() {
        let root = KeyPair::new();
        let attacker = KeyPair::new();
        let minted = create_pass_biscuit(&attacker, TokenTimeConfig::default()).unwrap();

        let err = verify_pass_biscuit(&minted.token, root.public(), Utc::now().timestamp())
            .unwrap_err();
        assert!(matches!(err, TokenError::Biscuit(_)));
    }

    #[test]
    fn test_verify_rejects_tampered_bytes() {
        let root = KeyPair::new();
        let mut token = create_pass_biscuit(&root, TokenTimeConfig::default())
            .unwrap()
            .token;
        let mid = token.len() / 2;
        token[mid] ^= 0xff;

        assert!(verify_pass_biscuit(&token, root.public(), Utc::now().timestamp()).is_err());
    }

    #[test]
    fn test_expiry_boundary() {
        let root = KeyPair::new();
        let minted =
            create_pass_biscuit(&root, TokenTimeConfig::with_duration(30).starting_at(1_000))
                .unwrap();

        assert!(verify_pass_biscuit(&minted.token, root.public(), 1_000).is_ok());
        assert!(verify_pass_biscuit(&minted.token, root.public(), 1_029).is_ok());

        for now in [1_030, 1_031, 5_000] {
            let err = verify_pass_biscuit(&minted.token, root.public(), now).unwrap_err();
            assert!(
                matches!(err, TokenError::Expired { expires_at: 1_030 }),
                "expected expiry at t={now}, got {err}"
            );
        }
    }

    #[test]
    fn test_not_valid_before_issue_time() {
        let root = KeyPair::new();
        let minted =
            create_pass_biscuit(&root, TokenTimeConfig::with_duration(30).starting_at(1_000))
                .unwrap();

        for now in [999, 500, 0] {
            let err = verify_pass_biscuit(&minted.token, root.public(), now).unwrap_err();
            assert!(
                matches!(err, TokenError::NotYetValid { issued_at: 1_000 }),
                "expected not-yet-valid at t={now}, got {err}"
            );
        }

        let claims = verify_pass_biscuit(&minted.token, root.public(), 1_000).unwrap();
        assert_eq!(claims.issued_at, 1_000);
        assert_eq!(claims.expires_at, 1_030);
    }

    #[test]
    fn test_secp256r1_key_string_round_trip() {
        let root = KeyPair::new_with_algorithm(Alg::Secp256r1);
        let encoded = public_key_to_string(&root.public());
        assert!(encoded.starts_with("secp256r1/"));

        let parsed = biscuit_key_from_string(encoded).unwrap();
        assert_eq!(parsed.to_bytes(), root.public().to_bytes());
        assert_eq!(parsed.algorithm_string(), "secp256r1");
    }

    #[test]
    fn test_biscuit_key_from_string() {
        let root = KeyPair::new();
        let encoded = public_key_to_string(&root.public());
        assert!(encoded.starts_with("ed25519/"));
        let parsed = biscuit_key_from_string(encoded.clone()).unwrap();
        assert_eq!(parsed.to_bytes(), root.public().to_bytes());

        assert!(public_key_from_str(&format!("  {encoded}\n")).is_ok());
        assert!(biscuit_key_from_string("ed25519".to_string()).is_err());
        assert!(biscuit_key_from_string("rsa/abcd".to_string()).is_err());
        assert!(biscuit_key_from_string("ed25519/zz".to_string()).is_err());
    }
}
