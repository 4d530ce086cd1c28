//! Self-signed, time-boxed bearer tokens for the Kling API.
//!
//! Kling authenticates requests with an HS256 JWT minted client-side from an
//! access-key/secret-key pair. Tokens are cached and reused until they come
//! within a safety window of expiry; neither the secret nor the minted token
//! is ever logged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::sdk_core::SdkError;

/// Token lifetime.
const TOKEN_TTL_SECS: i64 = 1800;
/// A cached token this close to expiry is re-signed instead of reused.
const REFRESH_WINDOW_SECS: i64 = 300;
/// Clock-skew allowance on the not-before claim.
const NOT_BEFORE_SKEW_SECS: i64 = 5;

/// JWT claims Kling expects in the bearer token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Issuer -- the access key.
    iss: String,
    /// Issued-at (UTC Unix timestamp).
    iat: i64,
    /// Not valid before (UTC Unix timestamp).
    nbf: i64,
    /// Expiration (UTC Unix timestamp).
    exp: i64,
}

struct CachedToken {
    token: String,
    expires_at: i64,
}

pub struct KlingTokenIssuer {
    access_key: String,
    secret_key: String,
    cached: Mutex<Option<CachedToken>>,
    signatures: AtomicU64,
}

impl KlingTokenIssuer {
    /// Fails with an auth configuration error when either key is empty;
    /// nothing downstream can recover from that.
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, SdkError> {
        let access_key = access_key.into();
        let secret_key = secret_key.into();
        if access_key.trim().is_empty() {
            return Err(SdkError::AuthConfiguration {
                message: "Kling access key is not configured".into(),
            });
        }
        if secret_key.trim().is_empty() {
            return Err(SdkError::AuthConfiguration {
                message: "Kling secret key is not configured".into(),
            });
        }
        Ok(Self {
            access_key,
            secret_key,
            cached: Mutex::new(None),
            signatures: AtomicU64::new(0),
        })
    }

    /// Current bearer token, reusing the cached one while it stays outside
    /// the refresh window.
    pub fn bearer_token(&self) -> Result<String, SdkError> {
        self.token_at(chrono::Utc::now().timestamp())
    }

    fn token_at(&self, now: i64) -> Result<String, SdkError> {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(current) = cached.as_ref() {
            if now < current.expires_at - REFRESH_WINDOW_SECS {
                return Ok(current.token.clone());
            }
        }

        let claims = Claims {
            iss: self.access_key.clone(),
            iat: now,
            nbf: now - NOT_BEFORE_SKEW_SECS,
            exp: now + TOKEN_TTL_SECS,
        };
        let token = encode(
            &Header::default(), // HS256
            &claims,
            &EncodingKey::from_secret(self.secret_key.as_bytes()),
        )
        .map_err(|e| SdkError::AuthConfiguration {
            message: format!("failed to sign bearer token: {e}"),
        })?;
        self.signatures.fetch_add(1, Ordering::Relaxed);
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: claims.exp,
        });
        Ok(token)
    }

    /// Number of signatures computed so far. Cache hits do not advance it.
    pub fn signature_count(&self) -> u64 {
        self.signatures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    fn test_issuer() -> KlingTokenIssuer {
        KlingTokenIssuer::new("ak-test", "sk-test-secret-long-enough-for-hmac")
            .expect("issuer construction should succeed")
    }

    fn decode_claims(token: &str) -> Claims {
        let mut validation = Validation::default();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        decode::<Claims>(
            token,
            &DecodingKey::from_secret("sk-test-secret-long-enough-for-hmac".as_bytes()),
            &validation,
        )
        .expect("token should decode with the signing secret")
        .claims
    }

    #[test]
    fn empty_keys_are_a_configuration_error() {
        for (ak, sk) in [("", "sk"), ("ak", ""), ("  ", "sk")] {
            match KlingTokenIssuer::new(ak, sk) {
                Err(SdkError::AuthConfiguration { .. }) => {}
                _ => panic!("expected AuthConfiguration error for ak={ak:?}, sk={sk:?}"),
            }
        }
    }

    #[test]
    fn claims_carry_issuer_and_expected_windows() {
        let issuer = test_issuer();
        let now = 1_700_000_000;
        let token = issuer.token_at(now).expect("token");
        let claims = decode_claims(&token);
        assert_eq!(claims.iss, "ak-test");
        assert_eq!(claims.iat, now);
        assert_eq!(claims.nbf, now - 5);
        assert_eq!(claims.exp, now + 1800);
    }

    #[test]
    fn token_is_cached_until_the_refresh_window() {
        let issuer = test_issuer();
        let now = 1_700_000_000;
        let first = issuer.token_at(now).expect("token");
        assert_eq!(issuer.signature_count(), 1);

        // 1499s after issuance: still outside exp - 300, so no new signature.
        let cached = issuer.token_at(now + 1499).expect("token");
        assert_eq!(cached, first);
        assert_eq!(issuer.signature_count(), 1);
    }

    #[test]
    fn token_is_resigned_inside_the_refresh_window() {
        let issuer = test_issuer();
        let now = 1_700_000_000;
        let first = issuer.token_at(now).expect("token");

        // exp - 300 boundary: a fresh token with a fresh iat is signed.
        let refreshed = issuer.token_at(now + 1500).expect("token");
        assert_ne!(refreshed, first);
        assert_eq!(issuer.signature_count(), 2);
        assert_eq!(decode_claims(&refreshed).iat, now + 1500);
    }
}
