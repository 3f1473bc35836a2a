//! Signed access tokens (compact JWS, HMAC-SHA256).
//!
//! One process-wide [`SigningKey`] is loaded at startup and shared, read-only,
//! by the issuer and by every validator. There is no unsigned or weakly-signed
//! fallback: without a usable key neither side can be constructed.

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use academyerp_core::Email;

use crate::{Role, TokenClaims};

/// Fixed token lifetime policy. Not configurable, no sliding renewal.
pub const TOKEN_LIFETIME_DAYS: i64 = 7;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// No usable signing key; fatal at startup.
    #[error("signing key unavailable: {0}")]
    SigningUnavailable(String),

    #[error("token encoding failed: {0}")]
    Encoding(String),

    #[error("token has expired")]
    Expired,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("invalid token: {0}")]
    Invalid(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Key + config
// ─────────────────────────────────────────────────────────────────────────────

/// Symmetric secret used both to sign and to verify tokens.
#[derive(Clone)]
pub struct SigningKey(Arc<[u8]>);

impl SigningKey {
    /// Minimum secret length in bytes (256 bits for HS256).
    pub const MIN_LEN: usize = 32;

    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        let secret = secret.as_ref();
        if secret.len() < Self::MIN_LEN {
            return Err(TokenError::SigningUnavailable(format!(
                "signing key must be at least {} bytes, got {}",
                Self::MIN_LEN,
                secret.len()
            )));
        }
        Ok(Self(Arc::from(secret)))
    }

    /// Build from an optional configured value; absence is fatal.
    pub fn from_setting(secret: Option<&str>) -> Result<Self, TokenError> {
        match secret {
            Some(s) if !s.trim().is_empty() => Self::new(s.as_bytes()),
            _ => Err(TokenError::SigningUnavailable(
                "signing key is not configured".to_string(),
            )),
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Fixed `iss`/`aud` values stamped into (and required from) every token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_party")]
    pub issuer: String,
    #[serde(default = "default_party")]
    pub audience: String,
}

fn default_party() -> String {
    "academyerp.local".to_string()
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: default_party(),
            audience: default_party(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Issuance
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a successful issuance. Never persisted.
#[derive(Clone)]
pub struct IssuedToken {
    /// Compact `header.claims.signature` serialization.
    pub token: String,
    pub jti: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// "First Last"; display only.
    pub user_name: String,
    /// Convenience flag; authorization must re-check the role claims.
    pub is_admin_user: bool,
}

impl core::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("jti", &self.jti)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("user_name", &self.user_name)
            .field("is_admin_user", &self.is_admin_user)
            .finish_non_exhaustive()
    }
}

pub trait TokenIssuer: Send + Sync {
    fn issue(
        &self,
        subject: &Email,
        display_name: &str,
        roles: &[Role],
    ) -> Result<IssuedToken, TokenError>;
}

/// HS256 token issuer.
pub struct Hs256TokenIssuer {
    config: TokenConfig,
    encoding_key: EncodingKey,
    header: Header,
}

impl Hs256TokenIssuer {
    pub fn new(key: &SigningKey, config: TokenConfig) -> Self {
        Self {
            config,
            encoding_key: EncodingKey::from_secret(key.as_bytes()),
            header: Header::new(Algorithm::HS256),
        }
    }

    /// Issue with an explicit clock reading.
    ///
    /// The issuance time is truncated to whole seconds so the returned
    /// `expires_at` equals the embedded `exp` claim exactly.
    pub fn issue_at(
        &self,
        now: DateTime<Utc>,
        subject: &Email,
        display_name: &str,
        roles: &[Role],
    ) -> Result<IssuedToken, TokenError> {
        let issued_at = now.trunc_subsecs(0);
        let expires_at = issued_at + Duration::days(TOKEN_LIFETIME_DAYS);
        let jti = Uuid::new_v4();

        let claims = TokenClaims {
            unique_name: subject.as_str().to_string(),
            jti: jti.to_string(),
            role: roles.to_vec().into(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        let token = encode(&self.header, &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok(IssuedToken {
            token,
            jti,
            issued_at,
            expires_at,
            user_name: display_name.to_string(),
            is_admin_user: roles.iter().any(Role::is_admin),
        })
    }
}

impl TokenIssuer for Hs256TokenIssuer {
    fn issue(
        &self,
        subject: &Email,
        display_name: &str,
        roles: &[Role],
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(Utc::now(), subject, display_name, roles)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Verifies tokens minted with the shared key (what any downstream consumer does).
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

/// HS256 validator checking signature, `exp`, `iss` and `aud`.
pub struct Hs256JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(key: &SigningKey, config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        Self {
            decoding_key: DecodingKey::from_secret(key.as_bytes()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";

    fn key() -> SigningKey {
        SigningKey::new(SECRET).unwrap()
    }

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn issuer() -> Hs256TokenIssuer {
        Hs256TokenIssuer::new(&key(), TokenConfig::default())
    }

    fn validator() -> Hs256JwtValidator {
        Hs256JwtValidator::new(&key(), &TokenConfig::default())
    }

    #[test]
    fn issued_token_round_trips_through_validator() {
        let issued = issuer()
            .issue(&email("a@x.com"), "Ada Lovelace", &[Role::admin()])
            .unwrap();

        let claims = validator().validate(&issued.token).unwrap();
        assert_eq!(claims.unique_name, "a@x.com");
        assert_eq!(claims.jti, issued.jti.to_string());
        assert_eq!(claims.roles(), &[Role::admin()]);
        assert_eq!(claims.iss, "academyerp.local");
        assert_eq!(claims.aud, "academyerp.local");
        assert_eq!(issued.token.split('.').count(), 3);
    }

    #[test]
    fn expiry_is_seven_days_after_issuance() {
        let now = Utc::now();
        let issued = issuer()
            .issue_at(now, &email("a@x.com"), "Ada Lovelace", &[])
            .unwrap();

        assert_eq!(issued.expires_at - issued.issued_at, Duration::days(7));
        assert!((issued.issued_at - now).num_seconds().abs() <= 1);

        let claims = validator().validate(&issued.token).unwrap();
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert_eq!(claims.iat, issued.issued_at.timestamp());
    }

    #[test]
    fn every_issuance_gets_a_fresh_jti_and_signature() {
        let issuer = issuer();
        let now = Utc::now();
        let a = issuer.issue_at(now, &email("a@x.com"), "A B", &[]).unwrap();
        let b = issuer.issue_at(now, &email("a@x.com"), "A B", &[]).unwrap();

        assert_ne!(a.jti, b.jti);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn admin_flag_reflects_admin_role() {
        let issuer = issuer();
        let admin = issuer
            .issue(&email("a@x.com"), "A B", &[Role::new("Instructor"), Role::admin()])
            .unwrap();
        let plain = issuer
            .issue(&email("b@x.com"), "B C", &[Role::new("Instructor")])
            .unwrap();

        assert!(admin.is_admin_user);
        assert!(!plain.is_admin_user);
    }

    #[test]
    fn spliced_payload_fails_signature_check() {
        let issuer = issuer();
        let victim = issuer.issue(&email("a@x.com"), "A B", &[]).unwrap();
        let forged = issuer
            .issue(&email("mallory@x.com"), "M M", &[Role::admin()])
            .unwrap();

        let victim_parts: Vec<&str> = victim.token.split('.').collect();
        let forged_parts: Vec<&str> = forged.token.split('.').collect();
        let spliced = format!("{}.{}.{}", victim_parts[0], forged_parts[1], victim_parts[2]);

        assert_eq!(validator().validate(&spliced), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn token_from_another_key_is_rejected() {
        let other = SigningKey::new("another-secret-that-is-32-bytes-or-more").unwrap();
        let issued = Hs256TokenIssuer::new(&other, TokenConfig::default())
            .issue(&email("a@x.com"), "A B", &[])
            .unwrap();

        assert_eq!(validator().validate(&issued.token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let config = TokenConfig {
            issuer: "academyerp.local".to_string(),
            audience: "someone-else".to_string(),
        };
        let issued = Hs256TokenIssuer::new(&key(), config)
            .issue(&email("a@x.com"), "A B", &[])
            .unwrap();

        assert!(matches!(
            validator().validate(&issued.token),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let long_ago = Utc::now() - Duration::days(30);
        let issued = issuer()
            .issue_at(long_ago, &email("a@x.com"), "A B", &[])
            .unwrap();

        assert_eq!(validator().validate(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn short_or_missing_key_is_refused() {
        assert!(matches!(
            SigningKey::new("too-short"),
            Err(TokenError::SigningUnavailable(_))
        ));
        assert!(matches!(
            SigningKey::from_setting(None),
            Err(TokenError::SigningUnavailable(_))
        ));
        assert!(matches!(
            SigningKey::from_setting(Some("   ")),
            Err(TokenError::SigningUnavailable(_))
        ));
        assert!(SigningKey::from_setting(Some(SECRET)).is_ok());
    }

    #[test]
    fn key_and_token_are_redacted_in_debug_output() {
        assert_eq!(format!("{:?}", key()), "SigningKey(<redacted>)");

        let issued = issuer().issue(&email("a@x.com"), "A B", &[]).unwrap();
        assert!(!format!("{issued:?}").contains(&issued.token));
    }
}
