//! Access token issuing and validation
//!
//! Access tokens are HS256-signed JWTs carrying the issuer, the account id as
//! subject and a snapshot of the account identity. Validation pins HS256 so a
//! token presenting any other `alg` header is rejected outright.
//!
//! Refresh tokens are not JWTs: they are opaque random strings generated by
//! [`generate_refresh_token`] and only ever compared against the session
//! store.

use anyhow::Result;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::Account;

/// Number of random bytes behind every refresh token
const REFRESH_TOKEN_BYTES: usize = 32;

/// Longest accepted token or session lifetime, in seconds (10 years)
pub const MAX_LIFETIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Read a lifetime in seconds from `var`.
///
/// Unset or unparseable values fall back to `default`. Zero and anything
/// above [`MAX_LIFETIME_SECS`] are rejected.
pub fn lifetime_from_env(var: &str, default: u64) -> Result<u64> {
    let secs = std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default);

    if secs == 0 || secs > MAX_LIFETIME_SECS {
        anyhow::bail!(
            "{} must be between 1 and {} seconds, got {}",
            var,
            MAX_LIFETIME_SECS,
            secs
        );
    }

    Ok(secs)
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens
    pub secret: String,
    /// Value of the `iss` claim, also required on validation
    pub issuer: String,
    /// Access token lifetime in seconds (default: 24 hours)
    pub access_token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: Signing secret (required, must not be empty)
    /// - `JWT_ISSUER`: Issuer claim (default: "feather")
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 86400)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;
        if secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| "feather".to_string());

        let access_token_expiry = lifetime_from_env("JWT_ACCESS_TOKEN_EXPIRY", 86400)?; // 24 hours

        Ok(JwtConfig {
            secret,
            issuer,
            access_token_expiry,
        })
    }
}

/// Identity snapshot embedded in every access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub id: String,
    pub email: Option<String>,
    pub username: Option<String>,
}

impl From<&Account> for UserClaims {
    fn from(account: &Account) -> Self {
        UserClaims {
            id: account.id.to_string(),
            email: account.email.clone(),
            username: account.username.clone(),
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer
    pub iss: String,
    /// Account ID
    pub sub: String,
    /// Account identity at issue time
    pub user: UserClaims,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

impl Claims {
    /// Subject parsed as an account id.
    ///
    /// The embedded identity must name the same account as `sub`.
    pub fn account_id(&self) -> Result<Uuid, TokenError> {
        if self.user.id != self.sub {
            return Err(TokenError::Malformed);
        }
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }
}

/// Token validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Signature, algorithm or issuer did not check out
    #[error("token signature is invalid")]
    Invalid,

    /// The `exp` claim has elapsed
    #[error("token has expired")]
    Expired,

    /// Not a JWT, or required claims are missing or of the wrong shape
    #[error("token is malformed")]
    Malformed,

    /// Signing a new token failed
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidIssuer
            | ErrorKind::ImmatureSignature => TokenError::Invalid,
            _ => TokenError::Malformed,
        }
    }
}

/// Stateless access token issuer
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    session_validation: Validation,
    config: JwtConfig,
}

impl TokenIssuer {
    /// Initialize a new token issuer
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);

        // Session expiry governs refresh, not the token's own `exp`.
        let mut session_validation = validation.clone();
        session_validation.validate_exp = false;

        TokenIssuer {
            encoding_key,
            decoding_key,
            validation,
            session_validation,
            config,
        }
    }

    /// Generate an access token for an identity snapshot
    pub fn issue(&self, user: &UserClaims) -> Result<String, TokenError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let exp = now
            .checked_add(self.config.access_token_expiry)
            .ok_or_else(|| TokenError::Signing("access token expiry out of range".to_string()))?;

        let claims = Claims {
            iss: self.config.issuer.clone(),
            sub: user.id.clone(),
            user: user.clone(),
            iat: now,
            exp,
        };

        self.sign(&claims)
    }

    /// Validate a token and return the claims
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Validate the access token stored with a session.
    ///
    /// Signature, algorithm, issuer and claim shape are checked as in
    /// [`TokenIssuer::validate`]; an elapsed `exp` is accepted.
    pub fn validate_session_token(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.session_validation)?;
        Ok(token_data.claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

/// Generate an opaque refresh token with 256 bits of entropy
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            issuer: "feather-test".to_string(),
            access_token_expiry: 86400,
        }
    }

    fn test_account() -> Account {
        Account {
            id: Uuid::new_v4(),
            email: Some("a@b.com".to_string()),
            username: None,
            password_hash: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn now() -> u64 {
        Utc::now().timestamp() as u64
    }

    #[test]
    fn test_issue_and_validate() {
        let issuer = TokenIssuer::new(test_config());
        let account = test_account();

        let token = issuer.issue(&UserClaims::from(&account)).unwrap();
        let claims = issuer.validate(&token).unwrap();

        assert_eq!(claims.iss, "feather-test");
        assert_eq!(claims.sub, account.id.to_string());
        assert_eq!(claims.account_id().unwrap(), account.id);
        assert_eq!(claims.user.email.as_deref(), Some("a@b.com"));
        assert_eq!(claims.user.username, None);
        assert_eq!(claims.exp - claims.iat, 86400);
    }

    #[test]
    fn test_different_secret_is_invalid() {
        let token = TokenIssuer::new(test_config())
            .issue(&UserClaims::from(&test_account()))
            .unwrap();

        let other = TokenIssuer::new(JwtConfig {
            secret: "another-secret".to_string(),
            ..test_config()
        });
        assert_eq!(other.validate(&token).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn test_other_algorithm_is_rejected() {
        let config = test_config();
        let issuer = TokenIssuer::new(config.clone());
        let account = test_account();
        let claims = Claims {
            iss: config.issuer.clone(),
            sub: account.id.to_string(),
            user: UserClaims {
                id: account.id.to_string(),
                email: None,
                username: None,
            },
            iat: now(),
            exp: now() + 600,
        };

        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(issuer.validate(&token).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn test_wrong_issuer_is_invalid() {
        let token = TokenIssuer::new(JwtConfig {
            issuer: "someone-else".to_string(),
            ..test_config()
        })
        .issue(&UserClaims::from(&test_account()))
        .unwrap();

        let issuer = TokenIssuer::new(test_config());
        assert_eq!(issuer.validate(&token).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn test_expired_token() {
        let config = test_config();
        let issuer = TokenIssuer::new(config.clone());
        let id = Uuid::new_v4().to_string();
        // Well past the default 60 second leeway.
        let claims = Claims {
            iss: config.issuer.clone(),
            sub: id.clone(),
            user: UserClaims {
                id,
                email: None,
                username: Some("old".to_string()),
            },
            iat: now() - 7200,
            exp: now() - 3600,
        };

        let token = issuer.sign(&claims).unwrap();
        assert_eq!(issuer.validate(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn test_session_token_ignores_elapsed_expiry() {
        let config = test_config();
        let issuer = TokenIssuer::new(config.clone());
        let id = Uuid::new_v4().to_string();
        let claims = Claims {
            iss: config.issuer.clone(),
            sub: id.clone(),
            user: UserClaims {
                id: id.clone(),
                email: None,
                username: None,
            },
            iat: now() - 7200,
            exp: now() - 3600,
        };
        let token = issuer.sign(&claims).unwrap();

        assert_eq!(issuer.validate_session_token(&token).unwrap().sub, id);

        // Everything but `exp` is still enforced.
        let other = TokenIssuer::new(JwtConfig {
            secret: "another-secret".to_string(),
            ..config
        });
        assert_eq!(
            other.validate_session_token(&token).unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn test_overflowing_expiry_is_an_error() {
        let issuer = TokenIssuer::new(JwtConfig {
            access_token_expiry: u64::MAX,
            ..test_config()
        });

        let result = issuer.issue(&UserClaims::from(&test_account()));
        assert!(matches!(result, Err(TokenError::Signing(_))));
    }

    #[test]
    fn test_non_string_subject_is_malformed() {
        let config = test_config();
        let issuer = TokenIssuer::new(config.clone());
        let claims = serde_json::json!({
            "iss": config.issuer,
            "sub": 42,
            "user": { "id": 42 },
            "iat": now(),
            "exp": now() + 600,
        });

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(issuer.validate(&token).unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_missing_claims_are_malformed() {
        let config = test_config();
        let issuer = TokenIssuer::new(config.clone());
        let claims = serde_json::json!({
            "iss": config.issuer,
            "exp": now() + 600,
        });

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(issuer.validate(&token).unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_garbage_is_malformed() {
        let issuer = TokenIssuer::new(test_config());
        assert_eq!(
            issuer.validate("not-a-jwt").unwrap_err(),
            TokenError::Malformed
        );
    }

    #[test]
    fn test_non_uuid_subject_is_malformed() {
        let claims = Claims {
            iss: "x".to_string(),
            sub: "not-a-uuid".to_string(),
            user: UserClaims {
                id: "not-a-uuid".to_string(),
                email: None,
                username: None,
            },
            iat: 0,
            exp: 0,
        };
        assert_eq!(claims.account_id().unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_mismatched_identity_is_malformed() {
        let claims = Claims {
            iss: "x".to_string(),
            sub: Uuid::new_v4().to_string(),
            user: UserClaims {
                id: Uuid::new_v4().to_string(),
                email: None,
                username: None,
            },
            iat: 0,
            exp: 0,
        };
        assert_eq!(claims.account_id().unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_refresh_tokens_are_unique_and_sized() {
        let first = generate_refresh_token();
        let second = generate_refresh_token();

        assert_ne!(first, second);
        // 32 bytes in unpadded base64
        assert_eq!(first.len(), 43);
        assert_eq!(URL_SAFE_NO_PAD.decode(&first).unwrap().len(), 32);
    }
}
