//! Register, login and refresh
//!
//! [`AuthService`] composes the password hasher, the token issuer and the two
//! stores. Each operation returns on its first failure and never retries.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::AuthError,
    jwt::{TokenError, TokenIssuer, UserClaims, generate_refresh_token, lifetime_from_env},
    models::{Account, CredentialsRequest, NewAccount, RefreshRequest, TokenBundle},
    password::PasswordHasher,
    repositories::{Rotation, SessionStore, StoreError, UniqueField, UserDirectory},
    validation::{validate_email, validate_password, validate_username},
};

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session lifetime in seconds, reported as `expires_in` (default: 1 hour)
    pub expiry: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { expiry: 3600 }
    }
}

impl SessionConfig {
    /// Create a new SessionConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SESSION_EXPIRY`: Session lifetime in seconds (default: 3600, at most
    ///   [`crate::jwt::MAX_LIFETIME_SECS`])
    pub fn from_env() -> Result<Self> {
        let expiry = lifetime_from_env("SESSION_EXPIRY", 3600)?;

        Ok(SessionConfig { expiry })
    }
}

/// Authentication orchestrator
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    tokens: TokenIssuer,
    hasher: PasswordHasher,
    config: SessionConfig,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        tokens: TokenIssuer,
        hasher: PasswordHasher,
        config: SessionConfig,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens,
            hasher,
            config,
        }
    }

    /// Create an account and open its first session
    pub async fn register(&self, request: CredentialsRequest) -> Result<TokenBundle, AuthError> {
        let email = request.email().map(str::to_owned);
        let username = request.username().map(str::to_owned);

        if email.is_none() && username.is_none() {
            return Err(AuthError::Validation(
                "need at least a username or an email address".to_string(),
            ));
        }
        if let Some(email) = &email {
            validate_email(email).map_err(AuthError::Validation)?;
        }
        if let Some(username) = &username {
            validate_username(username).map_err(AuthError::Validation)?;
        }
        validate_password(&request.password).map_err(AuthError::Validation)?;

        if let Some(email) = &email {
            let taken = self
                .users
                .email_exists(email)
                .await
                .map_err(|e| store_failure("email_exists", None, e))?;
            if taken {
                return Err(AuthError::Conflict(
                    UniqueField::Email.conflict_message().to_string(),
                ));
            }
        }
        if let Some(username) = &username {
            let taken = self
                .users
                .username_exists(username)
                .await
                .map_err(|e| store_failure("username_exists", None, e))?;
            if taken {
                return Err(AuthError::Conflict(
                    UniqueField::Username.conflict_message().to_string(),
                ));
            }
        }

        let password_hash = self.hash_password(request.password).await?;

        let account = self
            .users
            .create_account(NewAccount {
                email,
                username,
                password_hash,
            })
            .await
            .map_err(|e| store_failure("create_account", None, e))?;

        info!("Registered account {}", account.id);
        self.open_session(&account).await
    }

    /// Verify credentials and replace the account's session
    pub async fn login(&self, request: CredentialsRequest) -> Result<TokenBundle, AuthError> {
        let lookup = match (request.email(), request.username()) {
            (Some(email), _) => self.users.find_by_email(email).await,
            (None, Some(username)) => self.users.find_by_username(username).await,
            (None, None) => {
                return Err(AuthError::Validation(
                    "need at least a username or an email address".to_string(),
                ));
            }
        };
        let account = lookup.map_err(|e| store_failure("find_account", None, e))?;

        let password = request.password;
        let Some(account) = account else {
            self.verify_password(password, None).await?;
            info!("Login failed: unknown account");
            return Err(AuthError::NotFound);
        };

        if !self
            .verify_password(password, Some(account.password_hash.clone()))
            .await?
        {
            info!("Login failed: bad password for account {}", account.id);
            return Err(AuthError::InvalidCredentials);
        }

        info!("Login succeeded for account {}", account.id);
        self.open_session(&account).await
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// The presented refresh token is single-use: it is replaced atomically,
    /// and a concurrent or later attempt with the same token fails with
    /// [`AuthError::SessionNotFound`].
    pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenBundle, AuthError> {
        let presented = request.refresh_token.trim();
        if presented.is_empty() {
            return Err(AuthError::Validation("refresh token is required".to_string()));
        }

        let session = self
            .sessions
            .find_by_refresh_token(presented)
            .await
            .map_err(|e| store_failure("find_session_by_refresh_token", None, e))?
            .ok_or(AuthError::SessionNotFound)?;

        if session.is_expired_at(Utc::now()) {
            info!("Refresh rejected: session of account {} expired", session.account_id);
            return Err(AuthError::SessionNotFound);
        }

        let claims = self
            .tokens
            .validate_session_token(&session.access_token)
            .map_err(|e| {
                warn!("Session token of account {} failed validation: {}", session.account_id, e);
                AuthError::Token(e)
            })?;
        let account_id = claims.account_id()?;
        if account_id != session.account_id {
            warn!(
                "Session of account {} carries a token for {}",
                session.account_id, account_id
            );
            return Err(AuthError::Token(TokenError::Invalid));
        }

        let access_token = self.tokens.issue(&claims.user)?;
        let expiry = self.session_expiry()?;
        let rotated = self
            .sessions
            .rotate(Rotation {
                account_id,
                presented_refresh_token: presented.to_owned(),
                access_token,
                expiry,
            })
            .await
            .map_err(|e| match e {
                StoreError::NotFound => {
                    info!("Refresh lost a race or replayed a token for account {}", account_id);
                    AuthError::SessionNotFound
                }
                other => store_failure("rotate_session", Some(account_id), other),
            })?;

        Ok(TokenBundle::bearer(
            rotated.access_token,
            rotated.refresh_token,
            self.config.expiry,
        ))
    }

    async fn open_session(&self, account: &Account) -> Result<TokenBundle, AuthError> {
        let access_token = self.tokens.issue(&UserClaims::from(account))?;
        let refresh_token = generate_refresh_token();
        let expiry = self.session_expiry()?;

        self.sessions
            .save(
                account.id,
                &access_token,
                &refresh_token,
                expiry,
            )
            .await
            .map_err(|e| store_failure("save_session", Some(account.id), e))?;

        Ok(TokenBundle::bearer(
            access_token,
            refresh_token,
            self.config.expiry,
        ))
    }

    fn session_expiry(&self) -> Result<chrono::DateTime<Utc>, AuthError> {
        i64::try_from(self.config.expiry)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                error!("Session expiry of {}s is out of range", self.config.expiry);
                AuthError::Internal("session expiry out of range".to_string())
            })
    }

    async fn hash_password(&self, password: String) -> Result<Vec<u8>, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("password hashing task failed: {}", e)))?
            .map_err(|e| {
                error!("Password hashing failed: {}", e);
                AuthError::Password(e)
            })
    }

    /// `None` runs a dummy derivation so unknown accounts take as long.
    async fn verify_password(
        &self,
        password: String,
        digest: Option<Vec<u8>>,
    ) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || match digest {
            Some(digest) => hasher.verify(&password, &digest),
            None => {
                hasher.verify_dummy(&password);
                false
            }
        })
        .await
        .map_err(|e| AuthError::Internal(format!("password verification task failed: {}", e)))
    }
}

/// Convert a store error, logging anything that is not a caller mistake
fn store_failure(operation: &'static str, account_id: Option<Uuid>, err: StoreError) -> AuthError {
    match err {
        StoreError::Conflict(field) => AuthError::Conflict(field.conflict_message().to_string()),
        StoreError::NotFound => {
            error!(operation, ?account_id, "unexpected missing row");
            AuthError::Internal(format!("{} found no row", operation))
        }
        StoreError::Database(e) => {
            error!(operation, ?account_id, error = %e, "storage failure");
            AuthError::Database(e)
        }
    }
}
