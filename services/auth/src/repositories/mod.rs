//! Storage seams of the authentication core
//!
//! [`UserDirectory`] and [`SessionStore`] are implemented against PostgreSQL
//! ([`PgUserDirectory`], [`PgSessionStore`]) and in memory
//! ([`memory::MemoryUserDirectory`], [`memory::MemorySessionStore`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Account, NewAccount, Session};

pub mod memory;
pub mod session;
pub mod user;

pub use session::PgSessionStore;
pub use user::PgUserDirectory;

/// Account field guarded by a unique constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

impl UniqueField {
    /// Caller-facing conflict message
    pub fn conflict_message(self) -> &'static str {
        match self {
            UniqueField::Email => "email address already exists",
            UniqueField::Username => "username already exists",
        }
    }
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique constraint rejected the write
    #[error("unique constraint violated on {0:?}")]
    Conflict(UniqueField),

    /// The row the operation is conditioned on does not exist
    #[error("no matching row")]
    NotFound,

    /// Anything the driver or the time budget reported
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        let err = DatabaseError::Query(e);
        match err.unique_violation() {
            Some(constraint) if constraint.contains("email") => {
                StoreError::Conflict(UniqueField::Email)
            }
            Some(constraint) if constraint.contains("username") => {
                StoreError::Conflict(UniqueField::Username)
            }
            _ => StoreError::Database(err),
        }
    }
}

/// Account lookups and creation
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Whether an account already uses `email`
    async fn email_exists(&self, email: &str) -> Result<bool, StoreError>;

    /// Whether an account already uses `username`
    async fn username_exists(&self, username: &str) -> Result<bool, StoreError>;

    /// Insert a new account in one transaction.
    ///
    /// Fails with [`StoreError::Conflict`] when the email or username was
    /// taken, including by a concurrent registration.
    async fn create_account(&self, new_account: NewAccount) -> Result<Account, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;
}

/// Replacement applied by [`SessionStore::rotate`]
#[derive(Debug, Clone)]
pub struct Rotation {
    pub account_id: Uuid,
    /// Refresh token the caller presented
    pub presented_refresh_token: String,
    pub access_token: String,
    pub expiry: DateTime<Utc>,
}

/// Persistence of the one live session per account
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create or overwrite the account's session, returning its id
    async fn save(
        &self,
        account_id: Uuid,
        access_token: &str,
        refresh_token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<Uuid, StoreError>;

    /// Swap in a fresh refresh token and the given access token.
    ///
    /// Applies only while the session still holds the presented refresh
    /// token and has not expired; otherwise fails with
    /// [`StoreError::NotFound`]. Of two rotations presenting the same token,
    /// at most one succeeds.
    async fn rotate(&self, rotation: Rotation) -> Result<Session, StoreError>;

    async fn find_by_refresh_token(&self, refresh_token: &str)
    -> Result<Option<Session>, StoreError>;
}
