//! Account model and related functionality

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Account entity
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: Option<String>,
    pub username: Option<String>,
    /// Argon2id digest, never serialized
    #[serde(skip_serializing)]
    pub password_hash: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New account creation payload
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password_hash: Vec<u8>,
}
