//! In-memory user directory and session store
//!
//! Each store keeps its rows behind a single `tokio::sync::Mutex`, so every
//! operation, rotation included, is atomic with respect to the others. Used
//! by the tests and by embedders that do not need persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Rotation, SessionStore, StoreError, UniqueField, UserDirectory};
use crate::{
    jwt::generate_refresh_token,
    models::{Account, NewAccount, Session},
};

/// User directory held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryUserDirectory {
    accounts: Arc<Mutex<HashMap<Uuid, Account>>>,
}

impl MemoryUserDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub async fn len(&self) -> usize {
        self.accounts.lock().await.len()
    }

    /// Whether no account has been created yet
    pub async fn is_empty(&self) -> bool {
        self.accounts.lock().await.is_empty()
    }

    async fn find(&self, matches: impl Fn(&Account) -> bool) -> Option<Account> {
        self.accounts
            .lock()
            .await
            .values()
            .find(|account| matches(account))
            .cloned()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    async fn create_account(&self, new_account: NewAccount) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.lock().await;

        for existing in accounts.values() {
            if new_account.email.is_some() && existing.email == new_account.email {
                return Err(StoreError::Conflict(UniqueField::Email));
            }
            if new_account.username.is_some() && existing.username == new_account.username {
                return Err(StoreError::Conflict(UniqueField::Username));
            }
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: new_account.email,
            username: new_account.username,
            password_hash: new_account.password_hash,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(account.id, account.clone());

        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .find(|account| account.email.as_deref() == Some(email))
            .await)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .find(|account| account.username.as_deref() == Some(username))
            .await)
    }
}

/// Session store held in memory, keyed by account id
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session of an account
    pub async fn get(&self, account_id: Uuid) -> Option<Session> {
        self.sessions.lock().await.get(&account_id).cloned()
    }

    /// Number of stored sessions
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether no session has been saved yet
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(
        &self,
        account_id: Uuid,
        access_token: &str,
        refresh_token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let mut sessions = self.sessions.lock().await;

        let id = sessions
            .get(&account_id)
            .map(|existing| existing.id)
            .unwrap_or_else(Uuid::new_v4);

        sessions.insert(
            account_id,
            Session {
                id,
                account_id,
                access_token: access_token.to_owned(),
                refresh_token: refresh_token.to_owned(),
                expiry,
            },
        );

        Ok(id)
    }

    async fn rotate(&self, rotation: Rotation) -> Result<Session, StoreError> {
        let mut sessions = self.sessions.lock().await;

        let session = sessions
            .get_mut(&rotation.account_id)
            .filter(|session| {
                session.refresh_token == rotation.presented_refresh_token
                    && !session.is_expired_at(Utc::now())
            })
            .ok_or(StoreError::NotFound)?;

        session.access_token = rotation.access_token;
        session.refresh_token = generate_refresh_token();
        session.expiry = rotation.expiry;

        Ok(session.clone())
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<Session>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .await
            .values()
            .find(|session| session.refresh_token == refresh_token)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_account(email: Option<&str>, username: Option<&str>) -> NewAccount {
        NewAccount {
            email: email.map(str::to_owned),
            username: username.map(str::to_owned),
            password_hash: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_create_and_find_account() {
        let directory = MemoryUserDirectory::new();
        let account = directory
            .create_account(new_account(Some("a@b.com"), Some("alice")))
            .await
            .unwrap();

        assert!(directory.email_exists("a@b.com").await.unwrap());
        assert!(directory.username_exists("alice").await.unwrap());
        assert!(!directory.email_exists("x@b.com").await.unwrap());

        let by_email = directory.find_by_email("a@b.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, account.id);
        let by_username = directory.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_username.id, account.id);
        assert!(directory.find_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_identifiers_conflict() {
        let directory = MemoryUserDirectory::new();
        directory
            .create_account(new_account(Some("a@b.com"), Some("alice")))
            .await
            .unwrap();

        let email_clash = directory
            .create_account(new_account(Some("a@b.com"), None))
            .await
            .unwrap_err();
        assert!(matches!(email_clash, StoreError::Conflict(UniqueField::Email)));

        let username_clash = directory
            .create_account(new_account(None, Some("alice")))
            .await
            .unwrap_err();
        assert!(matches!(
            username_clash,
            StoreError::Conflict(UniqueField::Username)
        ));

        // Absent identifiers never clash with each other.
        directory
            .create_account(new_account(Some("c@d.com"), None))
            .await
            .unwrap();
        directory
            .create_account(new_account(Some("e@f.com"), None))
            .await
            .unwrap();
        assert_eq!(directory.len().await, 3);
    }

    #[tokio::test]
    async fn test_save_overwrites_session() {
        let store = MemorySessionStore::new();
        let account_id = Uuid::new_v4();
        let expiry = Utc::now() + Duration::hours(1);

        let first = store.save(account_id, "a1", "r1", expiry).await.unwrap();
        let second = store.save(account_id, "a2", "r2", expiry).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len().await, 1);
        assert!(store.find_by_refresh_token("r1").await.unwrap().is_none());
        let session = store.find_by_refresh_token("r2").await.unwrap().unwrap();
        assert_eq!(session.access_token, "a2");
    }

    #[tokio::test]
    async fn test_rotate_is_single_use() {
        let store = MemorySessionStore::new();
        let account_id = Uuid::new_v4();
        let expiry = Utc::now() + Duration::hours(1);
        store.save(account_id, "a1", "r1", expiry).await.unwrap();

        let rotation = Rotation {
            account_id,
            presented_refresh_token: "r1".to_string(),
            access_token: "a2".to_string(),
            expiry: expiry + Duration::hours(1),
        };

        let rotated = store.rotate(rotation.clone()).await.unwrap();
        assert_ne!(rotated.refresh_token, "r1");
        assert_eq!(rotated.access_token, "a2");
        assert_eq!(rotated.expiry, expiry + Duration::hours(1));

        let replay = store.rotate(rotation).await.unwrap_err();
        assert!(matches!(replay, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_rotate_rejects_expired_or_foreign_session() {
        let store = MemorySessionStore::new();
        let account_id = Uuid::new_v4();
        store
            .save(account_id, "a1", "r1", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        let expired = store
            .rotate(Rotation {
                account_id,
                presented_refresh_token: "r1".to_string(),
                access_token: "a2".to_string(),
                expiry: Utc::now() + Duration::hours(1),
            })
            .await;
        assert!(matches!(expired, Err(StoreError::NotFound)));

        let foreign = store
            .rotate(Rotation {
                account_id: Uuid::new_v4(),
                presented_refresh_token: "r1".to_string(),
                access_token: "a2".to_string(),
                expiry: Utc::now() + Duration::hours(1),
            })
            .await;
        assert!(matches!(foreign, Err(StoreError::NotFound)));
    }
}
