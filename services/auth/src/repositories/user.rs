//! PostgreSQL user directory

use std::time::Duration;

use async_trait::async_trait;
use common::transaction::{run_with_timeout, with_transaction};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::{StoreError, UserDirectory};
use crate::models::{Account, NewAccount};

const ACCOUNT_COLUMNS: &str = "id, email, username, password_hash, created_at, updated_at";

/// User directory backed by the `accounts` table
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserDirectory {
    /// Create a new user directory
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn exists(&self, operation: &'static str, sql: &str, value: &str) -> Result<bool, StoreError> {
        run_with_timeout(self.timeout, operation, async {
            let row = sqlx::query(sql).bind(value).fetch_one(&self.pool).await?;
            let present: bool = row.get("present");
            Ok::<_, StoreError>(present)
        })
        .await
    }

    async fn find_one(
        &self,
        operation: &'static str,
        column: &str,
        value: &str,
    ) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {column} = $1");
        run_with_timeout(self.timeout, operation, async {
            let account = sqlx::query_as::<_, Account>(&sql)
                .bind(value)
                .fetch_optional(&self.pool)
                .await?;
            Ok::<_, StoreError>(account)
        })
        .await
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        self.exists(
            "email_exists",
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE email = $1) AS present",
            email,
        )
        .await
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        self.exists(
            "username_exists",
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = $1) AS present",
            username,
        )
        .await
    }

    async fn create_account(&self, new_account: NewAccount) -> Result<Account, StoreError> {
        let NewAccount {
            email,
            username,
            password_hash,
        } = new_account;
        let id = Uuid::new_v4();

        let account = with_transaction::<_, StoreError, _>(
            &self.pool,
            self.timeout,
            "create_account",
            move |conn| {
                Box::pin(async move {
                    let sql = format!(
                        "INSERT INTO accounts (id, email, username, password_hash) \
                         VALUES ($1, $2, $3, $4) \
                         RETURNING {ACCOUNT_COLUMNS}"
                    );
                    let account = sqlx::query_as::<_, Account>(&sql)
                        .bind(id)
                        .bind(email)
                        .bind(username)
                        .bind(password_hash)
                        .fetch_one(conn)
                        .await?;
                    Ok::<_, StoreError>(account)
                })
            },
        )
        .await?;

        info!("Account created: {}", account.id);
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.find_one("find_account_by_email", "email", email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        self.find_one("find_account_by_username", "username", username)
            .await
    }
}
