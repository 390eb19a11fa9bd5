//! PostgreSQL session store

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::transaction::{run_with_timeout, with_transaction};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use super::{Rotation, SessionStore, StoreError};
use crate::{jwt::generate_refresh_token, models::Session};

/// Session store backed by the `sessions` table
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgSessionStore {
    /// Create a new session store
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn save(
        &self,
        account_id: Uuid,
        access_token: &str,
        refresh_token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let access_token = access_token.to_owned();
        let refresh_token = refresh_token.to_owned();

        let session_id = with_transaction::<_, StoreError, _>(
            &self.pool,
            self.timeout,
            "save_session",
            move |conn| {
                Box::pin(async move {
                    let row = sqlx::query(
                        r#"
                        INSERT INTO sessions (id, account_id, access_token, refresh_token, expiry)
                        VALUES ($1, $2, $3, $4, $5)
                        ON CONFLICT (account_id) DO UPDATE
                        SET access_token = EXCLUDED.access_token,
                            refresh_token = EXCLUDED.refresh_token,
                            expiry = EXCLUDED.expiry
                        RETURNING id
                        "#,
                    )
                    .bind(Uuid::new_v4())
                    .bind(account_id)
                    .bind(access_token)
                    .bind(refresh_token)
                    .bind(expiry)
                    .fetch_one(conn)
                    .await?;
                    let id: Uuid = row.get("id");
                    Ok::<_, StoreError>(id)
                })
            },
        )
        .await?;

        info!("Session saved for account {}: {}", account_id, session_id);
        Ok(session_id)
    }

    async fn rotate(&self, rotation: Rotation) -> Result<Session, StoreError> {
        let Rotation {
            account_id,
            presented_refresh_token,
            access_token,
            expiry,
        } = rotation;
        let new_refresh_token = generate_refresh_token();

        // Lookup and replacement are one statement: a concurrent rotation
        // holding the row lock makes this one re-check the WHERE clause
        // against the already-replaced token and match nothing.
        let session = with_transaction::<_, StoreError, _>(
            &self.pool,
            self.timeout,
            "rotate_session",
            move |conn| {
                Box::pin(async move {
                    sqlx::query_as::<_, Session>(
                        r#"
                        UPDATE sessions
                        SET access_token = $1, refresh_token = $2, expiry = $3
                        WHERE account_id = $4 AND refresh_token = $5 AND expiry > now()
                        RETURNING id, account_id, access_token, refresh_token, expiry
                        "#,
                    )
                    .bind(access_token)
                    .bind(new_refresh_token)
                    .bind(expiry)
                    .bind(account_id)
                    .bind(presented_refresh_token)
                    .fetch_optional(conn)
                    .await?
                    .ok_or(StoreError::NotFound)
                })
            },
        )
        .await?;

        debug!("Session rotated for account {}", session.account_id);
        Ok(session)
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<Session>, StoreError> {
        run_with_timeout(self.timeout, "find_session_by_refresh_token", async {
            let session = sqlx::query_as::<_, Session>(
                r#"
                SELECT id, account_id, access_token, refresh_token, expiry
                FROM sessions
                WHERE refresh_token = $1
                "#,
            )
            .bind(refresh_token)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, StoreError>(session)
        })
        .await
    }
}
