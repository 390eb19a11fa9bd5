//! Scoped transactions
//!
//! Every write path runs its statements through [`with_transaction`]: a
//! transaction is opened, the closure runs against it, and the transaction is
//! committed only when the closure returns `Ok`. On `Err` it is rolled back
//! explicitly. When the future is dropped instead (timeout, caller went away,
//! panic) the `sqlx::Transaction` guard rolls back on drop, so partial writes
//! are never visible.

use std::{future::Future, pin::Pin, time::Duration};

use sqlx::{PgConnection, PgPool};
use tracing::{debug, warn};

use crate::error::DatabaseError;

/// Boxed future returned by a transaction body.
pub type TxFuture<'c, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>;

/// Run `body` inside a single transaction bounded by `timeout`.
///
/// The closure receives the transaction's connection and must take ownership
/// of everything it binds. Errors from `body` are returned unchanged after the
/// rollback; connection, commit and timeout failures are converted through
/// `From<DatabaseError>`.
pub async fn with_transaction<T, E, F>(
    pool: &PgPool,
    timeout: Duration,
    operation: &'static str,
    body: F,
) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c mut PgConnection) -> TxFuture<'c, T, E> + Send,
    T: Send,
    E: From<DatabaseError> + Send,
{
    let work = async move {
        let mut tx = pool.begin().await.map_err(DatabaseError::Connection)?;

        match body(&mut *tx).await {
            Ok(value) => {
                tx.commit().await.map_err(DatabaseError::Query)?;
                debug!(operation, "transaction committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(operation, error = %rollback_err, "transaction rollback failed");
                }
                Err(err)
            }
        }
    };

    run_with_timeout(timeout, operation, work).await
}

/// Bound a single unit of database work by `timeout`.
///
/// Used directly by read-only lookups that do not need a transaction.
pub async fn run_with_timeout<T, E, Fut>(
    timeout: Duration,
    operation: &'static str,
    work: Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: From<DatabaseError>,
{
    match tokio::time::timeout(timeout, work).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, ?timeout, "database operation timed out");
            Err(DatabaseError::Timeout { operation }.into())
        }
    }
}
