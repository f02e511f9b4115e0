//! Database transaction utilities

use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::time::Instant;

use bizdesk_core::AppError;
use sqlx::{PgPool, Postgres, Transaction};

/// A named transaction that logs how long it stayed open.
///
/// Dropping the guard without calling [`TransactionGuard::commit`] rolls the
/// transaction back when the connection returns to the pool.
///
/// ```ignore
/// let mut tx = TransactionGuard::begin(&pool, "entities.replace").await?;
/// sqlx::query("UPDATE entities SET ...").execute(&mut **tx).await?;
/// tx.commit().await?;
/// ```
pub struct TransactionGuard<'a> {
    transaction: Transaction<'a, Postgres>,
    operation: &'static str,
    started: Instant,
}

impl<'a> TransactionGuard<'a> {
    pub async fn begin(pool: &'a PgPool, operation: &'static str) -> Result<Self, AppError> {
        let transaction = pool.begin().await?;
        Ok(Self {
            transaction,
            operation,
            started: Instant::now(),
        })
    }

    pub async fn commit(self) -> Result<(), AppError> {
        let operation = self.operation;
        let elapsed = self.started.elapsed();
        self.transaction.commit().await?;
        tracing::trace!(
            operation,
            duration_ms = elapsed.as_secs_f64() * 1000.0,
            "Transaction committed"
        );
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), AppError> {
        let operation = self.operation;
        self.transaction.rollback().await?;
        tracing::debug!(operation, "Transaction rolled back");
        Ok(())
    }
}

impl<'a> Deref for TransactionGuard<'a> {
    type Target = Transaction<'a, Postgres>;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

impl<'a> DerefMut for TransactionGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.transaction
    }
}

/// Run `f` inside a transaction, committing on `Ok` and rolling back on `Err`.
pub async fn with_transaction<F, R>(pool: &PgPool, f: F) -> Result<R, AppError>
where
    F: for<'c> FnOnce(
        &'c mut Transaction<'_, Postgres>,
    ) -> Pin<Box<dyn Future<Output = Result<R, AppError>> + Send + 'c>>,
{
    let mut tx = pool.begin().await?;

    match f(&mut tx).await {
        Ok(result) => {
            tx.commit().await?;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}
