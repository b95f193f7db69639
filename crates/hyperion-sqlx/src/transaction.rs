use std::fmt;

use hyperion_core::db::{Executor, Row, SqlValue, Transaction, TransactionRef};
use hyperion_core::{Error, ErrorKind, Result, async_trait};
use sqlx::Postgres;
use tokio::sync::Mutex;

use crate::utils::{bind_params, db_error, to_row};

type PgTransaction = sqlx::Transaction<'static, Postgres>;

/// Transaction-backed [`Executor`].
///
/// Holds one driver-level transaction on a dedicated connection.
/// [`commit`] and [`rollback`] consume it; any call after completion
/// returns [`ErrorKind::Transaction`]. Beginning a nested driver
/// transaction from here is refused: nested unit-of-work scopes go
/// through [`with_transaction`], which detects this executor via
/// [`is_transactional`] and reuses the enclosing transaction flat.
///
/// [`commit`]: Transaction::commit
/// [`rollback`]: Transaction::rollback
/// [`is_transactional`]: Executor::is_transactional
/// [`with_transaction`]: hyperion_core::db::with_transaction
pub struct TxExecutor {
    tx: Mutex<Option<PgTransaction>>,
}

impl TxExecutor {
    pub(crate) fn new(tx: PgTransaction) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    fn completed() -> Error {
        Error::new(ErrorKind::Transaction, "transaction already completed")
    }
}

#[async_trait]
impl Executor for TxExecutor {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(Self::completed)?;
        let result = bind_params(sqlx::query(sql), params)
            .execute(&mut **tx)
            .await
            .map_err(|e| db_error("statement execution failed", e))?;
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(Self::completed)?;
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| db_error("query failed", e))?;
        Ok(rows.iter().map(to_row).collect())
    }

    async fn query_one(&self, sql: &str, params: &[SqlValue]) -> Result<Row> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(Self::completed)?;
        let row = bind_params(sqlx::query(sql), params)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| db_error("query returned no row", e))?;
        Ok(to_row(&row))
    }

    async fn begin(&self) -> Result<TransactionRef> {
        Err(Error::new(
            ErrorKind::Transaction,
            "transaction already open; nested scopes reuse the enclosing transaction",
        ))
    }

    fn is_transactional(&self) -> bool {
        true
    }
}

#[async_trait]
impl Transaction for TxExecutor {
    async fn commit(&self) -> Result<()> {
        let tx = self.tx.lock().await.take().ok_or_else(Self::completed)?;
        tx.commit()
            .await
            .map_err(|e| db_error("transaction commit failed", e))
    }

    async fn rollback(&self) -> Result<()> {
        let tx = self.tx.lock().await.take().ok_or_else(Self::completed)?;
        tx.rollback()
            .await
            .map_err(|e| db_error("transaction rollback failed", e))
    }
}

impl fmt::Debug for TxExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxExecutor").finish_non_exhaustive()
    }
}
