//! Cross-process voucher-number serialization with Postgres advisory locks.

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, Statement,
    TransactionTrait,
};
use tesoro_core::fiscal::{AllocationGuard, AllocationKey, AllocationLock};
use tesoro_shared::AppResult;
use tracing::{debug, warn};

use crate::error::db_err;

/// Takes `pg_advisory_xact_lock(key)` inside a transaction that lives as
/// long as the returned guard.
///
/// Pair it with `LayeredAllocationLock` so waiters in the same process queue
/// on a local mutex instead of each holding a pooled connection.
#[derive(Debug, Clone)]
pub struct PgAdvisoryLock {
    db: DatabaseConnection,
}

impl PgAdvisoryLock {
    /// Creates a lock over the pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AllocationLock for PgAdvisoryLock {
    async fn acquire(&self, key: AllocationKey) -> AppResult<AllocationGuard> {
        let advisory_key = key.advisory_key();
        let txn = self.db.begin().await.map_err(db_err)?;
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_xact_lock($1)",
            [advisory_key.into()],
        ))
        .await
        .map_err(db_err)?;
        debug!(
            agency_id = %key.agency_id,
            pto_vta = key.pto_vta,
            cbte_tipo = key.cbte_tipo.code(),
            advisory_key,
            "advisory lock taken"
        );
        Ok(AllocationGuard::new(AdvisoryHold { txn: Some(txn) }))
    }
}

/// Ends the lock transaction when dropped, which releases the lock.
struct AdvisoryHold {
    txn: Option<DatabaseTransaction>,
}

impl Drop for AdvisoryHold {
    fn drop(&mut self) {
        let Some(txn) = self.txn.take() else {
            return;
        };
        // Without a runtime the transaction's own drop rolls back.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = txn.rollback().await {
                    warn!(error = %e, "could not release advisory lock transaction");
                }
            });
        }
    }
}
