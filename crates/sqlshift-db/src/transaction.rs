//! Scoped transactions.
//!
//! [`with_transaction`] begins a transaction, hands it to a unit of work and
//! finishes it exactly once. The open transaction lives inside a
//! [`TransactionGuard`], so an early return or an unwinding panic still
//! rolls it back before control leaves the scope.

use sqlshift_common::{Error, Result};
use tracing::{debug, error, warn};

use crate::executor::{Database, Executor, IsolationLevel, Transaction};

/// Owns an open transaction and rolls it back on drop if it was never
/// finished.
pub struct TransactionGuard<T: Transaction> {
    tx: T,
}

impl<T: Transaction> TransactionGuard<T> {
    pub fn new(tx: T) -> Self {
        Self { tx }
    }

    pub fn transaction(&self) -> &T {
        &self.tx
    }

    /// Commit; on failure attempt a rollback and return the commit error
    /// joined with any rollback error.
    pub fn commit(mut self) -> Result<()> {
        match self.tx.commit() {
            Ok(()) => Ok(()),
            Err(commit_err) => Err(self.abort(commit_err)),
        }
    }

    /// Roll back because of `cause`, returning `cause` joined with any
    /// rollback error.
    pub fn rollback_with(mut self, cause: Error) -> Error {
        self.abort(cause)
    }

    fn abort(&mut self, cause: Error) -> Error {
        if !self.tx.is_active() {
            return cause;
        }
        match self.tx.rollback() {
            Ok(()) => {
                debug!("transaction rolled back after: {cause}");
                cause
            }
            Err(rollback_err) => Error::join(cause, rollback_err),
        }
    }
}

impl<T: Transaction> Drop for TransactionGuard<T> {
    fn drop(&mut self) {
        if self.tx.is_active() {
            warn!("transaction scope exited abnormally, rolling back");
            if let Err(e) = self.tx.rollback() {
                error!("rollback after abnormal exit failed: {e}");
            }
        }
    }
}

/// Run `work` inside one transaction on `db`, committing on `Ok` and
/// rolling back on `Err`. No transaction is left open when this returns
/// or unwinds.
pub fn with_transaction<D, T, F>(
    db: &mut D,
    isolation: Option<IsolationLevel>,
    work: F,
) -> Result<T>
where
    D: Database,
    F: FnOnce(&dyn Executor) -> Result<T>,
{
    let guard = TransactionGuard::new(db.begin(isolation)?);
    match work(guard.transaction()) {
        Ok(value) => guard.commit().map(|()| value),
        Err(e) => Err(guard.rollback_with(e)),
    }
}
