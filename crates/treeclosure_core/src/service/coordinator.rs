//! Transaction scoping for core operations.
//!
//! # Responsibility
//! - Begin one store transaction per operation and commit it once.
//! - Roll back on any error so no partial writes survive.
//! - Emit one metadata-only log line per operation outcome.
//!
//! # Invariants
//! - The operation closure never sees a committed or rolled-back handle.
//! - No retries: a failed operation is reported exactly once.

use crate::closure::error::{ClosureError, ClosureResult, ErrorKind};
use crate::repo::closure_repo::{StoreResult, StoreTransaction, TreeStore};
use log::{debug, error, warn};
use std::time::Instant;

/// Runs operations inside store transactions.
pub struct TransactionCoordinator<S: TreeStore> {
    store: S,
}

impl<S: TreeStore> TransactionCoordinator<S> {
    /// Creates coordinator over one store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Runs `op` in a fresh transaction.
    ///
    /// `ids` is a `key=value` fragment naming the identifiers involved; it is
    /// copied verbatim into log lines.
    ///
    /// # Errors
    /// - Returns the error of `op` after rolling back.
    /// - Returns store errors raised by begin or commit.
    pub fn run<T, F>(&self, operation: &'static str, ids: &str, op: F) -> ClosureResult<T>
    where
        F: FnOnce(&S::Tx) -> ClosureResult<T>,
    {
        let started_at = Instant::now();
        Self::finish(operation, ids, started_at, self.store.begin(), op)
    }

    /// Runs read-only `op` in a fresh read transaction.
    ///
    /// # Errors
    /// Same as [`TransactionCoordinator::run`].
    pub fn run_read<T, F>(&self, operation: &'static str, ids: &str, op: F) -> ClosureResult<T>
    where
        F: FnOnce(&S::Tx) -> ClosureResult<T>,
    {
        let started_at = Instant::now();
        Self::finish(operation, ids, started_at, self.store.begin_read(), op)
    }

    fn finish<T, F>(
        operation: &'static str,
        ids: &str,
        started_at: Instant,
        begun: StoreResult<S::Tx>,
        op: F,
    ) -> ClosureResult<T>
    where
        F: FnOnce(&S::Tx) -> ClosureResult<T>,
    {
        let tx = match begun {
            Ok(tx) => tx,
            Err(err) => {
                let err = ClosureError::from(err);
                log_failure(operation, ids, "tx_begin", &err, started_at);
                return Err(err);
            }
        };

        match op(&tx) {
            Ok(value) => {
                if let Err(err) = tx.commit() {
                    let err = ClosureError::from(err);
                    log_failure(operation, ids, "tx_commit", &err, started_at);
                    return Err(err);
                }
                debug!(
                    "event={} module=service status=ok {} duration_ms={}",
                    operation,
                    ids,
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    error!(
                        "event={} module=service status=error {} error_code=tx_rollback_failed error={}",
                        operation, ids, rollback_err
                    );
                }
                log_failure(operation, ids, "op_failed", &err, started_at);
                Err(err)
            }
        }
    }
}

fn log_failure(
    operation: &str,
    ids: &str,
    error_code: &str,
    err: &ClosureError,
    started_at: Instant,
) {
    let kind = err.kind();
    if kind == ErrorKind::Unexpected {
        error!(
            "event={} module=service status=error {} kind={} error_code={} duration_ms={} error={}",
            operation,
            ids,
            kind.as_str(),
            error_code,
            started_at.elapsed().as_millis(),
            err
        );
    } else {
        // Expected conditions: no error text, which may echo caller input.
        warn!(
            "event={} module=service status=rejected {} kind={} error_code={} duration_ms={}",
            operation,
            ids,
            kind.as_str(),
            error_code,
            started_at.elapsed().as_millis()
        );
    }
}
