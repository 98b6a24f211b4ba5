//! Transaction state of a session.
//!
//! Transactions are flat: one flag records whether a transaction is open,
//! and beginning a second one before the first ends is an error. With
//! autocommit enabled every call is a no-op and mutations need no
//! transaction.

use tracing::debug;

use crate::backends::StatementExecutor;
use crate::error::{OrmError, OrmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionState {
    autocommit: bool,
    open: bool,
}

impl TransactionState {
    pub fn new(autocommit: bool) -> Self {
        Self {
            autocommit,
            open: false,
        }
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn begin(&mut self, executor: &dyn StatementExecutor) -> OrmResult<()> {
        if self.autocommit {
            return Ok(());
        }
        if self.open {
            return Err(OrmError::Transaction(
                "a transaction is already open; nested transactions are not supported".into(),
            ));
        }
        executor.execute_batch("BEGIN")?;
        self.open = true;
        debug!("Transaction started");
        Ok(())
    }

    pub fn commit(&mut self, executor: &dyn StatementExecutor) -> OrmResult<()> {
        if self.autocommit {
            return Ok(());
        }
        if !self.open {
            return Err(OrmError::Transaction("no transaction to commit".into()));
        }
        executor.execute_batch("COMMIT")?;
        self.open = false;
        debug!("Transaction committed");
        Ok(())
    }

    pub fn rollback(&mut self, executor: &dyn StatementExecutor) -> OrmResult<()> {
        if self.autocommit {
            return Ok(());
        }
        if !self.open {
            return Err(OrmError::Transaction("no transaction to roll back".into()));
        }
        // Cleared before ROLLBACK so a failed rollback still ends it here
        self.open = false;
        executor.execute_batch("ROLLBACK")?;
        debug!("Transaction rolled back");
        Ok(())
    }

    /// Fails when a mutation would run outside a required transaction
    pub fn check_for_transaction(&self, operation: &str) -> OrmResult<()> {
        if self.autocommit || self.open {
            Ok(())
        } else {
            Err(OrmError::TransactionRequired(format!(
                "{} requires an open transaction when autocommit is disabled",
                operation
            )))
        }
    }

    /// Forget any open transaction without touching storage
    pub(crate) fn reset(&mut self) {
        self.open = false;
    }
}
