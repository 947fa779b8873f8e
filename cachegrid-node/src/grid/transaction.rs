//! Transaction support for grid operations.

use uuid::Uuid;

use cachegrid_core::{CacheError, Result};

use super::Member;

/// The current state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction has not been started.
    NotStarted,
    /// Transaction is active and operations can be performed.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

/// A context scoping a sequence of grid mutations.
///
/// The grid applies mutations as they happen; the context tracks the
/// begin/commit/rollback lifecycle so callers that need compensation on
/// failure have a well-defined boundary to hang it on.
#[derive(Debug)]
pub struct TransactionContext {
    txn_id: Uuid,
    member: Member,
    state: TransactionState,
}

impl TransactionContext {
    pub(crate) fn new(member: Member) -> Self {
        Self {
            txn_id: Uuid::new_v4(),
            member,
            state: TransactionState::NotStarted,
        }
    }

    /// Returns the transaction id.
    pub fn txn_id(&self) -> Uuid {
        self.txn_id
    }

    /// Returns the current transaction state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns `true` if the transaction is active.
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Begins the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction has already been started.
    pub fn begin(&mut self) -> Result<()> {
        if self.state != TransactionState::NotStarted {
            return Err(CacheError::Transaction(
                "transaction has already been started".to_string(),
            ));
        }
        self.state = TransactionState::Active;
        tracing::debug!(txn = %self.txn_id, member = %self.member, "transaction started");
        Ok(())
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is not active.
    pub fn commit(&mut self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(CacheError::Transaction(
                "transaction is not active".to_string(),
            ));
        }
        self.state = TransactionState::Committed;
        tracing::debug!(txn = %self.txn_id, member = %self.member, "transaction committed");
        Ok(())
    }

    /// Rolls back the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is not active.
    pub fn rollback(&mut self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(CacheError::Transaction(
                "transaction is not active".to_string(),
            ));
        }
        self.state = TransactionState::RolledBack;
        tracing::debug!(txn = %self.txn_id, member = %self.member, "transaction rolled back");
        Ok(())
    }
}
