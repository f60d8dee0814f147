//! Store Errors
//!
//! Error types for account store operations.

/// Errors that can occur in the account store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Update attempted on a row this transaction never locked
    #[error("Wallet {0} is not locked by this transaction")]
    RowNotLocked(String),

    /// Locked row vanished before it could be updated
    #[error("Wallet {0} disappeared while locked")]
    RowMissing(String),

    /// Write would break a table constraint (e.g. negative balance)
    #[error("Constraint violation on wallet {address}: {reason}")]
    ConstraintViolation { address: String, reason: String },

    /// Commit refused by the store; nothing was applied
    #[error("Commit rejected: {0}")]
    CommitRejected(String),

    /// In-process store state is unusable after a panic
    #[error("Store state poisoned")]
    Poisoned,
}

impl StoreError {
    /// Check if the store gave up waiting for a row lock
    /// (PostgreSQL `lock_not_available`, SQLSTATE 55P03)
    pub fn is_lock_timeout(&self) -> bool {
        self.sqlstate().as_deref() == Some("55P03")
    }

    /// Check if the store aborted the transaction as a deadlock victim
    /// (PostgreSQL `deadlock_detected`, SQLSTATE 40P01)
    pub fn is_deadlock(&self) -> bool {
        self.sqlstate().as_deref() == Some("40P01")
    }

    fn sqlstate(&self) -> Option<String> {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => {
                db.code().map(|code| code.into_owned())
            }
            _ => None,
        }
    }
}
