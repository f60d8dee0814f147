//! Account Store module
//!
//! The contract the transfer engine consumes: transactional scope with
//! row-locking point lookups. The store exclusively owns wallet rows; the
//! engine never holds a balance outside a transaction.
//!
//! Two implementations are provided:
//! - [`PgAccountStore`]: PostgreSQL, `SELECT ... FOR UPDATE`
//! - [`MemoryAccountStore`]: embedded store with the same locking semantics

mod error;
mod memory;
mod postgres;

use async_trait::async_trait;

use crate::domain::Wallet;

pub use error::StoreError;
pub use memory::{MemoryAccountStore, MemoryTransaction};
pub use postgres::{PgAccountStore, PgStoreTransaction};

/// A durable store of wallets exposing transactions with row-level locking.
#[async_trait]
pub trait AccountStore: Send + Sync {
    type Transaction: StoreTransaction;

    /// Open a transaction. Dropping it without commit rolls it back.
    async fn begin(&self) -> Result<Self::Transaction, StoreError>;

    /// Non-locking point lookup by exact address.
    async fn find_by_address(&self, address: &str) -> Result<Option<Wallet>, StoreError>;

    /// Insert `wallet` unless its address already exists.
    ///
    /// Returns `true` when a row was created. An existing row is left
    /// untouched.
    async fn insert_if_absent(&self, wallet: &Wallet) -> Result<bool, StoreError>;
}

/// An open transaction against an [`AccountStore`].
///
/// Locks taken by [`lock_by_address`](Self::lock_by_address) are held until
/// [`commit`](Self::commit), [`rollback`](Self::rollback) or drop.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Locking point lookup. Blocks while another transaction holds the row.
    async fn lock_by_address(&mut self, address: &str) -> Result<Option<Wallet>, StoreError>;

    /// Write a new balance for a row locked by this transaction.
    ///
    /// Bumps the row version and returns the row as it will be committed.
    async fn update_balance(&mut self, wallet: &Wallet, balance: i64)
        -> Result<Wallet, StoreError>;

    /// Make every write of this transaction visible atomically.
    async fn commit(self) -> Result<(), StoreError>;

    /// Discard every write of this transaction and release its locks.
    async fn rollback(self) -> Result<(), StoreError>;
}
