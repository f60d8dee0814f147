//! PostgreSQL Account Store
//!
//! Wallet rows live in the `wallets` table. Locking reads use
//! `SELECT ... FOR UPDATE`, so row locks are held by the database until the
//! transaction commits or rolls back.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::Wallet;

use super::{AccountStore, StoreError, StoreTransaction};

const WALLET_COLUMNS: &str = "id, address, balance, version, created_at, updated_at";

/// `SET LOCAL lock_timeout` for `timeout`, in whole milliseconds.
///
/// SET does not take bind parameters. Zero would disable the bound, so
/// anything under a millisecond rounds up to one.
fn lock_timeout_statement(timeout: Duration) -> String {
    format!("SET LOCAL lock_timeout = {}", timeout.as_millis().max(1))
}

/// Account store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgAccountStore {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PgAccountStore {
    /// Create a new store over a database pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Bound every row-lock wait with `SET LOCAL lock_timeout`.
    ///
    /// A wait that exceeds it fails the transfer with a store error
    /// (see [`StoreError::is_lock_timeout`]).
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    type Transaction = PgStoreTransaction;

    async fn begin(&self) -> Result<PgStoreTransaction, StoreError> {
        let mut tx = self.pool.begin().await?;

        if let Some(timeout) = self.lock_timeout {
            sqlx::query(&lock_timeout_statement(timeout))
                .execute(&mut *tx)
                .await?;
        }

        Ok(PgStoreTransaction { tx })
    }

    async fn find_by_address(&self, address: &str) -> Result<Option<Wallet>, StoreError> {
        let query = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE address = $1");
        let wallet = sqlx::query_as::<_, Wallet>(&query)
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;

        Ok(wallet)
    }

    async fn insert_if_absent(&self, wallet: &Wallet) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO wallets (id, address, balance, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (address) DO NOTHING
            "#,
        )
        .bind(wallet.id)
        .bind(&wallet.address)
        .bind(wallet.balance)
        .bind(wallet.version)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// An open PostgreSQL transaction.
///
/// sqlx rolls the transaction back when it is dropped uncommitted.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn lock_by_address(&mut self, address: &str) -> Result<Option<Wallet>, StoreError> {
        let query = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE address = $1 FOR UPDATE");
        let wallet = sqlx::query_as::<_, Wallet>(&query)
            .bind(address)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(wallet)
    }

    async fn update_balance(
        &mut self,
        wallet: &Wallet,
        balance: i64,
    ) -> Result<Wallet, StoreError> {
        let query = format!(
            r#"
            UPDATE wallets
            SET balance = $2, version = version + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING {WALLET_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, Wallet>(&query)
            .bind(wallet.id)
            .bind(balance)
            .fetch_optional(&mut *self.tx)
            .await?;

        updated.ok_or_else(|| StoreError::RowMissing(wallet.address.clone()))
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
