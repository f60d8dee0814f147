//! In-Memory Account Store
//!
//! Embedded store with the same transactional contract as PostgreSQL:
//! each row carries its own async lock, a locking read holds it until the
//! transaction ends, and writes are staged and applied only on commit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use crate::domain::Wallet;

use super::{AccountStore, StoreError, StoreTransaction};

struct Row {
    lock: Arc<RowLock<()>>,
    wallet: Wallet,
}

#[derive(Default)]
struct Inner {
    rows: Mutex<HashMap<String, Row>>,
    fail_commits: AtomicBool,
}

impl Inner {
    fn rows(&self) -> Result<MutexGuard<'_, HashMap<String, Row>>, StoreError> {
        self.rows.lock().map_err(|_| StoreError::Poisoned)
    }

    fn row_lock(&self, address: &str) -> Result<Option<Arc<RowLock<()>>>, StoreError> {
        Ok(self.rows()?.get(address).map(|row| Arc::clone(&row.lock)))
    }

    fn committed(&self, address: &str) -> Result<Option<Wallet>, StoreError> {
        Ok(self.rows()?.get(address).map(|row| row.wallet.clone()))
    }
}

/// Account store kept in process memory
#[derive(Clone, Default)]
pub struct MemoryAccountStore {
    inner: Arc<Inner>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent commit fail (fault injection).
    pub fn fail_commits(&self, fail: bool) {
        self.inner.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Committed state of every wallet, ordered by address.
    pub fn snapshot(&self) -> Result<Vec<Wallet>, StoreError> {
        let mut wallets: Vec<Wallet> = self
            .inner
            .rows()?
            .values()
            .map(|row| row.wallet.clone())
            .collect();
        wallets.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(wallets)
    }

    /// Sum of all committed balances.
    pub fn total_balance(&self) -> Result<i64, StoreError> {
        Ok(self.inner.rows()?.values().map(|row| row.wallet.balance).sum())
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, StoreError> {
        Ok(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            locks: HashMap::new(),
            staged: HashMap::new(),
        })
    }

    async fn find_by_address(&self, address: &str) -> Result<Option<Wallet>, StoreError> {
        self.inner.committed(address)
    }

    async fn insert_if_absent(&self, wallet: &Wallet) -> Result<bool, StoreError> {
        let mut rows = self.inner.rows()?;
        if rows.contains_key(&wallet.address) {
            return Ok(false);
        }
        rows.insert(
            wallet.address.clone(),
            Row {
                lock: Arc::new(RowLock::new(())),
                wallet: wallet.clone(),
            },
        );
        Ok(true)
    }
}

/// An open in-memory transaction.
///
/// Dropping it releases its row locks and discards staged writes.
pub struct MemoryTransaction {
    inner: Arc<Inner>,
    locks: HashMap<String, OwnedMutexGuard<()>>,
    staged: HashMap<String, Wallet>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_by_address(&mut self, address: &str) -> Result<Option<Wallet>, StoreError> {
        if let Some(wallet) = self.staged.get(address) {
            return Ok(Some(wallet.clone()));
        }
        if self.locks.contains_key(address) {
            return self.inner.committed(address);
        }

        let Some(lock) = self.inner.row_lock(address)? else {
            return Ok(None);
        };
        let guard = lock.lock_owned().await;
        // Read after acquiring so we see the last committed write.
        let wallet = self.inner.committed(address)?;
        self.locks.insert(address.to_string(), guard);

        Ok(wallet)
    }

    async fn update_balance(
        &mut self,
        wallet: &Wallet,
        balance: i64,
    ) -> Result<Wallet, StoreError> {
        let address = &wallet.address;
        if !self.locks.contains_key(address) {
            return Err(StoreError::RowNotLocked(address.clone()));
        }
        if balance < 0 {
            return Err(StoreError::ConstraintViolation {
                address: address.clone(),
                reason: format!("balance {balance} < 0"),
            });
        }

        let current = match self.staged.get(address) {
            Some(staged) => staged.clone(),
            None => self
                .inner
                .committed(address)?
                .ok_or_else(|| StoreError::RowMissing(address.clone()))?,
        };
        let updated = current.with_balance(balance);
        self.staged.insert(address.clone(), updated.clone());

        Ok(updated)
    }

    async fn commit(self) -> Result<(), StoreError> {
        if self.inner.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::CommitRejected(
                "commit failure injected".to_string(),
            ));
        }

        let mut rows = self.inner.rows()?;
        for (address, wallet) in self.staged {
            match rows.get_mut(&address) {
                Some(row) => row.wallet = wallet,
                None => return Err(StoreError::RowMissing(address)),
            }
        }
        // Row locks in `self.locks` are released only after the writes land.
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
