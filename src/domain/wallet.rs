//! Wallet entity
//!
//! A wallet is a balance-holding row keyed by a unique address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A wallet as stored in the account store.
///
/// # Invariants
/// - `balance >= 0` whenever observed outside a transfer
/// - `address` is unique and never changes after creation
/// - `version` starts at 1 and grows by one per balance update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub address: String,
    pub balance: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Build a freshly created wallet (version 1, new UUID).
    pub fn new(address: impl Into<String>, balance: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            address: address.into(),
            balance,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy of this wallet with `balance` applied and the version bumped.
    pub fn with_balance(&self, balance: i64) -> Self {
        Self {
            balance,
            version: self.version + 1,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Whether the wallet can cover a debit of `amount`.
    pub fn can_cover(&self, amount: i64) -> bool {
        self.balance >= amount
    }
}
