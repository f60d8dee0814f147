//! walletLedger Library
//!
//! Wallets holding integer balances and an engine that moves value between
//! two of them atomically, without deadlock, over a row-locking store.

pub mod domain;
pub mod handlers;
pub mod store;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use domain::{TransferError, Wallet, WalletError};
pub use handlers::{TransferCommand, TransferEngine, WalletInitializer};
pub use store::{AccountStore, MemoryAccountStore, PgAccountStore, StoreError, StoreTransaction};
