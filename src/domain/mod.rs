//! Domain module
//!
//! Core domain types: the wallet entity and the error taxonomy.

pub mod error;
pub mod wallet;

pub use error::{TransferError, WalletError};
pub use wallet::Wallet;
