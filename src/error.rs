//! Error handling module
//!
//! Application-wide error type wrapping each layer's errors.

use crate::config::ConfigError;
use crate::domain::{TransferError, WalletError};
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database schema is incomplete: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AppError {
    /// Stable machine-readable code for whatever layer dispatches requests
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Transfer(e) => e.error_code(),
            AppError::Wallet(WalletError::EmptyAddress) => "empty_address",
            AppError::Wallet(WalletError::NegativeBalance(_)) => "negative_balance",
            AppError::Wallet(WalletError::Store(_)) | AppError::Store(_) => "store_error",
            AppError::Database(_) => "database_error",
            AppError::Schema(_) => "schema_error",
            AppError::Config(_) => "config_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_code_passes_through() {
        let err = AppError::from(TransferError::SelfTransfer);

        assert_eq!(err.error_code(), "self_transfer");
        assert_eq!(err.to_string(), "Cannot transfer to the same wallet");
    }

    #[test]
    fn test_wallet_codes() {
        assert_eq!(
            AppError::from(WalletError::EmptyAddress).error_code(),
            "empty_address"
        );
        assert_eq!(
            AppError::from(WalletError::NegativeBalance(-1)).error_code(),
            "negative_balance"
        );
    }
}
