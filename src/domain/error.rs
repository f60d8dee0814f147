//! Domain Error Types
//!
//! Errors surfaced by the transfer engine and the wallet initializer.

use thiserror::Error;

use crate::store::StoreError;

/// Errors a single transfer attempt can end with.
///
/// Every variant is terminal for the attempt: the engine never retries on
/// its own. Whatever the variant, neither wallet was modified.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Amount is zero or negative
    #[error("Invalid amount: {0} (must be positive)")]
    InvalidAmount(i64),

    /// Sender and receiver are the same address
    #[error("Cannot transfer to the same wallet")]
    SelfTransfer,

    /// No wallet exists at the sender address
    #[error("sender wallet not found: {0}")]
    SenderNotFound(String),

    /// No wallet exists at the receiver address
    #[error("receiver wallet not found: {0}")]
    ReceiverNotFound(String),

    /// Sender balance does not cover the amount
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    /// Crediting the receiver would overflow its balance
    #[error("Balance overflow on wallet {0}")]
    BalanceOverflow(String),

    /// The caller cancelled the transfer or its deadline passed
    #[error("Transfer cancelled before commit")]
    Cancelled,

    /// The account store failed (open, lock, write or commit)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl TransferError {
    /// Create an insufficient balance error
    pub fn insufficient_balance(required: i64, available: i64) -> Self {
        Self::InsufficientBalance {
            required,
            available,
        }
    }

    /// Check if this is a client error (caller's fault, retrying is pointless)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::SelfTransfer
                | Self::SenderNotFound(_)
                | Self::ReceiverNotFound(_)
                | Self::InsufficientBalance { .. }
                | Self::BalanceOverflow(_)
        )
    }

    /// Check if the same transfer may succeed when retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Cancelled)
    }

    /// Stable machine-readable code for the dispatch layer
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "invalid_amount",
            Self::SelfTransfer => "self_transfer",
            Self::SenderNotFound(_) => "sender_not_found",
            Self::ReceiverNotFound(_) => "receiver_not_found",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::BalanceOverflow(_) => "balance_overflow",
            Self::Cancelled => "cancelled",
            Self::Store(_) => "store_error",
        }
    }
}

/// Errors from wallet initialization.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("address cannot be empty")]
    EmptyAddress,

    #[error("balance cannot be negative (got {0})")]
    NegativeBalance(i64),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_error() {
        let err = TransferError::insufficient_balance(100, 50);

        assert!(err.is_client_error());
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "insufficient_balance");
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_not_found_messages_match_wire_text() {
        let sender = TransferError::SenderNotFound("0x1".to_string());
        let receiver = TransferError::ReceiverNotFound("0x2".to_string());

        assert!(sender.to_string().starts_with("sender wallet not found"));
        assert!(receiver.to_string().starts_with("receiver wallet not found"));
    }

    #[test]
    fn test_store_error_is_retryable() {
        let err = TransferError::from(StoreError::CommitRejected("injected".to_string()));

        assert!(err.is_retryable());
        assert!(!err.is_client_error());
        assert_eq!(err.error_code(), "store_error");
    }

    #[test]
    fn test_cancelled_is_retryable() {
        assert!(TransferError::Cancelled.is_retryable());
        assert!(!TransferError::Cancelled.is_client_error());
    }
}
