//! Command definitions
//!
//! Commands represent intentions to change the system state.

use serde::{Deserialize, Serialize};

use crate::domain::Wallet;

// =========================================================================
// TransferCommand
// =========================================================================

/// Command to move `amount` from one wallet to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCommand {
    pub from_address: String,
    pub to_address: String,
    pub amount: i64,
}

impl TransferCommand {
    pub fn new(from_address: impl Into<String>, to_address: impl Into<String>, amount: i64) -> Self {
        Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            amount,
        }
    }

    /// Addresses in canonical lock order: smaller first.
    ///
    /// Every transfer over the same pair locks in the same order whatever its
    /// direction. Meaningless for a self-transfer, which is rejected earlier.
    pub fn lock_order(&self) -> [&str; 2] {
        let (from, to) = (self.from_address.as_str(), self.to_address.as_str());
        if from < to {
            [from, to]
        } else {
            [to, from]
        }
    }
}

// =========================================================================
// InitializeWalletCommand
// =========================================================================

/// Command to create a wallet if its address is not taken yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeWalletCommand {
    pub address: String,
    pub balance: i64,
}

impl InitializeWalletCommand {
    pub fn new(address: impl Into<String>, balance: i64) -> Self {
        Self {
            address: address.into(),
            balance,
        }
    }
}

/// Result of a wallet initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeWalletResult {
    /// `false` when the address already existed and nothing changed
    pub created: bool,
    /// The wallet as currently stored
    pub wallet: Wallet,
}
