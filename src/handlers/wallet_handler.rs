//! Wallet Initializer
//!
//! Creates wallets. Initializing an address that already exists is a no-op.

use tracing::{debug, info};

use crate::domain::{Wallet, WalletError};
use crate::store::{AccountStore, StoreError};

use super::{InitializeWalletCommand, InitializeWalletResult};

/// Handler for wallet initialization
pub struct WalletInitializer<S> {
    store: S,
}

impl<S: AccountStore> WalletInitializer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create the wallet unless its address is taken.
    ///
    /// The existing wallet is returned untouched when the address exists.
    pub async fn execute(
        &self,
        command: InitializeWalletCommand,
    ) -> Result<InitializeWalletResult, WalletError> {
        if command.address.is_empty() {
            return Err(WalletError::EmptyAddress);
        }
        if command.balance < 0 {
            return Err(WalletError::NegativeBalance(command.balance));
        }

        let candidate = Wallet::new(command.address, command.balance);
        let created = self.store.insert_if_absent(&candidate).await?;

        let wallet = if created {
            info!(address = %candidate.address, balance = candidate.balance, "Wallet created");
            candidate
        } else {
            debug!(address = %candidate.address, "Wallet already exists, keeping balance");
            self.store
                .find_by_address(&candidate.address)
                .await?
                .ok_or_else(|| StoreError::RowMissing(candidate.address.clone()))?
        };

        Ok(InitializeWalletResult { created, wallet })
    }

    /// Shorthand for [`execute`](Self::execute)
    pub async fn initialize(&self, address: &str, balance: i64) -> Result<Wallet, WalletError> {
        let result = self
            .execute(InitializeWalletCommand::new(address, balance))
            .await?;
        Ok(result.wallet)
    }
}
