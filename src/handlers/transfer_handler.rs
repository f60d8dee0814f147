//! Transfer Engine
//!
//! Moves value between two wallets atomically. All mutual exclusion is
//! delegated to the store's row locks; the engine holds no locks of its own
//! and never caches a balance outside a transaction.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{TransferError, Wallet};
use crate::store::{AccountStore, StoreError, StoreTransaction};

use super::TransferCommand;

/// Executes two-wallet transfers against an [`AccountStore`].
///
/// Protocol, inside one transaction:
/// 1. lock the wallet with the smaller address, then the larger one
/// 2. resolve sender and receiver
/// 3. check the sender covers the amount
/// 4. debit sender, credit receiver, commit
///
/// Locking in address order means two transfers over the same pair always
/// request locks in the same order, whichever way the value flows.
pub struct TransferEngine<S> {
    store: S,
}

impl<S: AccountStore> TransferEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Transfer `amount` from `from_address` to `to_address`.
    ///
    /// Returns the sender wallet with its new balance.
    pub async fn transfer(
        &self,
        from_address: &str,
        to_address: &str,
        amount: i64,
    ) -> Result<Wallet, TransferError> {
        let command = TransferCommand::new(from_address, to_address, amount);
        self.execute(command, &CancellationToken::new()).await
    }

    /// Execute a transfer, giving up with [`TransferError::Cancelled`] if no
    /// commit happened within `timeout`.
    pub async fn execute_with_timeout(
        &self,
        command: TransferCommand,
        timeout: Duration,
    ) -> Result<Wallet, TransferError> {
        let cancel = CancellationToken::new();
        let abort = Abort {
            cancel: &cancel,
            deadline: Some(Instant::now() + timeout),
        };
        self.run(command, abort).await
    }

    /// Execute a transfer command.
    ///
    /// `cancel` is honored before the transaction opens, while waiting for a
    /// connection and for each row lock, and right before commit. A
    /// cancelled transfer is rolled back.
    pub async fn execute(
        &self,
        command: TransferCommand,
        cancel: &CancellationToken,
    ) -> Result<Wallet, TransferError> {
        let abort = Abort {
            cancel,
            deadline: None,
        };
        self.run(command, abort).await
    }

    #[tracing::instrument(
        name = "transfer",
        skip(self, command, abort),
        fields(
            from = %command.from_address,
            to = %command.to_address,
            amount = command.amount,
        )
    )]
    async fn run(&self, command: TransferCommand, abort: Abort<'_>) -> Result<Wallet, TransferError> {
        if let Err(err) = validate(&command) {
            debug!(error = %err, "Transfer rejected");
            return Err(err);
        }
        if abort.is_set() {
            return Err(TransferError::Cancelled);
        }

        let mut tx = tokio::select! {
            biased;
            _ = abort.wait() => {
                debug!("Transfer cancelled while opening a transaction");
                return Err(TransferError::Cancelled);
            }
            tx = self.store.begin() => tx.map_err(store_failure)?,
        };

        let sender = match apply(&mut tx, &command, &abort).await {
            Ok(sender) => sender,
            Err(err) => {
                rollback(tx).await;
                log_failure(&err);
                return Err(err);
            }
        };

        if abort.is_set() {
            rollback(tx).await;
            debug!("Transfer cancelled before commit");
            return Err(TransferError::Cancelled);
        }

        tx.commit().await.map_err(store_failure)?;

        info!(
            sender_balance = sender.balance,
            sender_version = sender.version,
            "Transfer committed"
        );
        Ok(sender)
    }

    /// Non-locking read of the committed wallet at `address`.
    pub async fn wallet(&self, address: &str) -> Result<Option<Wallet>, StoreError> {
        self.store.find_by_address(address).await
    }
}

/// Caller cancellation plus an optional deadline
struct Abort<'a> {
    cancel: &'a CancellationToken,
    deadline: Option<Instant>,
}

impl Abort<'_> {
    fn is_set(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|at| Instant::now() >= at)
    }

    /// Resolves once the token is cancelled or the deadline passes.
    async fn wait(&self) {
        match self.deadline {
            Some(at) => tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = tokio::time::sleep_until(at) => {}
            },
            None => self.cancel.cancelled().await,
        }
    }
}

/// Input checks done before touching the store
fn validate(command: &TransferCommand) -> Result<(), TransferError> {
    if command.amount <= 0 {
        return Err(TransferError::InvalidAmount(command.amount));
    }
    if command.from_address == command.to_address {
        return Err(TransferError::SelfTransfer);
    }
    Ok(())
}

/// Lock both wallets in canonical order and stage the balance changes.
async fn apply<T: StoreTransaction>(
    tx: &mut T,
    command: &TransferCommand,
    abort: &Abort<'_>,
) -> Result<Wallet, TransferError> {
    let [first, second] = command.lock_order();
    let first = lock_wallet(tx, first, command, abort).await?;
    let second = lock_wallet(tx, second, command, abort).await?;

    let (sender, receiver) = if first.address == command.from_address {
        (first, second)
    } else {
        (second, first)
    };

    let amount = command.amount;
    if !sender.can_cover(amount) {
        return Err(TransferError::insufficient_balance(amount, sender.balance));
    }
    let credited = receiver
        .balance
        .checked_add(amount)
        .ok_or_else(|| TransferError::BalanceOverflow(receiver.address.clone()))?;

    let sender = tx.update_balance(&sender, sender.balance - amount).await?;
    tx.update_balance(&receiver, credited).await?;

    Ok(sender)
}

async fn lock_wallet<T: StoreTransaction>(
    tx: &mut T,
    address: &str,
    command: &TransferCommand,
    abort: &Abort<'_>,
) -> Result<Wallet, TransferError> {
    let locked = tokio::select! {
        biased;
        _ = abort.wait() => return Err(TransferError::Cancelled),
        locked = tx.lock_by_address(address) => locked?,
    };

    locked.ok_or_else(|| {
        if address == command.from_address {
            TransferError::SenderNotFound(address.to_string())
        } else {
            TransferError::ReceiverNotFound(address.to_string())
        }
    })
}

async fn rollback<T: StoreTransaction>(tx: T) {
    // The store discards an unfinished transaction on drop; surface the first error.
    if let Err(err) = tx.rollback().await {
        warn!(error = %err, "Rollback failed");
    }
}

fn store_failure(err: StoreError) -> TransferError {
    error!(error = %err, "Store failure during transfer");
    TransferError::Store(err)
}

fn log_failure(err: &TransferError) {
    match err {
        TransferError::Store(store_err) => error!(error = %store_err, "Transfer rolled back"),
        TransferError::Cancelled => debug!("Transfer cancelled while waiting for a lock"),
        other => debug!(error = %other, "Transfer rejected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryAccountStore, MemoryTransaction};
    use tokio_test::{assert_err, assert_ok};

    async fn engine_with(wallets: &[(&str, i64)]) -> TransferEngine<MemoryAccountStore> {
        let store = MemoryAccountStore::new();
        for (address, balance) in wallets {
            store
                .insert_if_absent(&Wallet::new(*address, *balance))
                .await
                .unwrap();
        }
        TransferEngine::new(store)
    }

    async fn balance(engine: &TransferEngine<MemoryAccountStore>, address: &str) -> i64 {
        engine.wallet(address).await.unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn test_transfer_successful() {
        let engine = engine_with(&[("0x1000", 10000), ("0xTEST1001", 0)]).await;

        let sender = assert_ok!(engine.transfer("0x1000", "0xTEST1001", 100).await);

        assert_eq!(sender.address, "0x1000");
        assert_eq!(sender.balance, 9900);
        assert_eq!(balance(&engine, "0x1000").await, 9900);
        assert_eq!(balance(&engine, "0xTEST1001").await, 100);
    }

    #[tokio::test]
    async fn test_transfer_returns_sender_when_sender_locks_second() {
        // "0xB" sorts after "0xA", so the sender is the second lock taken
        let engine = engine_with(&[("0xA", 0), ("0xB", 50)]).await;

        let sender = assert_ok!(engine.transfer("0xB", "0xA", 20).await);

        assert_eq!(sender.address, "0xB");
        assert_eq!(sender.balance, 30);
        assert_eq!(balance(&engine, "0xA").await, 20);
    }

    #[tokio::test]
    async fn test_transfer_bumps_both_versions() {
        let engine = engine_with(&[("0xA", 10), ("0xB", 0)]).await;

        let sender = engine.transfer("0xA", "0xB", 1).await.unwrap();

        assert_eq!(sender.version, 2);
        assert_eq!(engine.wallet("0xB").await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_invalid_amount() {
        let engine = engine_with(&[("0xA", 10), ("0xB", 0)]).await;

        for amount in [0, -1, i64::MIN] {
            let err = assert_err!(engine.transfer("0xA", "0xB", amount).await);
            assert!(matches!(err, TransferError::InvalidAmount(a) if a == amount));
        }
        assert_eq!(balance(&engine, "0xA").await, 10);
    }

    #[tokio::test]
    async fn test_self_transfer_rejected() {
        let engine = engine_with(&[("0xA", 10)]).await;

        let err = assert_err!(engine.transfer("0xA", "0xA", 5).await);

        assert!(matches!(err, TransferError::SelfTransfer));
        let wallet = engine.wallet("0xA").await.unwrap().unwrap();
        assert_eq!(wallet.balance, 10);
        assert_eq!(wallet.version, 1);
    }

    #[tokio::test]
    async fn test_sender_not_found() {
        let engine = engine_with(&[("0x1000", 10000)]).await;

        let err = assert_err!(engine.transfer("0xTEST1009", "0x1000", 1).await);

        assert!(matches!(err, TransferError::SenderNotFound(ref a) if a == "0xTEST1009"));
        assert_eq!(err.to_string(), "sender wallet not found: 0xTEST1009");
        assert_eq!(balance(&engine, "0x1000").await, 10000);
    }

    #[tokio::test]
    async fn test_receiver_not_found() {
        let engine = engine_with(&[("0x1000", 10000)]).await;

        let err = assert_err!(engine.transfer("0x1000", "0xTEST1009", 1).await);

        assert!(matches!(err, TransferError::ReceiverNotFound(ref a) if a == "0xTEST1009"));
        assert_eq!(balance(&engine, "0x1000").await, 10000);
    }

    #[tokio::test]
    async fn test_receiver_not_found_when_receiver_sorts_first() {
        let engine = engine_with(&[("0xZ", 100)]).await;

        let err = assert_err!(engine.transfer("0xZ", "0xA", 1).await);

        assert!(matches!(err, TransferError::ReceiverNotFound(_)));
        assert_eq!(balance(&engine, "0xZ").await, 100);
    }

    #[tokio::test]
    async fn test_insufficient_balance_leaves_both_unchanged() {
        let engine = engine_with(&[("0x1000", 10000), ("0xTEST1002", 0)]).await;
        let before = engine.store().snapshot().unwrap();

        let err = assert_err!(engine.transfer("0x1000", "0xTEST1002", 2_000_000).await);

        assert!(matches!(
            err,
            TransferError::InsufficientBalance {
                required: 2_000_000,
                available: 10000
            }
        ));
        assert_eq!(engine.store().snapshot().unwrap(), before);
    }

    #[tokio::test]
    async fn test_exact_balance_drains_to_zero() {
        let engine = engine_with(&[("0xA", 10), ("0xB", 0)]).await;

        let sender = assert_ok!(engine.transfer("0xA", "0xB", 10).await);

        assert_eq!(sender.balance, 0);
        assert_eq!(balance(&engine, "0xB").await, 10);
    }

    #[tokio::test]
    async fn test_receiver_overflow_rolls_back() {
        let engine = engine_with(&[("0xA", 10), ("0xB", i64::MAX)]).await;
        let before = engine.store().snapshot().unwrap();

        let err = assert_err!(engine.transfer("0xA", "0xB", 1).await);

        assert!(matches!(err, TransferError::BalanceOverflow(ref a) if a == "0xB"));
        assert_eq!(engine.store().snapshot().unwrap(), before);
    }

    #[tokio::test]
    async fn test_commit_failure_is_store_error_and_atomic() {
        let engine = engine_with(&[("0xA", 10), ("0xB", 0)]).await;
        let before = engine.store().snapshot().unwrap();
        engine.store().fail_commits(true);

        let err = assert_err!(engine.transfer("0xA", "0xB", 5).await);

        assert!(matches!(err, TransferError::Store(StoreError::CommitRejected(_))));
        assert!(err.is_retryable());
        assert_eq!(engine.store().snapshot().unwrap(), before);

        // Locks were released: the retry goes through once the store recovers.
        engine.store().fail_commits(false);
        assert_ok!(engine.transfer("0xA", "0xB", 5).await);
        assert_eq!(balance(&engine, "0xB").await, 5);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let engine = engine_with(&[("0xA", 10), ("0xB", 0)]).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = assert_err!(
            engine
                .execute(TransferCommand::new("0xA", "0xB", 1), &cancel)
                .await
        );

        assert!(matches!(err, TransferError::Cancelled));
        assert_eq!(balance(&engine, "0xA").await, 10);
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting_for_lock() {
        let engine = engine_with(&[("0xA", 10), ("0xB", 0)]).await;

        // Hold the receiver's row lock from another transaction
        let mut blocker = engine.store().begin().await.unwrap();
        blocker.lock_by_address("0xB").await.unwrap();

        let command = TransferCommand::new("0xA", "0xB", 1);
        let err = assert_err!(
            engine
                .execute_with_timeout(command, Duration::from_millis(50))
                .await
        );
        assert!(matches!(err, TransferError::Cancelled));

        blocker.rollback().await.unwrap();
        assert_eq!(balance(&engine, "0xA").await, 10);
        assert_eq!(balance(&engine, "0xB").await, 0);

        // The cancelled attempt released the sender lock
        assert_ok!(engine.transfer("0xA", "0xB", 1).await);
    }

    /// Store whose pool never hands out a connection
    struct StalledStore(MemoryAccountStore);

    #[async_trait::async_trait]
    impl AccountStore for StalledStore {
        type Transaction = MemoryTransaction;

        async fn begin(&self) -> Result<MemoryTransaction, StoreError> {
            std::future::pending().await
        }

        async fn find_by_address(&self, address: &str) -> Result<Option<Wallet>, StoreError> {
            self.0.find_by_address(address).await
        }

        async fn insert_if_absent(&self, wallet: &Wallet) -> Result<bool, StoreError> {
            self.0.insert_if_absent(wallet).await
        }
    }

    #[tokio::test]
    async fn test_deadline_applies_while_opening_transaction() {
        let engine = TransferEngine::new(StalledStore(MemoryAccountStore::new()));

        let command = TransferCommand::new("0xA", "0xB", 1);
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            engine.execute_with_timeout(command, Duration::from_millis(50)),
        )
        .await
        .expect("deadline must fire before a connection is available");

        assert!(matches!(result, Err(TransferError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_applies_while_opening_transaction() {
        let engine = TransferEngine::new(StalledStore(MemoryAccountStore::new()));
        let cancel = CancellationToken::new();

        let command = TransferCommand::new("0xA", "0xB", 1);
        let (result, _) = tokio::join!(engine.execute(command, &cancel), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        assert!(matches!(result, Err(TransferError::Cancelled)));
    }

    #[tokio::test]
    async fn test_timeout_not_reached() {
        let engine = engine_with(&[("0xA", 10), ("0xB", 0)]).await;

        let command = TransferCommand::new("0xA", "0xB", 3);
        let sender = assert_ok!(
            engine
                .execute_with_timeout(command, Duration::from_secs(5))
                .await
        );

        assert_eq!(sender.balance, 7);
    }
}
