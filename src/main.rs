//! walletLedger - bootstrap
//!
//! Connects to the database, makes sure the schema exists and initializes
//! the default wallet. Request dispatch lives elsewhere and calls into
//! `TransferEngine`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_ledger::handlers::InitializeWalletCommand;
use wallet_ledger::{db, AppError, Config, PgAccountStore, WalletInitializer};

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wallet_ledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::connect(&config).await?;

    db::ensure_schema(&pool).await?;
    if !db::check_schema(&pool).await? {
        return Err(AppError::Schema("wallets table missing".to_string()).into());
    }
    tracing::info!("Database connected successfully");

    let store = PgAccountStore::new(pool.clone());
    let initializer = WalletInitializer::new(store);
    let result = initializer
        .execute(InitializeWalletCommand::new(
            config.default_wallet_address.as_str(),
            config.default_wallet_balance,
        ))
        .await
        .map_err(AppError::from)?;

    tracing::info!(
        address = %result.wallet.address,
        balance = result.wallet.balance,
        created = result.created,
        "Default wallet initialized"
    );

    pool.close().await;
    Ok(())
}
