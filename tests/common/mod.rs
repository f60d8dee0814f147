//! Common test utilities

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Schema creation runs once per test binary; parallel `CREATE TABLE IF NOT
/// EXISTS` on a fresh database can collide in `pg_type`.
static SCHEMA: OnceCell<()> = OnceCell::const_new();

/// Connect to the test database and make sure the schema exists.
///
/// Returns `None` when `DATABASE_URL` is unset so the suite can run without
/// a database.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    SCHEMA
        .get_or_try_init(|| wallet_ledger::db::ensure_schema(&pool))
        .await
        .expect("Failed to create wallets table");

    Some(pool)
}

/// Address no other test run will collide with
pub fn unique_address(label: &str) -> String {
    format!("0xTEST_{}_{}", label, Uuid::new_v4().simple())
}
