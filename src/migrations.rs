//! Database migrations.
//!
//! SQLx embedded migrations for the provider's SQLite collections.

use sqlx::SqlitePool;

use crate::infra::Result;

static SQLITE_MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("migrations/sqlite");

pub async fn run(pool: &SqlitePool) -> Result<()> {
    SQLITE_MIGRATOR.run(pool).await?;
    Ok(())
}
