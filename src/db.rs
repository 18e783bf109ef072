use sea_orm::{Database, DatabaseConnection};

use crate::config::DatabaseSettings;
use crate::error::{SeedError, SeedResult};

/// Open a connection to the RBAC database.
///
/// The caller owns the returned connection and is expected to `close()` it.
pub async fn connect(settings: &DatabaseSettings) -> SeedResult<DatabaseConnection> {
    if settings.url.trim().is_empty() {
        return Err(SeedError::Configuration("database URL is empty".to_string()));
    }

    tracing::info!("Connecting to database...");
    let db = Database::connect(settings.url.as_str())
        .await
        .map_err(SeedError::Connection)?;
    tracing::info!("Database connected successfully");

    Ok(db)
}
