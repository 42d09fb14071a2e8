use sqlx::{MySqlPool, mysql::MySqlPoolOptions};
use tracing::info;

use crate::error::AppResult;

/// Connects and brings the schema up to date.
pub async fn init_db(database_url: &str) -> AppResult<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied");

    Ok(pool)
}
