use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Asset, AssetOption};

pub async fn fetch_options(pool: &PgPool) -> Result<Vec<AssetOption>, sqlx::Error> {
    sqlx::query_as::<_, AssetOption>(
        r#"SELECT id, symbol, name FROM assets ORDER BY symbol COLLATE "C" ASC"#,
    )
    .fetch_all(pool)
    .await
}

pub async fn fetch_one(pool: &PgPool, id: Uuid) -> Result<Option<Asset>, sqlx::Error> {
    sqlx::query_as::<_, Asset>(
        "SELECT id, symbol, name, type, created_at FROM assets WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
