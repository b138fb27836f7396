//! Named timestamps describing the state of the imported data.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Key recording when the last successful import finished.
pub const LAST_IMPORT: &str = "last_import";

pub async fn get_timestamp(pool: &PgPool, key: &str) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar("SELECT last_update FROM metadata WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
}

pub async fn set_timestamp(pool: &PgPool, key: &str, ts: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO metadata (key, last_update)
        VALUES ($1, $2)
        ON CONFLICT (key)
        DO UPDATE SET last_update = EXCLUDED.last_update
        "#,
    )
    .bind(key)
    .bind(ts)
    .execute(pool)
    .await?;
    Ok(())
}
