//! Shared equipment catalog and per-entrant loadouts.

use super::DbContext;
use super::batch::{describe_ids, execute_batch};
use super::models::{Equipment, Loadout};
use sqlx::PgPool;

/// Upsert the equipment catalog. Holds the equipment write lock for the
/// duration so concurrent region runs never interleave catalog batches.
///
/// The catalog is shared across regions and runs and is never swept.
pub async fn upsert_equipment(db: &DbContext, items: &[Equipment]) -> Option<u64> {
    let items: Vec<&Equipment> = items.iter().filter(|e| e.id != 0).collect();
    if items.is_empty() {
        return Some(0);
    }

    let ids: Vec<i32> = items.iter().map(|e| e.id).collect();
    let names: Vec<&str> = items.iter().map(|e| e.name.as_str()).collect();
    let qualities: Vec<&str> = items.iter().map(|e| e.quality.as_str()).collect();

    let statement = sqlx::query(
        r#"
        INSERT INTO equipment (id, name, quality, updated_at)
        SELECT v.id, v.name, v.quality, NOW()
        FROM UNNEST($1::int4[], $2::text[], $3::text[]) AS v(id, name, quality)
        ON CONFLICT (id)
        DO UPDATE SET
            name = EXCLUDED.name,
            quality = EXCLUDED.quality,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(&ids)
    .bind(&names)
    .bind(&qualities);

    let _guard = db.lock_equipment().await;
    execute_batch(db.pool(), "equipment", &describe_ids(&ids), None, statement).await
}

/// Replace each entrant's slot map.
pub async fn upsert_loadouts(db_pool: &PgPool, rows: &[(i32, &Loadout)]) -> Option<u64> {
    if rows.is_empty() {
        return Some(0);
    }

    let ids: Vec<i32> = rows.iter().map(|(id, _)| *id).collect();
    let mut slots = Vec::with_capacity(rows.len());
    for (id, loadout) in rows {
        match serde_json::to_value(loadout) {
            Ok(value) => slots.push(value),
            Err(e) => {
                tracing::error!(entrant_id = id, error = %e, "Failed to encode loadout");
                return None;
            }
        }
    }

    let statement = sqlx::query(
        r#"
        INSERT INTO entrant_equipment (entrant_id, slots, updated_at)
        SELECT v.entrant_id, v.slots, NOW()
        FROM UNNEST($1::int4[], $2::jsonb[]) AS v(entrant_id, slots)
        ON CONFLICT (entrant_id)
        DO UPDATE SET slots = EXCLUDED.slots, updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(&ids)
    .bind(&slots);

    execute_batch(db_pool, "entrant_equipment", &describe_ids(&ids), None, statement).await
}
