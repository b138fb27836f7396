//! Entrant identity upserts.

use super::models::{EntrantKey, EntrantProfile};
use anyhow::Result;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};

/// Bulk upsert entrants on `(realm_id, blizzard_id)` and return their surrogate ids.
///
/// Deduplicates by key before inserting; the first profile for a key wins.
pub async fn upsert_entrants(
    profiles: &[&EntrantProfile],
    db_pool: &PgPool,
) -> Result<HashMap<EntrantKey, i32>> {
    if profiles.is_empty() {
        return Ok(HashMap::new());
    }

    let mut seen = HashSet::new();
    let deduped: Vec<&EntrantProfile> = profiles
        .iter()
        .copied()
        .filter(|p| seen.insert(p.key()))
        .collect();

    let realm_ids: Vec<i32> = deduped.iter().map(|p| p.key().realm_id).collect();
    let blizzard_ids: Vec<i32> = deduped.iter().map(|p| p.key().blizzard_id).collect();
    let regions: Vec<&str> = deduped.iter().map(|p| p.region.as_str()).collect();
    let names: Vec<&str> = deduped.iter().map(|p| p.entrant.name.as_str()).collect();
    let paths: Vec<&str> = deduped.iter().map(|p| p.entrant.path.as_str()).collect();
    let class_ids: Vec<i32> = deduped.iter().map(|p| p.class_id).collect();
    let spec_ids: Vec<i32> = deduped.iter().map(|p| p.spec_id).collect();
    let faction_ids: Vec<i32> = deduped.iter().map(|p| p.faction_id).collect();
    let race_ids: Vec<i32> = deduped.iter().map(|p| p.race_id).collect();
    let genders: Vec<i16> = deduped.iter().map(|p| p.gender).collect();
    let guilds: Vec<Option<&str>> = deduped.iter().map(|p| p.guild.as_deref()).collect();
    let last_logins: Vec<_> = deduped.iter().map(|p| p.last_login).collect();
    let profile_ids: Vec<&str> = deduped.iter().map(|p| p.profile_id.as_str()).collect();

    let rows: Vec<(i32, i32, i32)> = sqlx::query_as(
        r#"
        INSERT INTO entrants (
            realm_id, blizzard_id, region, name, path,
            class_id, spec_id, faction_id, race_id, gender,
            guild, last_login, profile_id, updated_at
        )
        SELECT
            v.realm_id, v.blizzard_id, v.region, v.name, v.path,
            v.class_id, v.spec_id, v.faction_id, v.race_id, v.gender,
            v.guild, v.last_login, v.profile_id, NOW()
        FROM UNNEST(
            $1::int4[], $2::int4[], $3::text[], $4::text[], $5::text[],
            $6::int4[], $7::int4[], $8::int4[], $9::int4[], $10::int2[],
            $11::text[], $12::timestamptz[], $13::text[]
        ) AS v(
            realm_id, blizzard_id, region, name, path,
            class_id, spec_id, faction_id, race_id, gender,
            guild, last_login, profile_id
        )
        ON CONFLICT ON CONSTRAINT uq_entrant_identity
        DO UPDATE SET
            region = EXCLUDED.region,
            name = EXCLUDED.name,
            path = EXCLUDED.path,
            class_id = EXCLUDED.class_id,
            spec_id = EXCLUDED.spec_id,
            faction_id = EXCLUDED.faction_id,
            race_id = EXCLUDED.race_id,
            gender = EXCLUDED.gender,
            guild = EXCLUDED.guild,
            last_login = EXCLUDED.last_login,
            profile_id = EXCLUDED.profile_id,
            updated_at = EXCLUDED.updated_at
        RETURNING id, realm_id, blizzard_id
        "#,
    )
    .bind(&realm_ids)
    .bind(&blizzard_ids)
    .bind(&regions)
    .bind(&names)
    .bind(&paths)
    .bind(&class_ids)
    .bind(&spec_ids)
    .bind(&faction_ids)
    .bind(&race_ids)
    .bind(&genders)
    .bind(&guilds)
    .bind(&last_logins)
    .bind(&profile_ids)
    .fetch_all(db_pool)
    .await
    .map_err(|e| anyhow::anyhow!("Failed to batch upsert entrants: {}", e))?;

    Ok(rows
        .into_iter()
        .map(|(id, realm_id, blizzard_id)| (EntrantKey::new(realm_id, blizzard_id), id))
        .collect())
}

/// Resolve stored surrogate ids for the given keys; unknown keys are absent.
pub async fn lookup_ids(
    keys: &[EntrantKey],
    db_pool: &PgPool,
) -> Result<HashMap<EntrantKey, i32>> {
    if keys.is_empty() {
        return Ok(HashMap::new());
    }
    let realm_ids: Vec<i32> = keys.iter().map(|k| k.realm_id).collect();
    let blizzard_ids: Vec<i32> = keys.iter().map(|k| k.blizzard_id).collect();

    let rows: Vec<(i32, i32, i32)> = sqlx::query_as(
        r#"
        SELECT e.id, e.realm_id, e.blizzard_id
        FROM entrants e
        JOIN UNNEST($1::int4[], $2::int4[]) AS k(realm_id, blizzard_id)
          ON e.realm_id = k.realm_id AND e.blizzard_id = k.blizzard_id
        "#,
    )
    .bind(&realm_ids)
    .bind(&blizzard_ids)
    .fetch_all(db_pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, realm_id, blizzard_id)| (EntrantKey::new(realm_id, blizzard_id), id))
        .collect())
}
