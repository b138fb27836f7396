//! Per-bracket leaderboard snapshots.

use super::batch::{describe_ids, execute_batch};
use super::models::{EntrantKey, RankedList};
use crate::blizzard::Region;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Replace the stored snapshot of one `(bracket, region)` list.
///
/// The delete and the insert share a transaction, so readers see either the
/// previous snapshot or the new one. Entries whose entrant has no stored id
/// (never enriched) are left out.
pub async fn replace_list(
    db_pool: &PgPool,
    region: Region,
    list: &RankedList,
    ids: &HashMap<EntrantKey, i32>,
) -> Option<u64> {
    let mut seen = HashSet::new();
    let rows: Vec<(i32, i32, i32, i32, i32)> = list
        .entries
        .iter()
        .filter_map(|e| {
            let id = *ids.get(&e.entrant.key)?;
            seen.insert(id).then_some((id, e.rank, e.rating, e.wins, e.losses))
        })
        .collect();

    let skipped = list.entries.len() - rows.len();
    if skipped > 0 {
        debug!(bracket = %list.bracket, region = %region, skipped, "Entries without stored entrant");
    }

    let entrant_ids: Vec<i32> = rows.iter().map(|r| r.0).collect();
    let ranks: Vec<i32> = rows.iter().map(|r| r.1).collect();
    let ratings: Vec<i32> = rows.iter().map(|r| r.2).collect();
    let wins: Vec<i32> = rows.iter().map(|r| r.3).collect();
    let losses: Vec<i32> = rows.iter().map(|r| r.4).collect();

    let before = sqlx::query("DELETE FROM leaderboard_entries WHERE bracket = $1 AND region = $2")
        .bind(list.bracket.as_str())
        .bind(region.as_str());

    let statement = sqlx::query(
        r#"
        INSERT INTO leaderboard_entries (
            bracket, region, ranking, entrant_id, rating, season_wins, season_losses, last_update
        )
        SELECT $1::text, $2::text, v.ranking, v.entrant_id, v.rating, v.wins, v.losses, NOW()
        FROM UNNEST($3::int4[], $4::int4[], $5::int4[], $6::int4[], $7::int4[])
            AS v(entrant_id, ranking, rating, wins, losses)
        "#,
    )
    .bind(list.bracket.as_str())
    .bind(region.as_str())
    .bind(&entrant_ids)
    .bind(&ranks)
    .bind(&ratings)
    .bind(&wins)
    .bind(&losses);

    let label = format!("leaderboard {} {}", list.bracket, region);
    execute_batch(
        db_pool,
        &label,
        &describe_ids(&entrant_ids),
        Some(before),
        statement,
    )
    .await
}

/// Stored `(ranking, entrant_id)` pairs of one list, best rank first.
pub async fn ranking(
    db_pool: &PgPool,
    bracket: &str,
    region: Region,
) -> Result<Vec<(i32, i32)>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT ranking, entrant_id
        FROM leaderboard_entries
        WHERE bracket = $1 AND region = $2
        ORDER BY ranking
        "#,
    )
    .bind(bracket)
    .bind(region.as_str())
    .fetch_all(db_pool)
    .await
}
