//! Per-entrant writes and the region commit against a real database.

mod helpers;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use helpers::{REALM, insert_entrants, make_profile, seed_catalog};
use pvplb::blizzard::{Region, ResourceFetcher, ResourceRequest};
use pvplb::data::DbContext;
use pvplb::data::catalog::CatalogTable;
use pvplb::data::entrants::lookup_ids;
use pvplb::data::equipment::{upsert_equipment, upsert_loadouts};
use pvplb::data::metadata::{LAST_IMPORT, get_timestamp, set_timestamp};
use pvplb::data::models::{
    EnrichedEntrant, EntrantKey, EntrantStats, Equipment, Loadout, RankedEntry, RankedList,
    TalentSelections,
};
use pvplb::data::relations::{RelationKind, related_ids};
use pvplb::data::stats::upsert_stats;
use pvplb::pipeline::equipment::{EquipmentCache, ObservedItem};
use pvplb::pipeline::reconcile::commit_region;
use pvplb::pipeline::{ImportSettings, Importer};
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const A: i32 = 201;
const B: i32 = 202;
const C: i32 = 203;
const PVP_ACHIEVEMENT: i32 = 900;

/// Answers nothing, as if every resource were unavailable.
struct Unavailable;

#[async_trait]
impl ResourceFetcher for Unavailable {
    async fn fetch(&self, _request: &ResourceRequest) -> Option<String> {
        None
    }
}

fn stats(base: i32) -> EntrantStats {
    EntrantStats {
        strength: base,
        haste: base + 1,
        ..EntrantStats::default()
    }
}

fn loadout(slots: &[(&str, i32)]) -> Loadout {
    Loadout {
        slots: slots.iter().map(|(s, id)| (s.to_string(), *id)).collect::<BTreeMap<_, _>>(),
    }
}

fn enriched(blizzard_id: i32, talents: Vec<i32>, stats: EntrantStats) -> EnrichedEntrant {
    EnrichedEntrant {
        talents: Some(TalentSelections {
            talents,
            pvp_talents: vec![],
        }),
        stats: Some(stats),
        loadout: Some(loadout(&[("HEAD", 11)])),
        ..EnrichedEntrant::identity_only(make_profile(blizzard_id))
    }
}

fn list_of(blizzard_id: i32) -> RankedList {
    let profile = make_profile(blizzard_id);
    RankedList {
        bracket: "3v3".into(),
        entries: vec![RankedEntry {
            entrant: profile.entrant.clone(),
            rank: 1,
            rating: 2400,
            wins: 10,
            losses: 2,
        }],
    }
}

async fn stored_stats(pool: &PgPool, entrant_id: i32) -> Vec<(i32, i32)> {
    sqlx::query_as("SELECT strength, haste FROM entrant_stats WHERE entrant_id = $1")
        .bind(entrant_id)
        .fetch_all(pool)
        .await
        .expect("stats query failed")
}

#[sqlx::test]
async fn test_stats_upsert_replaces_row(pool: PgPool) {
    let e = insert_entrants(&pool, &[1]).await[0];

    assert_eq!(upsert_stats(&pool, &[(e, stats(10))]).await, Some(1));
    assert_eq!(upsert_stats(&pool, &[(e, stats(20))]).await, Some(1));

    assert_eq!(stored_stats(&pool, e).await, vec![(20, 21)]);
}

#[sqlx::test]
async fn test_loadout_upsert_replaces_slots(pool: PgPool) {
    let e = insert_entrants(&pool, &[1]).await[0];
    let first = loadout(&[("HEAD", 11), ("CHEST", 12)]);
    let second = loadout(&[("HEAD", 13)]);

    upsert_loadouts(&pool, &[(e, &first)]).await.expect("first loadout");
    upsert_loadouts(&pool, &[(e, &second)]).await.expect("second loadout");

    let rows: Vec<serde_json::Value> =
        sqlx::query_scalar("SELECT slots FROM entrant_equipment WHERE entrant_id = $1")
            .bind(e)
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(rows, vec![serde_json::json!({"HEAD": 13})]);
}

#[sqlx::test]
async fn test_squashed_cache_is_written_once_per_id(pool: PgPool) {
    let db = DbContext::new(pool.clone());
    let cache = EquipmentCache::new();
    let item = |id: i32, name: &str| ObservedItem {
        id,
        name: name.into(),
        quality: "EPIC".into(),
    };
    for observed in [item(11, "Helm"), item(12, "Chest"), item(11, "Other Helm"), item(0, "")] {
        cache.observe(observed, &Unavailable, Region::Us).await;
    }

    assert_eq!(upsert_equipment(&db, &cache.squash()).await, Some(2));

    let renamed = vec![Equipment {
        id: 11,
        name: "Renamed Helm".into(),
        quality: "EPIC".into(),
    }];
    upsert_equipment(&db, &renamed).await.expect("second write");

    let rows: Vec<(i32, String)> = sqlx::query_as("SELECT id, name FROM equipment ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(rows, vec![(11, "Renamed Helm".to_string()), (12, "Chest".to_string())]);
}

#[sqlx::test]
async fn test_commit_region_replaces_relations_across_runs(pool: PgPool) {
    seed_catalog(&pool, CatalogTable::Talents, &[A, B, C]).await;
    seed_catalog(&pool, CatalogTable::Achievements, &[PVP_ACHIEVEMENT]).await;
    let db = DbContext::new(pool.clone());
    let cache = EquipmentCache::new();

    let mut first = enriched(1, vec![A, B], stats(10));
    first.achievements = Some(vec![PVP_ACHIEVEMENT]);
    let summary = commit_region(&db, Region::Us, &[first], &cache, &[list_of(1)]).await;
    assert_eq!(summary.entrants, 1);
    assert_eq!(summary.lists, 1);

    let ids = lookup_ids(&[EntrantKey::new(REALM, 1)], &pool).await.unwrap();
    let e = ids[&EntrantKey::new(REALM, 1)];
    assert_eq!(related_ids(&pool, RelationKind::Talent, e).await.unwrap(), vec![A, B]);

    // Second run: talents change, achievements are not observed.
    let second = enriched(1, vec![A, C], stats(20));
    let summary = commit_region(&db, Region::Us, &[second], &cache, &[list_of(1)]).await;
    assert_eq!(summary.relations_swept, 1);

    assert_eq!(related_ids(&pool, RelationKind::Talent, e).await.unwrap(), vec![A, C]);
    assert_eq!(
        related_ids(&pool, RelationKind::Achievement, e).await.unwrap(),
        vec![PVP_ACHIEVEMENT]
    );
    assert_eq!(stored_stats(&pool, e).await, vec![(20, 21)]);
}

#[sqlx::test]
async fn test_update_time_round_trip(pool: PgPool) {
    assert_eq!(get_timestamp(&pool, LAST_IMPORT).await.unwrap(), None);

    let first = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let second = Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap();
    set_timestamp(&pool, LAST_IMPORT, first).await.unwrap();
    set_timestamp(&pool, LAST_IMPORT, second).await.unwrap();

    assert_eq!(get_timestamp(&pool, LAST_IMPORT).await.unwrap(), Some(second));
}

#[sqlx::test]
async fn test_empty_run_records_no_update_time(pool: PgPool) {
    let importer = Importer::new(
        DbContext::new(pool.clone()),
        Arc::new(Unavailable),
        ImportSettings {
            group_size: 10,
            max_per_bracket: None,
            stale_after: Duration::from_secs(3600),
        },
    );

    let summaries = importer.run(&[Region::Us]).await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].1.entrants_found, 0);
    assert_eq!(get_timestamp(&pool, LAST_IMPORT).await.unwrap(), None);
}
