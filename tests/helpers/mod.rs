use chrono::Utc;
use pvplb::blizzard::Region;
use pvplb::data::catalog::CatalogTable;
use pvplb::data::entrants::upsert_entrants;
use pvplb::data::models::{Entrant, EntrantKey, EntrantProfile, FACTION_HORDE, Identity};
use pvplb::data::stale;
use sqlx::PgPool;

pub const REALM: i32 = 3676;

/// Build a complete profile for a test entrant.
pub fn make_profile(blizzard_id: i32) -> EntrantProfile {
    let entrant = Entrant {
        key: EntrantKey::new(REALM, blizzard_id),
        name: format!("Entrant{blizzard_id}"),
        path: format!("area-52/entrant{blizzard_id}"),
    };
    let identity = Identity {
        class_id: 1,
        spec_id: 71,
        faction_id: FACTION_HORDE,
        race_id: 2,
        gender: 0,
    };
    EntrantProfile::new(entrant, Region::Us, identity, None, Utc::now())
        .expect("complete identity")
}

/// Insert entrants and return their ids in input order.
pub async fn insert_entrants(pool: &PgPool, blizzard_ids: &[i32]) -> Vec<i32> {
    let profiles: Vec<EntrantProfile> = blizzard_ids.iter().map(|id| make_profile(*id)).collect();
    let refs: Vec<&EntrantProfile> = profiles.iter().collect();
    let ids = upsert_entrants(&refs, pool)
        .await
        .expect("failed to insert test entrants");
    profiles.iter().map(|p| ids[&p.key()]).collect()
}

/// Seed a catalog table with `talent-{id}` names.
pub async fn seed_catalog(pool: &PgPool, table: CatalogTable, ids: &[i32]) {
    let rows: Vec<(i32, String)> = ids.iter().map(|id| (*id, format!("talent-{id}"))).collect();
    stale::reconcile(pool, table, &rows)
        .await
        .expect("failed to seed catalog");
}
