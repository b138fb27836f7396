use super::batch::{describe_ids, execute_batch};
use super::models::EntrantStats;
use sqlx::PgPool;

/// Upsert one stats row per entrant.
pub async fn upsert_stats(db_pool: &PgPool, rows: &[(i32, EntrantStats)]) -> Option<u64> {
    if rows.is_empty() {
        return Some(0);
    }

    let ids: Vec<i32> = rows.iter().map(|(id, _)| *id).collect();
    let column = |f: fn(&EntrantStats) -> i32| -> Vec<i32> { rows.iter().map(|(_, s)| f(s)).collect() };
    let strength = column(|s| s.strength);
    let agility = column(|s| s.agility);
    let intellect = column(|s| s.intellect);
    let stamina = column(|s| s.stamina);
    let critical_strike = column(|s| s.critical_strike);
    let haste = column(|s| s.haste);
    let versatility = column(|s| s.versatility);
    let mastery = column(|s| s.mastery);
    let leech = column(|s| s.leech);
    let dodge = column(|s| s.dodge);
    let parry = column(|s| s.parry);

    let statement = sqlx::query(
        r#"
        INSERT INTO entrant_stats (
            entrant_id, strength, agility, intellect, stamina, critical_strike,
            haste, versatility, mastery, leech, dodge, parry, updated_at
        )
        SELECT v.*, NOW()
        FROM UNNEST(
            $1::int4[], $2::int4[], $3::int4[], $4::int4[], $5::int4[], $6::int4[],
            $7::int4[], $8::int4[], $9::int4[], $10::int4[], $11::int4[], $12::int4[]
        ) AS v(
            entrant_id, strength, agility, intellect, stamina, critical_strike,
            haste, versatility, mastery, leech, dodge, parry
        )
        ON CONFLICT (entrant_id)
        DO UPDATE SET
            strength = EXCLUDED.strength,
            agility = EXCLUDED.agility,
            intellect = EXCLUDED.intellect,
            stamina = EXCLUDED.stamina,
            critical_strike = EXCLUDED.critical_strike,
            haste = EXCLUDED.haste,
            versatility = EXCLUDED.versatility,
            mastery = EXCLUDED.mastery,
            leech = EXCLUDED.leech,
            dodge = EXCLUDED.dodge,
            parry = EXCLUDED.parry,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(&ids)
    .bind(&strength)
    .bind(&agility)
    .bind(&intellect)
    .bind(&stamina)
    .bind(&critical_strike)
    .bind(&haste)
    .bind(&versatility)
    .bind(&mastery)
    .bind(&leech)
    .bind(&dodge)
    .bind(&parry);

    execute_batch(db_pool, "entrant_stats", &describe_ids(&ids), None, statement).await
}
