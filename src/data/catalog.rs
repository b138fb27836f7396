//! Static catalog tables: realms, races, classes, specs, talents, PvP talents
//! and achievements.

use super::stale::StaleTarget;
use crate::blizzard::Region;
use crate::utils::slugify;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Realm {
    pub id: i32,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spec {
    pub id: i32,
    pub class_id: i32,
    pub name: String,
    pub role: String,
}

/// Upsert realms of one region.
pub async fn upsert_realms(db_pool: &PgPool, region: Region, realms: &[Realm]) -> Result<u64> {
    let mut seen = HashSet::new();
    let realms: Vec<&Realm> = realms.iter().filter(|r| seen.insert(r.id)).collect();
    if realms.is_empty() {
        return Ok(0);
    }
    let ids: Vec<i32> = realms.iter().map(|r| r.id).collect();
    let slugs: Vec<&str> = realms.iter().map(|r| r.slug.as_str()).collect();
    let names: Vec<&str> = realms.iter().map(|r| r.name.as_str()).collect();

    let result = sqlx::query(
        r#"
        INSERT INTO realms (id, slug, name, region)
        SELECT v.id, v.slug, v.name, $4::text
        FROM UNNEST($1::int4[], $2::text[], $3::text[]) AS v(id, slug, name)
        ON CONFLICT (id)
        DO UPDATE SET slug = EXCLUDED.slug, name = EXCLUDED.name, region = EXCLUDED.region
        "#,
    )
    .bind(&ids)
    .bind(&slugs)
    .bind(&names)
    .bind(region.as_str())
    .execute(db_pool)
    .await
    .map_err(|e| anyhow::anyhow!("Failed to upsert realms: {}", e))?;
    Ok(result.rows_affected())
}

/// Upsert an `(id, name)` table that is never swept (`races`, `classes`).
pub async fn upsert_named(db_pool: &PgPool, table: NamedTable, rows: &[(i32, String)]) -> Result<u64> {
    let rows = dedup_named(rows);
    if rows.is_empty() {
        return Ok(0);
    }
    let (ids, names): (Vec<i32>, Vec<String>) = rows.into_iter().unzip();
    let sql = format!(
        r#"
        INSERT INTO {table} (id, name)
        SELECT * FROM UNNEST($1::int4[], $2::text[])
        ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
        "#,
        table = table.as_str()
    );
    let result = sqlx::query(&sql)
        .bind(&ids)
        .bind(&names)
        .execute(db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to upsert {}: {}", table.as_str(), e))?;
    Ok(result.rows_affected())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedTable {
    Races,
    Classes,
}

impl NamedTable {
    fn as_str(self) -> &'static str {
        match self {
            NamedTable::Races => "races",
            NamedTable::Classes => "classes",
        }
    }
}

pub async fn upsert_specs(db_pool: &PgPool, specs: &[Spec]) -> Result<u64> {
    let mut seen = HashSet::new();
    let specs: Vec<&Spec> = specs.iter().filter(|s| seen.insert(s.id)).collect();
    if specs.is_empty() {
        return Ok(0);
    }
    let ids: Vec<i32> = specs.iter().map(|s| s.id).collect();
    let class_ids: Vec<i32> = specs.iter().map(|s| s.class_id).collect();
    let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
    let roles: Vec<&str> = specs.iter().map(|s| s.role.as_str()).collect();

    let result = sqlx::query(
        r#"
        INSERT INTO specs (id, class_id, name, role)
        SELECT * FROM UNNEST($1::int4[], $2::int4[], $3::text[], $4::text[])
        ON CONFLICT (id)
        DO UPDATE SET class_id = EXCLUDED.class_id, name = EXCLUDED.name, role = EXCLUDED.role
        "#,
    )
    .bind(&ids)
    .bind(&class_ids)
    .bind(&names)
    .bind(&roles)
    .execute(db_pool)
    .await
    .map_err(|e| anyhow::anyhow!("Failed to upsert specs: {}", e))?;
    Ok(result.rows_affected())
}

/// Catalogs that relations point into; reconciled with the stale-flag protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogTable {
    Talents,
    PvpTalents,
    Achievements,
}

impl CatalogTable {
    fn as_str(self) -> &'static str {
        match self {
            CatalogTable::Talents => "talents",
            CatalogTable::PvpTalents => "pvp_talents",
            CatalogTable::Achievements => "achievements",
        }
    }
}

#[async_trait]
impl StaleTarget for CatalogTable {
    /// `(id, name)`
    type Row = (i32, String);

    fn label(&self) -> &'static str {
        self.as_str()
    }

    async fn mark(&self, conn: &mut PgConnection) -> Result<u64, sqlx::Error> {
        let sql = format!("UPDATE {} SET stale = TRUE", self.as_str());
        Ok(sqlx::query(&sql).execute(conn).await?.rows_affected())
    }

    async fn assert(
        &self,
        conn: &mut PgConnection,
        rows: &[(i32, String)],
    ) -> Result<u64, sqlx::Error> {
        let rows = dedup_named(rows);
        if rows.is_empty() {
            return Ok(0);
        }
        let (ids, names): (Vec<i32>, Vec<String>) = rows.into_iter().unzip();
        let sql = format!(
            r#"
            INSERT INTO {table} (id, name, stale)
            SELECT v.id, v.name, FALSE
            FROM UNNEST($1::int4[], $2::text[]) AS v(id, name)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, stale = FALSE
            "#,
            table = self.as_str()
        );
        let result = sqlx::query(&sql)
            .bind(&ids)
            .bind(&names)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    async fn sweep(&self, pool: &PgPool) -> Result<u64, sqlx::Error> {
        let sql = format!("DELETE FROM {} WHERE stale", self.as_str());
        Ok(sqlx::query(&sql).execute(pool).await?.rows_affected())
    }
}

/// Last name wins per id; ids of zero are dropped.
fn dedup_named(rows: &[(i32, String)]) -> BTreeMap<i32, String> {
    rows.iter()
        .filter(|(id, _)| *id != 0)
        .map(|(id, name)| (*id, name.clone()))
        .collect()
}

/// Realm id to slug for one region.
pub async fn realm_slugs(db_pool: &PgPool, region: Region) -> Result<HashMap<i32, String>> {
    let rows: Vec<(i32, String)> = sqlx::query_as("SELECT id, slug FROM realms WHERE region = $1")
        .bind(region.as_str())
        .fetch_all(db_pool)
        .await?;
    Ok(rows.into_iter().collect())
}

/// `{class}-{spec}` slug (e.g. `deathknight-frost`) to spec id.
pub async fn spec_slugs(db_pool: &PgPool) -> Result<HashMap<String, i32>> {
    let rows: Vec<(i32, String, String)> = sqlx::query_as(
        r#"
        SELECT s.id, c.name, s.name
        FROM specs s
        JOIN classes c ON c.id = s.class_id
        "#,
    )
    .fetch_all(db_pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, class, spec)| (format!("{}-{}", slugify(&class), slugify(&spec)), id))
        .collect())
}

/// Ids of the achievements in the catalog.
pub async fn achievement_ids(db_pool: &PgPool) -> Result<HashSet<i32>> {
    let ids: Vec<i32> = sqlx::query_scalar("SELECT id FROM achievements")
        .fetch_all(db_pool)
        .await?;
    Ok(ids.into_iter().collect())
}
