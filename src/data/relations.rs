//! Entrant to catalog relation sets: talents, PvP talents and achievements.

use super::stale::StaleTarget;
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Talent,
    PvpTalent,
    Achievement,
}

impl RelationKind {
    pub const ALL: [RelationKind; 3] = [
        RelationKind::Talent,
        RelationKind::PvpTalent,
        RelationKind::Achievement,
    ];

    fn table(self) -> &'static str {
        match self {
            RelationKind::Talent => "entrant_talents",
            RelationKind::PvpTalent => "entrant_pvp_talents",
            RelationKind::Achievement => "entrant_achievements",
        }
    }

    fn column(self) -> &'static str {
        match self {
            RelationKind::Talent => "talent_id",
            RelationKind::PvpTalent => "pvp_talent_id",
            RelationKind::Achievement => "achievement_id",
        }
    }

    fn catalog(self) -> &'static str {
        match self {
            RelationKind::Talent => "talents",
            RelationKind::PvpTalent => "pvp_talents",
            RelationKind::Achievement => "achievements",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Relation rows of one kind, scoped to the entrants whose set was observed.
///
/// Entrants outside `entrants` keep their stored relations untouched.
#[derive(Debug, Clone)]
pub struct EntrantRelations {
    pub kind: RelationKind,
    pub entrants: Vec<i32>,
}

impl EntrantRelations {
    pub fn new(kind: RelationKind, entrants: Vec<i32>) -> Self {
        Self { kind, entrants }
    }
}

#[async_trait]
impl StaleTarget for EntrantRelations {
    /// `(entrant_id, catalog_id)`
    type Row = (i32, i32);

    fn label(&self) -> &'static str {
        self.kind.table()
    }

    async fn mark(&self, conn: &mut PgConnection) -> Result<u64, sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET stale = TRUE WHERE entrant_id = ANY($1)",
            self.kind.table()
        );
        let result = sqlx::query(&sql).bind(&self.entrants).execute(conn).await?;
        Ok(result.rows_affected())
    }

    /// Rows whose catalog id is unknown are skipped rather than failing the batch.
    async fn assert(&self, conn: &mut PgConnection, rows: &[(i32, i32)]) -> Result<u64, sqlx::Error> {
        // ON CONFLICT DO UPDATE cannot touch the same row twice in one statement.
        let unique: BTreeSet<(i32, i32)> = rows.iter().copied().collect();
        if unique.is_empty() {
            return Ok(0);
        }
        let (entrant_ids, catalog_ids): (Vec<i32>, Vec<i32>) = unique.into_iter().unzip();

        let (table, column, catalog) = (self.kind.table(), self.kind.column(), self.kind.catalog());
        let sql = format!(
            r#"
            INSERT INTO {table} (entrant_id, {column}, stale)
            SELECT v.entrant_id, v.catalog_id, FALSE
            FROM UNNEST($1::int4[], $2::int4[]) AS v(entrant_id, catalog_id)
            WHERE EXISTS (SELECT 1 FROM {catalog} c WHERE c.id = v.catalog_id)
            ON CONFLICT (entrant_id, {column})
            DO UPDATE SET stale = FALSE
            "#
        );
        let result = sqlx::query(&sql)
            .bind(&entrant_ids)
            .bind(&catalog_ids)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    async fn sweep(&self, pool: &PgPool) -> Result<u64, sqlx::Error> {
        let sql = format!(
            "DELETE FROM {} WHERE stale AND entrant_id = ANY($1)",
            self.kind.table()
        );
        let result = sqlx::query(&sql).bind(&self.entrants).execute(pool).await?;
        Ok(result.rows_affected())
    }
}

/// Stored catalog ids related to one entrant.
pub async fn related_ids(
    pool: &PgPool,
    kind: RelationKind,
    entrant_id: i32,
) -> Result<Vec<i32>, sqlx::Error> {
    let sql = format!(
        "SELECT {column} FROM {table} WHERE entrant_id = $1 ORDER BY {column}",
        column = kind.column(),
        table = kind.table()
    );
    sqlx::query_scalar(&sql).bind(entrant_id).fetch_all(pool).await
}
