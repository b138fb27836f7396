//! Static catalog import: realms, races, classes, specs, talents, PvP talents
//! and PvP achievements.

use crate::blizzard::json::fetch_json;
use crate::blizzard::models::{
    AchievementCategory, ClassIndex, KeyedValue, PvpTalentIndex, RaceIndex, RealmIndex,
    SpecDetail, SpecIndex, TalentIndex,
};
use crate::blizzard::{Region, ResourceFetcher, ResourceRequest};
use crate::data::DbContext;
use crate::data::catalog::{self, CatalogTable, NamedTable, Realm, Spec};
use crate::data::stale;
use std::collections::HashSet;
use tracing::{info, warn};

/// Root of the "Player vs. Player" achievement category tree.
pub const PVP_ACHIEVEMENT_CATEGORY: i32 = 95;

pub struct CatalogImporter<'a> {
    pub db: &'a DbContext,
    pub fetcher: &'a dyn ResourceFetcher,
}

impl CatalogImporter<'_> {
    /// Import region-independent catalogs through `region`'s endpoints, then
    /// the realms of every region in `regions`.
    #[tracing::instrument(skip_all, fields(region = %region))]
    pub async fn import(&self, region: Region, regions: &[Region]) {
        self.import_named(region, "playable-race/index", NamedTable::Races, |p: RaceIndex| p.races)
            .await;
        self.import_named(region, "playable-class/index", NamedTable::Classes, |p: ClassIndex| {
            p.classes
        })
        .await;
        self.import_specs(region).await;

        let talents = self
            .fetch::<TalentIndex>(region, "talent/index")
            .await
            .map(|p| p.talents);
        self.reconcile_catalog(CatalogTable::Talents, talents).await;

        let pvp_talents = self
            .fetch::<PvpTalentIndex>(region, "pvp-talent/index")
            .await
            .map(|p| p.pvp_talents);
        self.reconcile_catalog(CatalogTable::PvpTalents, pvp_talents).await;

        let achievements = pvp_achievement_listing(self.fetcher, region).await;
        self.reconcile_catalog(CatalogTable::Achievements, achievements).await;

        for realm_region in regions {
            self.import_realms(*realm_region).await;
        }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, region: Region, path: &str) -> Option<T> {
        fetch_json(self.fetcher, &ResourceRequest::static_data(region, path)).await
    }

    async fn import_named<T, F>(&self, region: Region, path: &str, table: NamedTable, extract: F)
    where
        T: serde::de::DeserializeOwned,
        F: FnOnce(T) -> Vec<KeyedValue>,
    {
        let Some(payload) = self.fetch::<T>(region, path).await else {
            warn!(path, "Catalog unavailable");
            return;
        };
        let rows: Vec<(i32, String)> = extract(payload).into_iter().map(|k| (k.id, k.name)).collect();
        match catalog::upsert_named(self.db.pool(), table, &rows).await {
            Ok(count) => info!(?table, count, "Imported catalog"),
            Err(e) => warn!(?table, error = ?e, "Catalog import failed"),
        }
    }

    async fn import_specs(&self, region: Region) {
        let Some(index) = self.fetch::<SpecIndex>(region, "playable-specialization/index").await else {
            warn!("Specialization index unavailable");
            return;
        };

        let mut specs = Vec::with_capacity(index.character_specializations.len());
        for entry in &index.character_specializations {
            let path = format!("playable-specialization/{}", entry.id);
            let Some(detail) = self.fetch::<SpecDetail>(region, &path).await else {
                continue;
            };
            if detail.id == 0 || detail.playable_class.id == 0 {
                continue;
            }
            specs.push(Spec {
                id: detail.id,
                class_id: detail.playable_class.id,
                name: detail.name,
                role: detail.role.kind,
            });
        }

        match catalog::upsert_specs(self.db.pool(), &specs).await {
            Ok(count) => info!(count, "Imported specializations"),
            Err(e) => warn!(error = ?e, "Specialization import failed"),
        }
    }

    async fn import_realms(&self, region: Region) {
        let Some(index) = self.fetch::<RealmIndex>(region, "realm/index").await else {
            warn!(region = %region, "Realm index unavailable");
            return;
        };
        let realms: Vec<Realm> = index
            .realms
            .into_iter()
            .filter(|r| r.id != 0 && !r.slug.is_empty())
            .map(|r| Realm {
                id: r.id,
                slug: r.slug,
                name: r.name,
            })
            .collect();
        match catalog::upsert_realms(self.db.pool(), region, &realms).await {
            Ok(count) => info!(region = %region, count, "Imported realms"),
            Err(e) => warn!(region = %region, error = ?e, "Realm import failed"),
        }
    }

    /// Mark, assert and sweep one catalog. An absent or empty listing leaves
    /// the stored catalog alone.
    async fn reconcile_catalog(&self, table: CatalogTable, listing: Option<Vec<KeyedValue>>) {
        let rows: Vec<(i32, String)> = listing
            .unwrap_or_default()
            .into_iter()
            .map(|k| (k.id, k.name))
            .collect();
        if rows.is_empty() {
            warn!(?table, "Catalog listing empty, keeping stored rows");
            return;
        }

        match stale::reconcile(self.db.pool(), table, &rows).await {
            Ok(counts) => info!(
                ?table,
                asserted = counts.asserted,
                swept = counts.swept,
                "Reconciled catalog"
            ),
            Err(e) => warn!(?table, error = %e, "Catalog reconciliation failed"),
        }
    }
}

/// Walk the PvP category and its subcategories.
///
/// The listing is only complete if every category in the tree was read, so a
/// single failed fetch yields `None` and the stored catalog is left alone.
pub async fn pvp_achievement_listing(
    fetcher: &dyn ResourceFetcher,
    region: Region,
) -> Option<Vec<KeyedValue>> {
    let mut visited = HashSet::new();
    let mut pending = vec![PVP_ACHIEVEMENT_CATEGORY];
    let mut achievements = Vec::new();
    while let Some(id) = pending.pop() {
        if !visited.insert(id) {
            continue;
        }
        let request = ResourceRequest::static_data(region, format!("achievement-category/{id}"));
        let Some(category) = fetch_json::<AchievementCategory>(fetcher, &request).await else {
            warn!(category = id, "Achievement category unavailable, PvP achievement listing incomplete");
            return None;
        };
        pending.extend(category.subcategories.iter().map(|c| c.id));
        achievements.extend(category.achievements);
    }
    Some(achievements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blizzard::stub::StubFetcher;

    fn category(achievements: &[i32], subcategories: &[i32]) -> String {
        let keyed = |ids: &[i32]| -> Vec<serde_json::Value> {
            ids.iter()
                .map(|id| serde_json::json!({"id": id, "name": format!("n{id}")}))
                .collect()
        };
        serde_json::json!({
            "achievements": keyed(achievements),
            "subcategories": keyed(subcategories),
        })
        .to_string()
    }

    fn path(id: i32) -> String {
        format!("data/wow/achievement-category/{id}")
    }

    #[tokio::test]
    async fn walks_every_subcategory_once() {
        let fetcher = StubFetcher::new()
            .with(path(95), category(&[1], &[10, 11]))
            .with(path(10), category(&[2], &[11]))
            .with(path(11), category(&[3], &[95]));
        let listing = pvp_achievement_listing(&fetcher, Region::Us).await.unwrap();

        let mut ids: Vec<i32> = listing.iter().map(|k| k.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(fetcher.hits(&path(11)), 1);
        assert_eq!(fetcher.hits(&path(95)), 1);
    }

    #[tokio::test]
    async fn missing_subcategory_discards_listing() {
        let fetcher = StubFetcher::new()
            .with(path(95), category(&[1], &[10, 11]))
            .with(path(10), category(&[2], &[]));
        assert!(pvp_achievement_listing(&fetcher, Region::Us).await.is_none());
    }

    #[tokio::test]
    async fn missing_root_discards_listing() {
        assert!(
            pvp_achievement_listing(&StubFetcher::new(), Region::Us)
                .await
                .is_none()
        );
    }
}
