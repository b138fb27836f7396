//! Region import pipeline: aggregate ranked lists, fan enrichment out over
//! groups of entrants, join, then commit.

pub mod aggregator;
pub mod catalog;
pub mod enricher;
pub mod equipment;
pub mod reconcile;
pub mod splitter;

use crate::blizzard::{Region, ResourceFetcher};
use crate::data::models::{EnrichedEntrant, Entrant};
use crate::data::{DbContext, catalog as catalog_data, metadata};
use crate::utils::fmt_duration;
use aggregator::{Aggregator, current_season, discover_lists, unique_entrants};
use enricher::Enricher;
use equipment::EquipmentCache;
use reconcile::{CommitSummary, commit_region};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub group_size: usize,
    pub max_per_bracket: Option<usize>,
    pub stale_after: Duration,
}

/// Outcome of one region run.
#[derive(Debug, Clone, Default)]
pub struct RegionSummary {
    pub lists: usize,
    pub entrants_found: usize,
    pub entrants_enriched: usize,
    pub commit: CommitSummary,
}

pub struct Importer {
    db: DbContext,
    fetcher: Arc<dyn ResourceFetcher>,
    settings: ImportSettings,
}

impl Importer {
    pub fn new(db: DbContext, fetcher: Arc<dyn ResourceFetcher>, settings: ImportSettings) -> Self {
        Self {
            db,
            fetcher,
            settings,
        }
    }

    /// Refresh the static catalogs. Region-independent catalogs are read
    /// through the first region.
    pub async fn import_catalog(&self, regions: &[Region]) {
        let Some(&primary) = regions.first() else {
            return;
        };
        let importer = catalog::CatalogImporter {
            db: &self.db,
            fetcher: self.fetcher.as_ref(),
        };
        importer.import(primary, regions).await;
    }

    /// Run every region in turn and record the update time if anything was found.
    pub async fn run(&self, regions: &[Region]) -> Vec<(Region, RegionSummary)> {
        let mut summaries = Vec::with_capacity(regions.len());
        for &region in regions {
            let summary = self.run_region(region).await;
            summaries.push((region, summary));
        }

        let found: usize = summaries.iter().map(|(_, s)| s.entrants_found).sum();
        if found > 0 {
            if let Err(e) =
                metadata::set_timestamp(self.db.pool(), metadata::LAST_IMPORT, chrono::Utc::now()).await
            {
                warn!(error = ?e, "Failed to record update time");
            }
        } else {
            warn!("No entrants found in any region, update time not recorded");
        }
        summaries
    }

    #[tracing::instrument(skip_all, fields(region = %region))]
    pub async fn run_region(&self, region: Region) -> RegionSummary {
        let start = Instant::now();
        let mut summary = RegionSummary::default();
        let fetcher = self.fetcher.as_ref();

        let Some(season) = current_season(fetcher, region).await else {
            warn!("Current season unavailable, skipping region");
            return summary;
        };

        let realms = catalog_data::realm_slugs(self.db.pool(), region)
            .await
            .unwrap_or_else(|e| {
                warn!(error = ?e, "Realm slugs unavailable, using payload slugs");
                HashMap::new()
            });
        let spec_slugs = catalog_data::spec_slugs(self.db.pool())
            .await
            .unwrap_or_else(|e| {
                warn!(error = ?e, "Spec lookup unavailable, per-spec lists skipped");
                HashMap::new()
            });
        let pvp_achievements = match catalog_data::achievement_ids(self.db.pool()).await {
            Ok(ids) => Some(Arc::new(ids)),
            Err(e) => {
                warn!(error = ?e, "Achievement catalog unavailable, stored achievements left untouched");
                None
            }
        };

        let list_specs = discover_lists(fetcher, region, season, &spec_slugs).await;
        let aggregator = Aggregator {
            fetcher,
            region,
            season,
            max_per_list: self.settings.max_per_bracket,
            realms: &realms,
        };
        let lists = aggregator.fetch_lists(&list_specs).await;
        let entrants = unique_entrants(&lists);
        summary.lists = lists.len();
        summary.entrants_found = entrants.len();
        info!(season, lists = lists.len(), entrants = entrants.len(), "Aggregated ranked lists");

        if entrants.is_empty() {
            warn!("No entrants found, skipping region");
            return summary;
        }

        let cache = EquipmentCache::new();
        let enricher = Arc::new(Enricher::new(
            self.fetcher.clone(),
            region,
            self.settings.stale_after,
            cache.clone(),
            pvp_achievements,
        ));
        let enriched = enrich_all(enricher, splitter::split(entrants, self.settings.group_size)).await;
        summary.entrants_enriched = enriched.len();
        info!(
            enriched = enriched.len(),
            equipment = cache.len(),
            "Enrichment finished"
        );

        summary.commit = commit_region(&self.db, region, &enriched, &cache, &lists).await;
        info!(
            duration = fmt_duration(start.elapsed()),
            found = summary.entrants_found,
            enriched = summary.entrants_enriched,
            "Region finished"
        );
        summary
    }
}

/// Spawn one task per group and wait for all of them.
async fn enrich_all(
    enricher: Arc<Enricher>,
    groups: Vec<Vec<Entrant>>,
) -> Vec<EnrichedEntrant> {
    let group_count = groups.len();
    let mut tasks = JoinSet::new();
    for (index, group) in groups.into_iter().enumerate() {
        let enricher = enricher.clone();
        tasks.spawn(async move { enricher.enrich_group(index, group).await });
    }
    info!(groups = group_count, "Enrichment workers started");

    let mut enriched = Vec::new();
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(records) => enriched.extend(records),
            Err(e) => error!(error = %e, "Enrichment worker failed"),
        }
    }
    enriched
}
