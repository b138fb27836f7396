//! Commit of one region's enriched batch, entity type by entity type.
//!
//! Each step runs in its own transaction; a failing step is logged and the
//! remaining steps still run.

use super::equipment::EquipmentCache;
use crate::blizzard::Region;
use crate::data::DbContext;
use crate::data::models::{EnrichedEntrant, EntrantKey, EntrantProfile, RankedList};
use crate::data::relations::{EntrantRelations, RelationKind};
use crate::data::{entrants, equipment, leaderboards, stale, stats};
use std::collections::HashMap;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub entrants: usize,
    pub relations_asserted: u64,
    pub relations_swept: u64,
    pub stats: u64,
    pub loadouts: u64,
    pub equipment: u64,
    pub lists: usize,
}

/// Observed relation sets of one kind, keyed by entrant id.
///
/// Entrants whose set of this kind was not observed are absent, which keeps
/// their stored relations out of the mark and sweep scope.
pub fn observed_relations(
    enriched: &[EnrichedEntrant],
    ids: &HashMap<EntrantKey, i32>,
    kind: RelationKind,
) -> (Vec<i32>, Vec<(i32, i32)>) {
    let mut scope = Vec::new();
    let mut pairs = Vec::new();
    for record in enriched {
        let Some(&entrant_id) = ids.get(&record.profile.key()) else {
            continue;
        };
        let observed: Option<&[i32]> = match kind {
            RelationKind::Talent => record.talents.as_ref().map(|t| t.talents.as_slice()),
            RelationKind::PvpTalent => record.talents.as_ref().map(|t| t.pvp_talents.as_slice()),
            RelationKind::Achievement => record.achievements.as_deref(),
        };
        if let Some(observed) = observed {
            scope.push(entrant_id);
            pairs.extend(observed.iter().map(|id| (entrant_id, *id)));
        }
    }
    scope.sort_unstable();
    scope.dedup();
    (scope, pairs)
}

#[tracing::instrument(skip_all, fields(region = %region, entrants = enriched.len()))]
pub async fn commit_region(
    db: &DbContext,
    region: Region,
    enriched: &[EnrichedEntrant],
    cache: &EquipmentCache,
    lists: &[RankedList],
) -> CommitSummary {
    let mut summary = CommitSummary::default();

    let profiles: Vec<&EntrantProfile> = enriched.iter().map(|e| &e.profile).collect();
    let ids = match entrants::upsert_entrants(&profiles, db.pool()).await {
        Ok(ids) => ids,
        Err(e) => {
            error!(error = ?e, "Entrant upsert failed, per-entrant data not committed");
            HashMap::new()
        }
    };
    summary.entrants = ids.len();

    if !ids.is_empty() {
        for kind in RelationKind::ALL {
            let (scope, pairs) = observed_relations(enriched, &ids, kind);
            if scope.is_empty() {
                continue;
            }
            let scoped = scope.len();
            match stale::reconcile(db.pool(), EntrantRelations::new(kind, scope), &pairs).await {
                Ok(counts) => {
                    info!(%kind, entrants = scoped, asserted = counts.asserted, swept = counts.swept, "Reconciled relations");
                    summary.relations_asserted += counts.asserted;
                    summary.relations_swept += counts.swept;
                }
                Err(e) => error!(%kind, entrants = scoped, error = %e, "Relation reconciliation failed"),
            }
        }

        let stat_rows: Vec<(i32, _)> = with_ids(enriched, &ids, |e| e.stats);
        summary.stats = stats::upsert_stats(db.pool(), &stat_rows).await.unwrap_or(0);
    }

    summary.equipment = equipment::upsert_equipment(db, &cache.squash()).await.unwrap_or(0);

    if !ids.is_empty() {
        let loadouts: Vec<(i32, _)> = with_ids(enriched, &ids, |e| e.loadout.as_ref());
        summary.loadouts = equipment::upsert_loadouts(db.pool(), &loadouts)
            .await
            .unwrap_or(0);
    }

    summary.lists = commit_lists(db, region, lists).await;
    info!(?summary, "Region committed");
    summary
}

/// Pair each entrant's stored id with a projected sub-record, skipping
/// entrants without an id or without the sub-record.
fn with_ids<'a, T>(
    enriched: &'a [EnrichedEntrant],
    ids: &HashMap<EntrantKey, i32>,
    project: impl Fn(&'a EnrichedEntrant) -> Option<T>,
) -> Vec<(i32, T)> {
    let mut seen = std::collections::HashSet::new();
    enriched
        .iter()
        .filter_map(|e| {
            let id = *ids.get(&e.profile.key())?;
            let value = project(e)?;
            seen.insert(id).then_some((id, value))
        })
        .collect()
}

/// Replace each list's stored snapshot. Returns the number of lists written.
async fn commit_lists(db: &DbContext, region: Region, lists: &[RankedList]) -> usize {
    let mut keys: Vec<EntrantKey> = lists
        .iter()
        .flat_map(|l| l.entries.iter().map(|e| e.entrant.key))
        .collect();
    keys.sort_unstable();
    keys.dedup();

    let ids = match entrants::lookup_ids(&keys, db.pool()).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = ?e, "Entrant id lookup failed, ranked lists not committed");
            return 0;
        }
    };

    let mut written = 0;
    for list in lists {
        if leaderboards::replace_list(db.pool(), region, list, &ids).await.is_some() {
            written += 1;
        }
    }
    written
}
