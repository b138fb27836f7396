//! Per-entrant profile enrichment.
//!
//! Every sub-resource is optional. An entrant is dropped only when its
//! identity is missing or incomplete, or when it has not logged in recently.

use super::equipment::{EquipmentCache, ObservedItem};
use crate::blizzard::json::fetch_json;
use crate::blizzard::models::{
    AchievementsPayload, EquipmentPayload, ProfileSummary, SpecializationsPayload,
    StatisticsPayload,
};
use crate::blizzard::{Region, ResourceFetcher, ResourceRequest};
use crate::data::models::{
    EnrichedEntrant, Entrant, EntrantProfile, EntrantStats, FACTION_ALLIANCE, FACTION_HORDE,
    Identity, Loadout, TalentSelections,
};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Enricher {
    fetcher: Arc<dyn ResourceFetcher>,
    region: Region,
    stale_after: Duration,
    equipment: EquipmentCache,
    /// Catalog of PvP achievement ids; completed ones outside it are ignored.
    /// `None` when the catalog could not be read, in which case achievements
    /// are not observed at all.
    pvp_achievements: Option<Arc<HashSet<i32>>>,
}

impl Enricher {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        region: Region,
        stale_after: Duration,
        equipment: EquipmentCache,
        pvp_achievements: Option<Arc<HashSet<i32>>>,
    ) -> Self {
        Self {
            fetcher,
            region,
            stale_after,
            equipment,
            pvp_achievements,
        }
    }

    /// Enrich one group sequentially. Entrants that cannot be enriched are left out.
    #[tracing::instrument(skip_all, fields(region = %self.region, group = index, size = group.len()))]
    pub async fn enrich_group(&self, index: usize, group: Vec<Entrant>) -> Vec<EnrichedEntrant> {
        let now = Utc::now();
        let total = group.len();
        let mut enriched = Vec::with_capacity(total);
        for entrant in group {
            if let Some(record) = self.enrich(entrant, now).await {
                enriched.push(record);
            }
        }
        info!(enriched = enriched.len(), dropped = total - enriched.len(), "Group finished");
        enriched
    }

    pub async fn enrich(&self, entrant: Entrant, now: DateTime<Utc>) -> Option<EnrichedEntrant> {
        let Some(summary) = self.fetch::<ProfileSummary>(&entrant.path).await else {
            warn!(path = %entrant.path, "Profile summary unavailable, skipping entrant");
            return None;
        };
        let path = entrant.path.clone();
        let Some(mut profile) = profile_from_summary(entrant, self.region, &summary) else {
            warn!(path, "Incomplete identity, skipping entrant");
            return None;
        };

        if is_stale(profile.last_login, now, self.stale_after) {
            debug!(path, last_login = %profile.last_login, "Not logged in recently, skipping entrant");
            return None;
        }

        if let Some(fingerprint) = self.fingerprint(&path).await {
            profile.profile_id = fingerprint;
        }

        let Some(talents) = self
            .fetch::<SpecializationsPayload>(&format!("{path}/specializations"))
            .await
            .map(|payload| select_talents(&payload))
            .filter(|t| !t.is_empty())
        else {
            debug!(path, "No talents, keeping identity only");
            return Some(EnrichedEntrant::identity_only(profile));
        };

        let stats = self
            .fetch::<StatisticsPayload>(&format!("{path}/statistics"))
            .await
            .map(|payload| reduce_stats(&payload));
        let achievements = match &self.pvp_achievements {
            Some(catalog) => self
                .fetch::<AchievementsPayload>(&format!("{path}/achievements"))
                .await
                .map(|payload| completed_achievements(&payload, catalog)),
            None => None,
        };
        let loadout = self.loadout(&path).await;

        Some(EnrichedEntrant {
            profile,
            talents: Some(talents),
            stats,
            achievements,
            loadout,
        })
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, path: &str) -> Option<T> {
        fetch_json(self.fetcher.as_ref(), &ResourceRequest::profile(self.region, path)).await
    }

    async fn fingerprint(&self, path: &str) -> Option<String> {
        let request = ResourceRequest::profile(self.region, format!("{path}/collections/pets"));
        let body = self.fetcher.fetch(&request).await?;
        pet_fingerprint(&body)
    }

    /// Slot map of the equipped items; every item is offered to the shared cache.
    async fn loadout(&self, path: &str) -> Option<Loadout> {
        let payload: EquipmentPayload = self.fetch(&format!("{path}/equipment")).await?;
        let mut loadout = Loadout::default();
        for item in payload.equipped_items.iter().filter(|i| !i.name.is_empty()) {
            loadout.slots.insert(item.slot.kind.clone(), item.item.id);
            self.equipment
                .observe(ObservedItem::from_payload(item), self.fetcher.as_ref(), self.region)
                .await;
        }
        Some(loadout)
    }
}

/// Map a profile summary onto a validated identity.
pub fn profile_from_summary(
    entrant: Entrant,
    region: Region,
    summary: &ProfileSummary,
) -> Option<EntrantProfile> {
    let identity = Identity {
        class_id: summary.character_class.id,
        spec_id: summary.active_spec.id,
        faction_id: match summary.faction.kind.as_str() {
            "HORDE" => FACTION_HORDE,
            "ALLIANCE" => FACTION_ALLIANCE,
            _ => 0,
        },
        race_id: summary.race.id,
        gender: i16::from(summary.gender.kind == "FEMALE"),
    };
    let guild = summary
        .guild
        .as_ref()
        .map(|g| g.name.clone())
        .filter(|name| !name.is_empty());
    let last_login = DateTime::from_timestamp_millis(summary.last_login_timestamp)?;
    EntrantProfile::new(entrant, region, identity, guild, last_login)
}

pub fn is_stale(last_login: DateTime<Utc>, now: DateTime<Utc>, stale_after: Duration) -> bool {
    match (now - last_login).to_std() {
        Ok(elapsed) => elapsed > stale_after,
        // Login in the future, e.g. clock skew.
        Err(_) => false,
    }
}

/// SHA-256 of the pet collection, which is shared account-wide.
///
/// Hashes from the `"pets":` key to the end of the body. Returns `None` when
/// the body lists no pets.
pub fn pet_fingerprint(body: &str) -> Option<String> {
    let start = body.find("\"pets\":")?;
    if !body.contains("species") {
        return None;
    }
    Some(hex::encode(Sha256::digest(&body.as_bytes()[start..])))
}

/// Talents of the active specialization.
///
/// Selections on the specialization itself take precedence over the active loadout's.
pub fn select_talents(payload: &SpecializationsPayload) -> TalentSelections {
    let active_id = payload.active_specialization.id;
    let Some(spec) = payload
        .specializations
        .iter()
        .find(|s| s.specialization.id == active_id)
    else {
        return TalentSelections::default();
    };

    let active_loadout = spec.loadouts.iter().find(|l| l.is_active);
    let class_talents = if spec.selected_class_talents.is_empty() {
        active_loadout
            .map(|l| l.selected_class_talents.as_slice())
            .unwrap_or_default()
    } else {
        spec.selected_class_talents.as_slice()
    };
    let spec_talents = if spec.selected_spec_talents.is_empty() {
        active_loadout
            .map(|l| l.selected_spec_talents.as_slice())
            .unwrap_or_default()
    } else {
        spec.selected_spec_talents.as_slice()
    };

    let talents = class_talents
        .iter()
        .chain(spec_talents)
        .map(|t| t.tooltip.talent.id)
        .filter(|id| *id > 0)
        .collect();
    let pvp_talents = spec
        .pvp_talent_slots
        .iter()
        .map(|slot| slot.selected.talent.id)
        .filter(|id| *id > 0)
        .collect();

    TalentSelections {
        talents,
        pvp_talents,
    }
}

/// Crit and haste take the best of the melee, ranged and spell ratings.
pub fn reduce_stats(s: &StatisticsPayload) -> EntrantStats {
    let best = |values: [f64; 3]| values.into_iter().fold(0.0_f64, f64::max) as i32;
    EntrantStats {
        strength: s.strength.effective,
        agility: s.agility.effective,
        intellect: s.intellect.effective,
        stamina: s.stamina.effective,
        critical_strike: best([s.melee_crit.rating, s.ranged_crit.rating, s.spell_crit.rating]),
        haste: best([s.melee_haste.rating, s.ranged_haste.rating, s.spell_haste.rating]),
        versatility: s.versatility as i32,
        mastery: s.mastery.rating as i32,
        leech: s.lifesteal.rating as i32,
        dodge: s.dodge.rating as i32,
        parry: s.parry.rating as i32,
    }
}

/// Completed achievements that belong to the PvP catalog.
pub fn completed_achievements(payload: &AchievementsPayload, pvp: &HashSet<i32>) -> Vec<i32> {
    payload
        .achievements
        .iter()
        .filter(|a| a.completed_timestamp.is_some_and(|ts| ts > 0))
        .map(|a| a.id)
        .filter(|id| pvp.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blizzard::stub::StubFetcher;
    use crate::data::models::EntrantKey;

    const PATH: &str = "profile/wow/character/area-52/someone";

    fn entrant() -> Entrant {
        Entrant {
            key: EntrantKey::new(1, 42),
            name: "Someone".into(),
            path: "area-52/someone".into(),
        }
    }

    fn summary(class_id: i32, last_login: DateTime<Utc>) -> String {
        serde_json::json!({
            "gender": {"type": "FEMALE"},
            "faction": {"type": "HORDE"},
            "race": {"id": 2},
            "character_class": {"id": class_id},
            "active_spec": {"id": 71},
            "guild": {"id": 9, "name": "Method"},
            "last_login_timestamp": last_login.timestamp_millis(),
        })
        .to_string()
    }

    const SPECIALIZATIONS: &str = r#"{
        "active_specialization": {"id": 71},
        "specializations": [
            {
                "specialization": {"id": 72},
                "selected_class_talents": [{"tooltip": {"talent": {"id": 999}}}]
            },
            {
                "specialization": {"id": 71},
                "loadouts": [
                    {"is_active": false, "selected_class_talents": [{"tooltip": {"talent": {"id": 1}}}]},
                    {
                        "is_active": true,
                        "selected_class_talents": [{"tooltip": {"talent": {"id": 10}}}, {"tooltip": {"talent": {"id": 0}}}],
                        "selected_spec_talents": [{"tooltip": {"talent": {"id": 20}}}]
                    }
                ],
                "pvp_talent_slots": [{"selected": {"talent": {"id": 300}}}, {"selected": {"talent": {"id": 301}}}]
            }
        ]
    }"#;

    fn enricher(fetcher: StubFetcher) -> Enricher {
        Enricher::new(
            Arc::new(fetcher),
            Region::Us,
            Duration::from_secs(999 * 3600),
            EquipmentCache::new(),
            Some(Arc::new(HashSet::from([500, 501]))),
        )
    }

    #[test]
    fn active_loadout_talents_are_selected() {
        let payload: SpecializationsPayload = serde_json::from_str(SPECIALIZATIONS).unwrap();
        let selected = select_talents(&payload);
        assert_eq!(selected.talents, vec![10, 20]);
        assert_eq!(selected.pvp_talents, vec![300, 301]);
    }

    #[test]
    fn spec_level_selections_override_loadout() {
        let payload: SpecializationsPayload = serde_json::from_str(
            r#"{
                "active_specialization": {"id": 5},
                "specializations": [{
                    "specialization": {"id": 5},
                    "loadouts": [{"is_active": true, "selected_class_talents": [{"tooltip": {"talent": {"id": 1}}}]}],
                    "selected_class_talents": [{"tooltip": {"talent": {"id": 2}}}]
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(select_talents(&payload).talents, vec![2]);
    }

    #[test]
    fn crit_and_haste_take_the_best_rating() {
        let payload: StatisticsPayload = serde_json::from_str(
            r#"{
                "stamina": {"effective": 80000},
                "versatility": 1234.9,
                "melee_crit": {"rating": 100.0},
                "ranged_crit": {"rating": 300.0},
                "spell_crit": {"rating": 200.0},
                "spell_haste": {"rating": 450.5}
            }"#,
        )
        .unwrap();
        let stats = reduce_stats(&payload);
        assert_eq!(stats.critical_strike, 300);
        assert_eq!(stats.haste, 450);
        assert_eq!(stats.versatility, 1234);
        assert_eq!(stats.stamina, 80000);
    }

    #[test]
    fn only_completed_pvp_achievements_count() {
        let payload: AchievementsPayload = serde_json::from_str(
            r#"{"achievements": [
                {"id": 500, "completed_timestamp": 1700000000000},
                {"id": 501},
                {"id": 600, "completed_timestamp": 1700000000000}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            completed_achievements(&payload, &HashSet::from([500, 501])),
            vec![500]
        );
    }

    #[test]
    fn fingerprint_requires_pets() {
        let with_pets = r#"{"_links": {}, "pets": [{"species": {"id": 1}}]}"#;
        let other_links = r#"{"_links": {"x": 1}, "pets": [{"species": {"id": 1}}]}"#;
        let a = pet_fingerprint(with_pets).unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(Some(a), pet_fingerprint(other_links));
        assert!(pet_fingerprint(r#"{"pets": []}"#).is_none());
    }

    #[test]
    fn stale_threshold() {
        let now = Utc::now();
        let limit = Duration::from_secs(3600);
        assert!(is_stale(now - chrono::Duration::hours(2), now, limit));
        assert!(!is_stale(now - chrono::Duration::minutes(30), now, limit));
        assert!(!is_stale(now + chrono::Duration::minutes(5), now, limit));
    }

    #[tokio::test]
    async fn zero_class_drops_entrant() {
        let fetcher = StubFetcher::new().with(PATH, summary(0, Utc::now()));
        assert!(enricher(fetcher).enrich(entrant(), Utc::now()).await.is_none());
    }

    #[tokio::test]
    async fn stale_login_drops_entrant() {
        let long_ago = Utc::now() - chrono::Duration::days(60);
        let fetcher = StubFetcher::new().with(PATH, summary(1, long_ago));
        assert!(enricher(fetcher).enrich(entrant(), Utc::now()).await.is_none());
    }

    #[tokio::test]
    async fn missing_talents_keep_identity_only() {
        let fetcher = StubFetcher::new()
            .with(PATH, summary(1, Utc::now()))
            .with(format!("{PATH}/statistics"), "{}");
        let record = enricher(fetcher).enrich(entrant(), Utc::now()).await.unwrap();
        assert_eq!(record.profile.class_id, 1);
        assert_eq!(record.profile.faction_id, FACTION_HORDE);
        assert_eq!(record.profile.gender, 1);
        assert_eq!(record.profile.guild.as_deref(), Some("Method"));
        assert_eq!(record.profile.profile_id, "area-52/someone");
        assert!(record.talents.is_none());
        assert!(record.stats.is_none());
    }

    #[tokio::test]
    async fn full_enrichment_fills_cache_and_loadout() {
        let fetcher = StubFetcher::new()
            .with(PATH, summary(1, Utc::now()))
            .with(format!("{PATH}/collections/pets"), r#"{"pets": [{"species": {"id": 7}}]}"#)
            .with(format!("{PATH}/specializations"), SPECIALIZATIONS)
            .with(
                format!("{PATH}/achievements"),
                r#"{"achievements": [{"id": 501, "completed_timestamp": 1}]}"#,
            )
            .with(
                format!("{PATH}/equipment"),
                r#"{"equipped_items": [
                    {"item": {"id": 11}, "slot": {"type": "HEAD"}, "name": "Helm", "quality": {"type": "EPIC"}},
                    {"item": {"id": 0}, "slot": {"type": "SHIRT"}, "name": "", "quality": {"type": "COMMON"}}
                ]}"#,
            );
        let enricher = enricher(fetcher);
        let record = enricher.enrich(entrant(), Utc::now()).await.unwrap();

        assert_eq!(record.talents.unwrap().talents, vec![10, 20]);
        assert_eq!(record.achievements, Some(vec![501]));
        assert!(record.stats.is_none());
        assert_eq!(record.profile.profile_id.len(), 64);
        let loadout = record.loadout.unwrap();
        assert_eq!(loadout.slots.get("HEAD"), Some(&11));
        assert!(!loadout.slots.contains_key("SHIRT"));
        assert_eq!(enricher.equipment.len(), 1);
    }

    #[tokio::test]
    async fn unreadable_catalog_leaves_achievements_unobserved() {
        let fetcher = StubFetcher::new()
            .with(PATH, summary(1, Utc::now()))
            .with(format!("{PATH}/specializations"), SPECIALIZATIONS)
            .with(
                format!("{PATH}/achievements"),
                r#"{"achievements": [{"id": 500, "completed_timestamp": 1}]}"#,
            );
        let enricher = Enricher::new(
            Arc::new(fetcher),
            Region::Us,
            Duration::from_secs(999 * 3600),
            EquipmentCache::new(),
            None,
        );
        let record = enricher.enrich(entrant(), Utc::now()).await.unwrap();
        assert!(record.talents.is_some());
        assert!(record.achievements.is_none());

        let ids = std::collections::HashMap::from([(record.profile.key(), 7)]);
        let (scope, pairs) = crate::pipeline::reconcile::observed_relations(
            std::slice::from_ref(&record),
            &ids,
            crate::data::relations::RelationKind::Achievement,
        );
        assert!(scope.is_empty());
        assert!(pairs.is_empty());
    }

    #[tokio::test]
    async fn missing_summary_drops_entrant() {
        let fetcher = StubFetcher::new().with(format!("{PATH}/specializations"), SPECIALIZATIONS);
        assert!(enricher(fetcher).enrich(entrant(), Utc::now()).await.is_none());
    }
}
