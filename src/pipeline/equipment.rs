//! Per-run equipment catalog shared by every enrichment worker.
//!
//! Each distinct equipment id is claimed exactly once. The claiming worker
//! resolves the record (fetching the item detail for legendaries, whose
//! observed name is a placeholder) and fills the slot; everyone else skips it.

use crate::blizzard::json::fetch_json;
use crate::blizzard::models::{EquippedItem, ItemDetail};
use crate::blizzard::{Region, ResourceFetcher, ResourceRequest};
use crate::data::models::Equipment;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::{debug, warn};

const LEGENDARY: &str = "LEGENDARY";

/// An item as reported by the profile equipment endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedItem {
    pub id: i32,
    pub name: String,
    pub quality: String,
}

impl ObservedItem {
    /// Legendaries are reported under the name of their granted spell when present.
    pub fn from_payload(item: &EquippedItem) -> Self {
        let name = if item.quality.kind == LEGENDARY {
            item.spells
                .first()
                .map(|s| s.spell.name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| item.name.clone())
        } else {
            item.name.clone()
        };
        Self {
            id: item.item.id,
            name,
            quality: item.quality.kind.clone(),
        }
    }

    fn needs_detail(&self) -> bool {
        self.quality == LEGENDARY
    }
}

#[derive(Debug, Clone, Default)]
pub struct EquipmentCache {
    /// `None` while the claimant is still resolving the record.
    entries: Arc<DashMap<i32, Option<Equipment>>>,
}

impl EquipmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-if-absent. Returns `true` only for the first caller per id;
    /// id 0 is never claimed.
    pub fn claim(&self, id: i32) -> bool {
        if id == 0 {
            return false;
        }
        match self.entries.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(None);
                true
            }
        }
    }

    fn fill(&self, equipment: Equipment) {
        self.entries.insert(equipment.id, Some(equipment));
    }

    /// Record an observed item, resolving it if this caller is the claimant.
    ///
    /// Returns whether this call claimed the id.
    pub async fn observe(
        &self,
        item: ObservedItem,
        fetcher: &dyn ResourceFetcher,
        region: Region,
    ) -> bool {
        if !self.claim(item.id) {
            return false;
        }
        let pending = PendingClaim {
            cache: self,
            id: item.id,
        };

        let name = if item.needs_detail() {
            resolve_name(fetcher, region, item.id)
                .await
                .unwrap_or(item.name)
        } else {
            item.name
        };

        self.fill(Equipment {
            id: item.id,
            name,
            quality: item.quality,
        });
        std::mem::forget(pending);
        true
    }

    /// Number of resolved records.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every resolved record, ordered by id.
    pub fn squash(&self) -> Vec<Equipment> {
        let mut unresolved = 0;
        let mut items: Vec<Equipment> = Vec::with_capacity(self.entries.len());
        for entry in self.entries.iter() {
            match entry.value() {
                Some(equipment) => items.push(equipment.clone()),
                None => unresolved += 1,
            }
        }
        if unresolved > 0 {
            warn!(unresolved, "Equipment claims never resolved, left out of the catalog");
        }
        items.sort_by_key(|e| e.id);
        items
    }
}

/// Releases a claim whose claimant stopped before filling it, so a later
/// observer can claim the id again.
struct PendingClaim<'a> {
    cache: &'a EquipmentCache,
    id: i32,
}

impl Drop for PendingClaim<'_> {
    fn drop(&mut self) {
        self.cache.entries.remove_if(&self.id, |_, slot| slot.is_none());
    }
}

async fn resolve_name(fetcher: &dyn ResourceFetcher, region: Region, id: i32) -> Option<String> {
    let request = ResourceRequest::static_data(region, format!("item/{id}"));
    let detail: ItemDetail = fetch_json(fetcher, &request).await?;
    if detail.name.is_empty() {
        debug!(item = id, "Item detail has no name, keeping observed name");
        return None;
    }
    Some(detail.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blizzard::stub::StubFetcher;

    fn item(id: i32, name: &str, quality: &str) -> ObservedItem {
        ObservedItem {
            id,
            name: name.into(),
            quality: quality.into(),
        }
    }

    #[test]
    fn zero_id_is_never_claimed() {
        let cache = EquipmentCache::new();
        assert!(!cache.claim(0));
        assert!(cache.is_empty());
    }

    #[test]
    fn second_claim_is_refused() {
        let cache = EquipmentCache::new();
        assert!(cache.claim(7));
        assert!(!cache.claim(7));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_observers_record_each_id_once() {
        let cache = EquipmentCache::new();
        let fetcher = Arc::new(StubFetcher::new());

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let fetcher = fetcher.clone();
            tasks.spawn(async move {
                let mut claimed = 0;
                for id in 1..=50 {
                    if cache
                        .observe(item(id, "Helm", "EPIC"), fetcher.as_ref(), Region::Us)
                        .await
                    {
                        claimed += 1;
                    }
                }
                claimed
            });
        }

        let mut total = 0;
        while let Some(claimed) = tasks.join_next().await {
            total += claimed.unwrap();
        }
        assert_eq!(total, 50);
        assert_eq!(cache.len(), 50);
        assert_eq!(cache.squash().first().map(|e| e.id), Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn legendary_detail_is_fetched_once() {
        let cache = EquipmentCache::new();
        let fetcher = Arc::new(
            StubFetcher::new().with("data/wow/item/19019", r#"{"id": 19019, "name": "Thunderfury"}"#),
        );

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let fetcher = fetcher.clone();
            tasks.spawn(async move {
                cache
                    .observe(item(19019, "Spell Name", LEGENDARY), fetcher.as_ref(), Region::Eu)
                    .await
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap();
        }

        assert_eq!(fetcher.hits("data/wow/item/19019"), 1);
        assert_eq!(
            cache.squash(),
            vec![Equipment {
                id: 19019,
                name: "Thunderfury".into(),
                quality: LEGENDARY.into(),
            }]
        );
    }

    #[tokio::test]
    async fn missing_detail_keeps_observed_name() {
        let cache = EquipmentCache::new();
        let fetcher = StubFetcher::new();
        cache
            .observe(item(5, "Placeholder", LEGENDARY), &fetcher, Region::Us)
            .await;
        assert_eq!(cache.squash()[0].name, "Placeholder");
    }

    #[test]
    fn legendary_payload_uses_spell_name() {
        let payload: EquippedItem = serde_json::from_str(
            r#"{
                "item": {"id": 1},
                "slot": {"type": "BACK"},
                "name": "Cloak",
                "quality": {"type": "LEGENDARY"},
                "spells": [{"spell": {"id": 9, "name": "Granted Power"}}]
            }"#,
        )
        .unwrap();
        let observed = ObservedItem::from_payload(&payload);
        assert_eq!(observed.name, "Granted Power");
        assert!(observed.needs_detail());
    }

    /// Never answers, holding the claimant mid-resolution.
    struct Stalled;

    #[async_trait::async_trait]
    impl ResourceFetcher for Stalled {
        async fn fetch(&self, _request: &ResourceRequest) -> Option<String> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn abandoned_claim_is_released() {
        let cache = EquipmentCache::new();
        let legendary = item(40, "Placeholder", LEGENDARY);

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            cache.observe(legendary.clone(), &Stalled, Region::Us),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(cache.squash().is_empty());

        assert!(cache.observe(legendary, &StubFetcher::new(), Region::Us).await);
        assert_eq!(cache.squash()[0].name, "Placeholder");
    }
}
