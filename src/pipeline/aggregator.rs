//! Season discovery, ranked-list fetching and entrant deduplication.

use crate::blizzard::json::fetch_json;
use crate::blizzard::models::{LeaderboardEntryPayload, LeaderboardIndex, LeaderboardPayload, SeasonIndex};
use crate::blizzard::{Region, ResourceFetcher, ResourceRequest};
use crate::data::models::{Entrant, EntrantKey, RankedEntry, RankedList};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Lists fetched every run regardless of the index.
pub const REGULAR_BRACKETS: [&str; 3] = ["2v2", "3v3", "rbg"];

/// Per-spec list families: `(leaderboard prefix, storage prefix)`.
const SPEC_LIST_FAMILIES: [(&str, &str); 2] = [("shuffle-", "solo"), ("blitz-", "blitz")];

/// A list to fetch and the key it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSpec {
    pub leaderboard: String,
    pub bracket: String,
}

impl ListSpec {
    pub fn regular(name: &str) -> Self {
        Self {
            leaderboard: name.to_string(),
            bracket: name.to_string(),
        }
    }
}

pub async fn current_season(fetcher: &dyn ResourceFetcher, region: Region) -> Option<i32> {
    let request = ResourceRequest::dynamic(region, "pvp-season/index");
    let index: SeasonIndex = fetch_json(fetcher, &request).await?;
    (index.current_season.id > 0).then_some(index.current_season.id)
}

/// The regular brackets plus every per-spec list in the season's index.
///
/// Per-spec lists are named `{prefix}{class}-{spec}`; those whose slug has no
/// known spec are skipped.
pub async fn discover_lists(
    fetcher: &dyn ResourceFetcher,
    region: Region,
    season: i32,
    spec_slugs: &HashMap<String, i32>,
) -> Vec<ListSpec> {
    let mut lists: Vec<ListSpec> = REGULAR_BRACKETS.iter().map(|b| ListSpec::regular(b)).collect();

    let request = ResourceRequest::dynamic(region, format!("pvp-season/{season}/pvp-leaderboard/index"));
    let Some(index) = fetch_json::<LeaderboardIndex>(fetcher, &request).await else {
        warn!(region = %region, season, "Leaderboard index unavailable, using regular brackets only");
        return lists;
    };

    lists.extend(spec_lists(&index, spec_slugs));
    lists
}

fn spec_lists(index: &LeaderboardIndex, spec_slugs: &HashMap<String, i32>) -> Vec<ListSpec> {
    let mut lists = Vec::new();
    for board in &index.leaderboards {
        for (prefix, storage) in SPEC_LIST_FAMILIES {
            let Some(slug) = board.name.strip_prefix(prefix) else {
                continue;
            };
            match spec_slugs.get(slug) {
                Some(spec_id) => lists.push(ListSpec {
                    leaderboard: board.name.clone(),
                    bracket: format!("{storage}_{spec_id}"),
                }),
                None => debug!(leaderboard = %board.name, "No spec matches leaderboard slug"),
            }
        }
    }
    lists
}

/// Fetches ranked lists of one region and season.
pub struct Aggregator<'a> {
    pub fetcher: &'a dyn ResourceFetcher,
    pub region: Region,
    pub season: i32,
    /// Truncate each list before dedup.
    pub max_per_list: Option<usize>,
    /// Realm id to slug; the payload's own slug is the fallback.
    pub realms: &'a HashMap<i32, String>,
}

impl Aggregator<'_> {
    /// Fetch one list. An unavailable list is `None`.
    pub async fn fetch_list(&self, list: &ListSpec) -> Option<RankedList> {
        let request = ResourceRequest::dynamic(
            self.region,
            format!("pvp-season/{}/pvp-leaderboard/{}", self.season, list.leaderboard),
        );
        let Some(payload) = fetch_json::<LeaderboardPayload>(self.fetcher, &request).await else {
            warn!(region = %self.region, leaderboard = %list.leaderboard, "Ranked list unavailable");
            return None;
        };

        let limit = self.max_per_list.unwrap_or(usize::MAX);
        let entries: Vec<RankedEntry> = payload
            .entries
            .iter()
            .take(limit)
            .filter_map(|e| self.ranked_entry(e))
            .collect();

        debug!(bracket = %list.bracket, entries = entries.len(), "Fetched ranked list");
        Some(RankedList {
            bracket: list.bracket.clone(),
            entries,
        })
    }

    fn ranked_entry(&self, entry: &LeaderboardEntryPayload) -> Option<RankedEntry> {
        let character = &entry.character;
        if character.id == 0 || character.realm.id == 0 || character.name.is_empty() {
            return None;
        }
        let slug = self
            .realms
            .get(&character.realm.id)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| Some(character.realm.slug.as_str()).filter(|s| !s.is_empty()))?;

        Some(RankedEntry {
            entrant: Entrant {
                key: EntrantKey::new(character.realm.id, character.id),
                name: character.name.clone(),
                path: entrant_path(slug, &character.name),
            },
            rank: entry.rank,
            rating: entry.rating,
            wins: entry.season_match_statistics.won,
            losses: entry.season_match_statistics.lost,
        })
    }

    /// Fetch every list in order, skipping the unavailable ones.
    pub async fn fetch_lists(&self, lists: &[ListSpec]) -> Vec<RankedList> {
        let mut fetched = Vec::with_capacity(lists.len());
        for list in lists {
            if let Some(ranked) = self.fetch_list(list).await {
                fetched.push(ranked);
            }
        }
        info!(
            region = %self.region,
            fetched = fetched.len(),
            requested = lists.len(),
            "Fetched ranked lists"
        );
        fetched
    }
}

/// `{realm-slug}/{url-encoded lowercase name}`
pub fn entrant_path(realm_slug: &str, name: &str) -> String {
    format!("{realm_slug}/{}", urlencoding::encode(&name.to_lowercase()))
}

/// Unique entrants across `lists`, in first-seen order. The first occurrence
/// of a key is the one kept.
pub fn unique_entrants(lists: &[RankedList]) -> Vec<Entrant> {
    let mut seen: HashSet<EntrantKey> = HashSet::new();
    lists
        .iter()
        .flat_map(|list| list.entries.iter())
        .filter(|e| seen.insert(e.entrant.key))
        .map(|e| e.entrant.clone())
        .collect()
}
