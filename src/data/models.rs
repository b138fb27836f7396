//! Records flowing from the aggregator through enrichment into storage.

use crate::blizzard::Region;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Globally unique identity of an entrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntrantKey {
    pub realm_id: i32,
    pub blizzard_id: i32,
}

impl EntrantKey {
    pub fn new(realm_id: i32, blizzard_id: i32) -> Self {
        Self {
            realm_id,
            blizzard_id,
        }
    }
}

impl fmt::Display for EntrantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.realm_id, self.blizzard_id)
    }
}

/// An entrant as first seen on a ranked list, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrant {
    pub key: EntrantKey,
    pub name: String,
    /// `{realm-slug}/{lowercased, url-encoded name}`, the profile API path.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub entrant: Entrant,
    pub rank: i32,
    pub rating: i32,
    pub wins: i32,
    pub losses: i32,
}

/// One leaderboard snapshot for the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedList {
    /// Storage key, e.g. `3v3` or `solo_262`.
    pub bracket: String,
    pub entries: Vec<RankedEntry>,
}

pub const FACTION_HORDE: i32 = 67;
pub const FACTION_ALLIANCE: i32 = 469;

/// Validated identity of an enriched entrant. Class, spec, race and faction
/// are all non-zero; construct through `EntrantProfile::new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrantProfile {
    pub entrant: Entrant,
    pub region: Region,
    pub class_id: i32,
    pub spec_id: i32,
    pub faction_id: i32,
    pub race_id: i32,
    /// 0 male, 1 female.
    pub gender: i16,
    pub guild: Option<String>,
    pub last_login: DateTime<Utc>,
    /// Account-wide fingerprint used to correlate alts.
    pub profile_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub class_id: i32,
    pub spec_id: i32,
    pub faction_id: i32,
    pub race_id: i32,
    pub gender: i16,
}

impl Identity {
    pub fn is_complete(&self) -> bool {
        self.class_id > 0 && self.spec_id > 0 && self.faction_id > 0 && self.race_id > 0
    }
}

impl EntrantProfile {
    /// Returns `None` when any mandatory identity field is zero.
    pub fn new(
        entrant: Entrant,
        region: Region,
        identity: Identity,
        guild: Option<String>,
        last_login: DateTime<Utc>,
    ) -> Option<Self> {
        if !identity.is_complete() {
            return None;
        }
        let profile_id = entrant.path.clone();
        Some(Self {
            entrant,
            region,
            class_id: identity.class_id,
            spec_id: identity.spec_id,
            faction_id: identity.faction_id,
            race_id: identity.race_id,
            gender: identity.gender,
            guild,
            last_login,
            profile_id,
        })
    }

    pub fn key(&self) -> EntrantKey {
        self.entrant.key
    }
}

/// Talent ids of the active specialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TalentSelections {
    pub talents: Vec<i32>,
    pub pvp_talents: Vec<i32>,
}

impl TalentSelections {
    pub fn is_empty(&self) -> bool {
        self.talents.is_empty() && self.pvp_talents.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntrantStats {
    pub strength: i32,
    pub agility: i32,
    pub intellect: i32,
    pub stamina: i32,
    pub critical_strike: i32,
    pub haste: i32,
    pub versatility: i32,
    pub mastery: i32,
    pub leech: i32,
    pub dodge: i32,
    pub parry: i32,
}

/// Slot type (`HEAD`, `TRINKET_1`, ...) to equipment id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Loadout {
    pub slots: BTreeMap<String, i32>,
}

/// A catalog equipment record, shared by every entrant wearing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equipment {
    pub id: i32,
    pub name: String,
    pub quality: String,
}

/// Everything gathered for one entrant during a run.
///
/// `None` sub-records were not observed this run and must leave stored data alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedEntrant {
    pub profile: EntrantProfile,
    pub talents: Option<TalentSelections>,
    pub stats: Option<EntrantStats>,
    pub achievements: Option<Vec<i32>>,
    pub loadout: Option<Loadout>,
}

impl EnrichedEntrant {
    pub fn identity_only(profile: EntrantProfile) -> Self {
        Self {
            profile,
            talents: None,
            stats: None,
            achievements: None,
            loadout: None,
        }
    }
}
