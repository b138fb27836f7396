//! Response payloads for the endpoints this importer reads.
//!
//! Fields default when absent; callers decide which zero values are fatal.

use serde::Deserialize;

/// `{ "id": 1, "name": "..." }`, the shape of most references.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeyedValue {
    pub id: i32,
    pub name: String,
}

/// `{ "type": "HORDE", "name": "Horde" }`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TypedName {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

// -- Seasons and leaderboards --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeasonIndex {
    pub current_season: KeyedValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LeaderboardIndex {
    pub leaderboards: Vec<KeyedValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LeaderboardPayload {
    pub entries: Vec<LeaderboardEntryPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LeaderboardEntryPayload {
    pub character: CharacterRef,
    pub rank: i32,
    pub rating: i32,
    pub season_match_statistics: MatchStatistics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CharacterRef {
    pub name: String,
    pub id: i32,
    pub realm: RealmRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RealmRef {
    pub id: i32,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MatchStatistics {
    pub played: i32,
    pub won: i32,
    pub lost: i32,
}

// -- Character profile --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileSummary {
    pub gender: TypedName,
    pub faction: TypedName,
    pub race: KeyedValue,
    pub character_class: KeyedValue,
    pub active_spec: KeyedValue,
    pub guild: Option<KeyedValue>,
    /// Milliseconds since the epoch.
    pub last_login_timestamp: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SpecializationsPayload {
    pub specializations: Vec<SpecializationEntry>,
    pub active_specialization: KeyedValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SpecializationEntry {
    pub specialization: KeyedValue,
    pub loadouts: Vec<TalentLoadout>,
    pub pvp_talent_slots: Vec<PvpTalentSlot>,
    /// Characters without loadouts carry their selections here.
    pub selected_class_talents: Vec<SelectedTalent>,
    pub selected_spec_talents: Vec<SelectedTalent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TalentLoadout {
    pub is_active: bool,
    pub selected_class_talents: Vec<SelectedTalent>,
    pub selected_spec_talents: Vec<SelectedTalent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SelectedTalent {
    pub id: i32,
    pub rank: i32,
    pub tooltip: TalentTooltip,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TalentTooltip {
    pub talent: KeyedValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PvpTalentSlot {
    pub selected: PvpTalentSelected,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PvpTalentSelected {
    pub talent: KeyedValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BaseStat {
    pub base: i32,
    pub effective: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RatedStat {
    pub rating: f64,
    pub rating_bonus: f64,
    pub value: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatisticsPayload {
    pub strength: BaseStat,
    pub agility: BaseStat,
    pub intellect: BaseStat,
    pub stamina: BaseStat,
    pub versatility: f64,
    pub mastery: RatedStat,
    pub lifesteal: RatedStat,
    pub dodge: RatedStat,
    pub parry: RatedStat,
    pub melee_crit: RatedStat,
    pub melee_haste: RatedStat,
    pub ranged_crit: RatedStat,
    pub ranged_haste: RatedStat,
    pub spell_crit: RatedStat,
    pub spell_haste: RatedStat,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EquipmentPayload {
    pub equipped_items: Vec<EquippedItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EquippedItem {
    pub item: KeyedValue,
    pub slot: TypedName,
    pub name: String,
    pub quality: TypedName,
    pub spells: Vec<ItemSpell>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ItemSpell {
    pub spell: KeyedValue,
}

/// `data/wow/item/{id}`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ItemDetail {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AchievementsPayload {
    pub achievements: Vec<AchievementProgress>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AchievementProgress {
    pub id: i32,
    pub completed_timestamp: Option<i64>,
}

// -- Catalog indexes --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RealmIndex {
    pub realms: Vec<RealmRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RaceIndex {
    pub races: Vec<KeyedValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClassIndex {
    pub classes: Vec<KeyedValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SpecIndex {
    pub character_specializations: Vec<KeyedValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SpecDetail {
    pub id: i32,
    pub name: String,
    pub playable_class: KeyedValue,
    pub role: TypedName,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TalentIndex {
    pub talents: Vec<KeyedValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PvpTalentIndex {
    pub pvp_talents: Vec<KeyedValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AchievementCategory {
    pub achievements: Vec<KeyedValue>,
    pub subcategories: Vec<KeyedValue>,
}
