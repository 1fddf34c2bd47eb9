//! Area exploration
//!
//! An expedition walks `exploring -> completed -> claimed`. Completion rolls
//! the rewards, sub-events and item drops once; the claim pays them out.
//! The catalog is static, only the unlock flags, the current run and the
//! history are persisted in the `exploration` collection.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::progress_percent;
use crate::context::TimeSource;
use crate::equipment::{Armory, Equipment, EquipmentType, NewEquipment, Rarity};
use crate::error::{ActionResult, Rejection, StoreError};
use crate::modifiers::Reward;
use crate::rewards::{Grant, RewardService};
use crate::store::snapshot::{
    AreaUnlocksRecord, ExplorationHistoryRecord, ExplorationStateRecord, keys,
};
use crate::store::{Collection, Store};
use crate::tasks::EXPLORE_TASK_ID;
use crate::triggers::{StatEvent, TriggerEngine, TriggerReport};

const BATTLE_WIN_CHANCE: f64 = 0.7;
const PUZZLE_SOLVE_CHANCE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaKind {
    Forest,
    Mountain,
    Cave,
    Desert,
    Ocean,
    Ruins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubEventType {
    Battle,
    Treasure,
    Puzzle,
    Merchant,
    Trap,
    Blessing,
}

impl SubEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubEventType::Battle => "battle",
            SubEventType::Treasure => "treasure",
            SubEventType::Puzzle => "puzzle",
            SubEventType::Merchant => "merchant",
            SubEventType::Trap => "trap",
            SubEventType::Blessing => "blessing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubEventOutcome {
    Victory,
    Defeat,
    Solved,
    Failed,
}

/// A sub-event an area may roll
#[derive(Debug, PartialEq)]
pub struct SubEventTemplate {
    pub kind: SubEventType,
    pub chance: f64,
    /// Difficulty, quality, damage or power depending on `kind`
    pub magnitude: u32,
}

/// A sub-event that happened during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubEvent {
    #[serde(rename = "type")]
    pub kind: SubEventType,
    pub magnitude: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SubEventOutcome>,
    pub description: String,
}

#[derive(Debug, PartialEq)]
pub struct ItemDropTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub equipment_type: EquipmentType,
    pub chance: f64,
    pub stats: &'static [(&'static str, i64)],
    pub value: Option<i64>,
}

/// An item found during a run, added to the inventory on claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDrop {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub equipment_type: EquipmentType,
    #[serde(default)]
    pub stats: BTreeMap<String, i64>,
    #[serde(default)]
    pub value: Option<i64>,
}

impl ItemDrop {
    fn from_template(template: &ItemDropTemplate) -> Self {
        Self {
            id: template.id.to_string(),
            name: template.name.to_string(),
            equipment_type: template.equipment_type,
            stats: template
                .stats
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
            value: template.value,
        }
    }

    fn into_equipment(self) -> NewEquipment {
        NewEquipment {
            id: None,
            name: self.name,
            equipment_type: self.equipment_type,
            rarity: Rarity::Common,
            stats: self.stats,
            value: self.value,
        }
    }
}

/// Inclusive reward range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardRange {
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, PartialEq)]
pub struct ExplorationArea {
    pub id: u32,
    pub name: &'static str,
    pub kind: AreaKind,
    pub description: &'static str,
    pub min_level: u32,
    pub energy_cost: i64,
    pub duration_ms: u64,
    pub gold: RewardRange,
    pub experience: RewardRange,
    pub events: &'static [SubEventTemplate],
    pub drops: &'static [ItemDropTemplate],
    pub unlocked_by_default: bool,
}

impl ExplorationArea {
    pub fn get(id: u32) -> Option<&'static ExplorationArea> {
        AREAS.iter().find(|a| a.id == id)
    }
}

pub static AREAS: &[ExplorationArea] = &[
    ExplorationArea {
        id: 1,
        name: "Whispering Forest",
        kind: AreaKind::Forest,
        description: "An old forest said to hide rare resources and strange creatures",
        min_level: 1,
        energy_cost: 15,
        duration_ms: 8_000,
        gold: RewardRange { min: 10, max: 30 },
        experience: RewardRange { min: 5, max: 15 },
        events: &[
            SubEventTemplate { kind: SubEventType::Battle, chance: 0.3, magnitude: 1 },
            SubEventTemplate { kind: SubEventType::Treasure, chance: 0.2, magnitude: 1 },
            SubEventTemplate { kind: SubEventType::Blessing, chance: 0.1, magnitude: 1 },
        ],
        drops: &[
            ItemDropTemplate {
                id: "wood_stick",
                name: "Wooden Stick",
                equipment_type: EquipmentType::Weapon,
                chance: 0.3,
                stats: &[("attack", 2)],
                value: None,
            },
            ItemDropTemplate {
                id: "leaf_hat",
                name: "Leaf Hat",
                equipment_type: EquipmentType::Helmet,
                chance: 0.2,
                stats: &[("defense", 1)],
                value: None,
            },
        ],
        unlocked_by_default: true,
    },
    ExplorationArea {
        id: 2,
        name: "Barren Peaks",
        kind: AreaKind::Mountain,
        description: "Steep cliffs with valuable ore in the rock",
        min_level: 10,
        energy_cost: 25,
        duration_ms: 12_000,
        gold: RewardRange { min: 25, max: 60 },
        experience: RewardRange { min: 15, max: 35 },
        events: &[
            SubEventTemplate { kind: SubEventType::Battle, chance: 0.35, magnitude: 2 },
            SubEventTemplate { kind: SubEventType::Treasure, chance: 0.25, magnitude: 2 },
            SubEventTemplate { kind: SubEventType::Trap, chance: 0.15, magnitude: 10 },
        ],
        drops: &[
            ItemDropTemplate {
                id: "stone_axe",
                name: "Stone Axe",
                equipment_type: EquipmentType::Weapon,
                chance: 0.25,
                stats: &[("attack", 5)],
                value: None,
            },
            ItemDropTemplate {
                id: "iron_ore",
                name: "Iron Ore",
                equipment_type: EquipmentType::Material,
                chance: 0.4,
                stats: &[],
                value: Some(15),
            },
        ],
        unlocked_by_default: false,
    },
    ExplorationArea {
        id: 3,
        name: "Gloom Caverns",
        kind: AreaKind::Cave,
        description: "Dark tunnels with ancient treasure and dangerous residents",
        min_level: 20,
        energy_cost: 35,
        duration_ms: 15_000,
        gold: RewardRange { min: 50, max: 100 },
        experience: RewardRange { min: 30, max: 60 },
        events: &[
            SubEventTemplate { kind: SubEventType::Battle, chance: 0.4, magnitude: 3 },
            SubEventTemplate { kind: SubEventType::Treasure, chance: 0.3, magnitude: 3 },
            SubEventTemplate { kind: SubEventType::Puzzle, chance: 0.2, magnitude: 2 },
        ],
        drops: &[
            ItemDropTemplate {
                id: "crystal_shard",
                name: "Crystal Shard",
                equipment_type: EquipmentType::Material,
                chance: 0.3,
                stats: &[],
                value: Some(30),
            },
            ItemDropTemplate {
                id: "bat_wing",
                name: "Bat Wing",
                equipment_type: EquipmentType::Material,
                chance: 0.4,
                stats: &[],
                value: Some(20),
            },
            ItemDropTemplate {
                id: "shadow_cloak",
                name: "Shadow Cloak",
                equipment_type: EquipmentType::Armor,
                chance: 0.15,
                stats: &[("defense", 8)],
                value: None,
            },
        ],
        unlocked_by_default: false,
    },
    ExplorationArea {
        id: 4,
        name: "Scorched Dunes",
        kind: AreaKind::Desert,
        description: "Burning sand by day, freezing nights, and lost ruins underneath",
        min_level: 30,
        energy_cost: 45,
        duration_ms: 18_000,
        gold: RewardRange { min: 80, max: 150 },
        experience: RewardRange { min: 50, max: 90 },
        events: &[
            SubEventTemplate { kind: SubEventType::Battle, chance: 0.3, magnitude: 4 },
            SubEventTemplate { kind: SubEventType::Merchant, chance: 0.2, magnitude: 3 },
            SubEventTemplate { kind: SubEventType::Trap, chance: 0.25, magnitude: 20 },
        ],
        drops: &[
            ItemDropTemplate {
                id: "desert_gem",
                name: "Desert Gem",
                equipment_type: EquipmentType::Material,
                chance: 0.2,
                stats: &[],
                value: Some(50),
            },
            ItemDropTemplate {
                id: "scorpion_tail",
                name: "Scorpion Tail",
                equipment_type: EquipmentType::Material,
                chance: 0.3,
                stats: &[],
                value: Some(35),
            },
            ItemDropTemplate {
                id: "sand_veil",
                name: "Sand Veil",
                equipment_type: EquipmentType::Accessory,
                chance: 0.1,
                stats: &[("defense", 6)],
                value: None,
            },
        ],
        unlocked_by_default: false,
    },
    ExplorationArea {
        id: 5,
        name: "Sunken Ruins",
        kind: AreaKind::Ocean,
        description: "A drowned city full of old power and older treasure",
        min_level: 50,
        energy_cost: 60,
        duration_ms: 25_000,
        gold: RewardRange { min: 120, max: 250 },
        experience: RewardRange { min: 80, max: 150 },
        events: &[
            SubEventTemplate { kind: SubEventType::Battle, chance: 0.35, magnitude: 5 },
            SubEventTemplate { kind: SubEventType::Treasure, chance: 0.3, magnitude: 5 },
            SubEventTemplate { kind: SubEventType::Puzzle, chance: 0.25, magnitude: 4 },
        ],
        drops: &[
            ItemDropTemplate {
                id: "trident",
                name: "Trident",
                equipment_type: EquipmentType::Weapon,
                chance: 0.15,
                stats: &[("attack", 25)],
                value: None,
            },
            ItemDropTemplate {
                id: "pearl",
                name: "Abyssal Pearl",
                equipment_type: EquipmentType::Material,
                chance: 0.25,
                stats: &[],
                value: Some(80),
            },
            ItemDropTemplate {
                id: "coral_armor",
                name: "Coral Armor",
                equipment_type: EquipmentType::Armor,
                chance: 0.1,
                stats: &[("defense", 20)],
                value: None,
            },
        ],
        unlocked_by_default: false,
    },
    ExplorationArea {
        id: 6,
        name: "Forgotten Citadel",
        kind: AreaKind::Ruins,
        description: "Ruins of a lost civilisation, thick with magic",
        min_level: 80,
        energy_cost: 80,
        duration_ms: 35_000,
        gold: RewardRange { min: 200, max: 400 },
        experience: RewardRange { min: 150, max: 300 },
        events: &[
            SubEventTemplate { kind: SubEventType::Battle, chance: 0.4, magnitude: 6 },
            SubEventTemplate { kind: SubEventType::Treasure, chance: 0.35, magnitude: 6 },
            SubEventTemplate { kind: SubEventType::Blessing, chance: 0.15, magnitude: 3 },
        ],
        drops: &[
            ItemDropTemplate {
                id: "ancient_sword",
                name: "Ancient Sword",
                equipment_type: EquipmentType::Weapon,
                chance: 0.1,
                stats: &[("attack", 40)],
                value: None,
            },
            ItemDropTemplate {
                id: "magic_crystal",
                name: "Magic Crystal",
                equipment_type: EquipmentType::Material,
                chance: 0.2,
                stats: &[],
                value: Some(120),
            },
            ItemDropTemplate {
                id: "rune_shield",
                name: "Rune Shield",
                equipment_type: EquipmentType::Shield,
                chance: 0.08,
                stats: &[("defense", 35)],
                value: None,
            },
        ],
        unlocked_by_default: false,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationStatus {
    Exploring,
    Completed,
    Claimed,
}

/// The single current (or last) expedition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationState {
    pub area_id: u32,
    pub start_time: i64,
    pub duration: u64,
    pub status: ExplorationStatus,
    pub energy_cost: i64,
    #[serde(default)]
    pub completed_time: Option<i64>,
    #[serde(default)]
    pub rewards: Option<Reward>,
    #[serde(default)]
    pub events: Vec<SubEvent>,
    #[serde(default)]
    pub items: Vec<ItemDrop>,
}

impl ExplorationState {
    pub fn is_due(&self, now: i64) -> bool {
        now - self.start_time >= self.duration as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub area_id: u32,
    pub area_name: String,
    pub completed_time: i64,
    pub rewards: Reward,
    pub events: Vec<SubEvent>,
    pub items: Vec<ItemDrop>,
}

/// An area together with its unlock flag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaStatus {
    pub area: &'static ExplorationArea,
    pub unlocked: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplorationClaim {
    pub area_id: u32,
    pub grant: Grant,
    pub items: Vec<Equipment>,
    pub report: TriggerReport,
}

pub fn roll_rewards<R: Rng + ?Sized>(area: &ExplorationArea, rng: &mut R) -> Reward {
    Reward::new(
        rng.gen_range(area.gold.min..=area.gold.max),
        rng.gen_range(area.experience.min..=area.experience.max),
    )
}

fn resolve_sub_event<R: Rng + ?Sized>(template: &SubEventTemplate, rng: &mut R) -> SubEvent {
    let (outcome, description) = match template.kind {
        SubEventType::Battle => {
            if rng.r#gen::<f64>() < BATTLE_WIN_CHANCE {
                (Some(SubEventOutcome::Victory), "You beat the enemy and took their loot".to_string())
            } else {
                (Some(SubEventOutcome::Defeat), "You lost the fight and dropped some loot".to_string())
            }
        }
        SubEventType::Puzzle => {
            if rng.r#gen::<f64>() < PUZZLE_SOLVE_CHANCE {
                (Some(SubEventOutcome::Solved), "You solved the puzzle".to_string())
            } else {
                (Some(SubEventOutcome::Failed), "The puzzle got the better of you".to_string())
            }
        }
        SubEventType::Treasure => (None, "You found a treasure chest".to_string()),
        SubEventType::Merchant => (None, "A travelling merchant showed you their wares".to_string()),
        SubEventType::Trap => (None, format!("A trap hit you for {} damage", template.magnitude)),
        SubEventType::Blessing => (None, "A strange power blessed you".to_string()),
    };
    SubEvent {
        kind: template.kind,
        magnitude: template.magnitude,
        outcome,
        description,
    }
}

/// Each template fires independently with its own chance
pub fn roll_events<R: Rng + ?Sized>(area: &ExplorationArea, rng: &mut R) -> Vec<SubEvent> {
    let mut events = Vec::new();
    for template in area.events {
        if rng.r#gen::<f64>() < template.chance {
            events.push(resolve_sub_event(template, rng));
        }
    }
    events
}

pub fn roll_drops<R: Rng + ?Sized>(area: &ExplorationArea, rng: &mut R) -> Vec<ItemDrop> {
    area.drops
        .iter()
        .filter(|template| rng.r#gen::<f64>() < template.chance)
        .map(ItemDrop::from_template)
        .collect()
}

#[derive(Clone)]
pub struct Expedition {
    store: Store,
    rewards: RewardService,
    armory: Armory,
    triggers: TriggerEngine,
    time: Arc<dyn TimeSource>,
    history_limit: usize,
}

impl Expedition {
    pub fn new(
        store: Store,
        rewards: RewardService,
        armory: Armory,
        triggers: TriggerEngine,
        time: Arc<dyn TimeSource>,
        history_limit: usize,
    ) -> Self {
        Self {
            store,
            rewards,
            armory,
            triggers,
            time,
            history_limit,
        }
    }

    fn unlocked_ids(&self) -> Result<BTreeSet<u32>, StoreError> {
        let mut ids: BTreeSet<u32> = AREAS
            .iter()
            .filter(|a| a.unlocked_by_default)
            .map(|a| a.id)
            .collect();
        if let Some(record) = self
            .store
            .get::<AreaUnlocksRecord>(Collection::Exploration, keys::AREA_UNLOCKS)?
        {
            ids.extend(record.unlocked);
        }
        Ok(ids)
    }

    pub fn areas(&self) -> Result<Vec<AreaStatus>, StoreError> {
        let unlocked = self.unlocked_ids()?;
        Ok(AREAS
            .iter()
            .map(|area| AreaStatus {
                area,
                unlocked: unlocked.contains(&area.id),
            })
            .collect())
    }

    /// Areas whose level requirement `level` meets, locked or not
    pub fn available_areas(&self, level: u32) -> Result<Vec<AreaStatus>, StoreError> {
        Ok(self
            .areas()?
            .into_iter()
            .filter(|s| s.area.min_level <= level)
            .collect())
    }

    pub fn unlock_area(&self, area_id: u32) -> ActionResult<&'static ExplorationArea> {
        let area =
            ExplorationArea::get(area_id).ok_or_else(|| Rejection::not_found("Area", area_id))?;
        let mut unlocked = self.unlocked_ids()?;
        if unlocked.insert(area_id) {
            self.store.put(
                Collection::Exploration,
                &AreaUnlocksRecord::new(unlocked.into_iter().collect()),
            )?;
            info!("Unlocked {}", area.name);
        }
        Ok(area)
    }

    pub fn state(&self) -> Result<Option<ExplorationState>, StoreError> {
        Ok(self
            .store
            .get::<ExplorationStateRecord>(Collection::Exploration, keys::EXPLORATION_STATE)?
            .map(|r| r.state))
    }

    fn save_state(&self, state: &ExplorationState) -> Result<(), StoreError> {
        self.store.put(
            Collection::Exploration,
            &ExplorationStateRecord::new(state.clone()),
        )?;
        Ok(())
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self
            .store
            .get::<ExplorationHistoryRecord>(Collection::Exploration, keys::EXPLORATION_HISTORY)?
            .map(|r| r.entries)
            .unwrap_or_default())
    }

    /// Begin a run. Energy is checked, not spent.
    pub fn start(&self, area_id: u32, level: u32, energy: i64) -> ActionResult<ExplorationState> {
        let area =
            ExplorationArea::get(area_id).ok_or_else(|| Rejection::not_found("Area", area_id))?;
        if !self.unlocked_ids()?.contains(&area_id) {
            return Err(Rejection::AreaLocked(area.name.to_string()).into());
        }
        if level < area.min_level {
            return Err(Rejection::LevelTooLow {
                required: area.min_level,
            }
            .into());
        }
        if energy < area.energy_cost {
            return Err(Rejection::InsufficientEnergy {
                need: area.energy_cost,
                have: energy,
            }
            .into());
        }
        if self
            .state()?
            .is_some_and(|s| s.status != ExplorationStatus::Claimed)
        {
            return Err(Rejection::ExplorationBusy.into());
        }

        let state = ExplorationState {
            area_id,
            start_time: self.time.now_ms(),
            duration: area.duration_ms,
            status: ExplorationStatus::Exploring,
            energy_cost: area.energy_cost,
            completed_time: None,
            rewards: None,
            events: Vec::new(),
            items: Vec::new(),
        };
        self.save_state(&state)?;
        debug!("Exploring {} for {} ms", area.name, area.duration_ms);
        Ok(state)
    }

    pub fn check_complete(&self) -> Result<bool, StoreError> {
        let now = self.time.now_ms();
        Ok(self
            .state()?
            .is_some_and(|s| s.status == ExplorationStatus::Exploring && s.is_due(now)))
    }

    /// Progress of the running expedition, 0 when none is running
    pub fn progress_percent(&self) -> Result<u8, StoreError> {
        let now = self.time.now_ms();
        Ok(match self.state()? {
            Some(s) if s.status == ExplorationStatus::Exploring => {
                progress_percent((now - s.start_time).max(0) as u64, s.duration)
            }
            _ => 0,
        })
    }

    /// Roll the outcome of a finished run
    pub fn complete<R: Rng + ?Sized>(&self, rng: &mut R) -> ActionResult<ExplorationState> {
        let mut state = self
            .state()?
            .filter(|s| s.status == ExplorationStatus::Exploring)
            .ok_or(Rejection::NotExploring)?;
        let now = self.time.now_ms();
        if !state.is_due(now) {
            return Err(Rejection::StillRunning {
                remaining_ms: state.start_time + state.duration as i64 - now,
            }
            .into());
        }
        let area = ExplorationArea::get(state.area_id)
            .ok_or_else(|| Rejection::not_found("Area", state.area_id))?;

        let rewards = roll_rewards(area, rng);
        state.status = ExplorationStatus::Completed;
        state.completed_time = Some(now);
        state.rewards = Some(rewards);
        state.events = roll_events(area, rng);
        state.items = roll_drops(area, rng);

        let mut history = self.history()?;
        history.push(HistoryEntry {
            id: now,
            area_id: area.id,
            area_name: area.name.to_string(),
            completed_time: now,
            rewards,
            events: state.events.clone(),
            items: state.items.clone(),
        });
        if history.len() > self.history_limit {
            let excess = history.len() - self.history_limit;
            history.drain(..excess);
        }

        self.store.batch(|tx| {
            tx.put(
                Collection::Exploration,
                &ExplorationStateRecord::new(state.clone()),
            )?;
            tx.put(
                Collection::Exploration,
                &ExplorationHistoryRecord::new(history),
            )?;
            Ok(())
        })?;

        info!(
            "Explored {}: {} gold, {} exp, {} events, {} items",
            area.name,
            rewards.gold,
            rewards.experience,
            state.events.len(),
            state.items.len()
        );
        Ok(state)
    }

    /// Pay out a completed run once
    pub fn claim(&self) -> ActionResult<ExplorationClaim> {
        let mut state = self.state()?.ok_or(Rejection::NothingToClaim)?;
        match state.status {
            ExplorationStatus::Exploring => return Err(Rejection::NotCompleted.into()),
            ExplorationStatus::Claimed => return Err(Rejection::AlreadyClaimed.into()),
            ExplorationStatus::Completed => {}
        }
        let base = state.rewards.unwrap_or_default();

        let items: Vec<Equipment> = state
            .items
            .iter()
            .cloned()
            .map(|found| self.armory.prepare(found.into_equipment()))
            .collect();
        state.status = ExplorationStatus::Claimed;
        let claimed = ExplorationStateRecord::new(state.clone());

        // Gold, items and the claimed flag land together
        let grant = self.rewards.grant_task_reward_with(base, EXPLORE_TASK_ID, |tx| {
            for item in &items {
                tx.put(Collection::Equipment, item)?;
            }
            tx.put(Collection::Exploration, &claimed)?;
            Ok(())
        })?;
        debug!("Claimed {} items from area {}", items.len(), state.area_id);

        let report = self.triggers.record_all(&[
            StatEvent::ExplorationCompleted {
                area_id: state.area_id,
            },
            StatEvent::GoldEarned(grant.reward.gold.max(0) as u64),
        ])?;

        Ok(ExplorationClaim {
            area_id: state.area_id,
            grant,
            items,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::context::ManualTime;
    use crate::events::EventManager;
    use crate::ledger::{Ledger, ResourceState};
    use crate::notify::MemoryNotifier;
    use crate::pets::PetKennel;
    use crate::shop::Shop;
    use crate::skills::SkillBook;
    use crate::store::LATEST_VERSION;
    use crate::triggers::DailyBoard;

    struct Fixture {
        store: Store,
        expedition: Expedition,
        ledger: Ledger,
        armory: Armory,
        triggers: TriggerEngine,
        time: Arc<ManualTime>,
    }

    fn fixture(history_limit: usize) -> Fixture {
        let store = Store::open_in_memory(LATEST_VERSION).unwrap();
        let time = Arc::new(ManualTime::new(10_000));
        let notifier = Arc::new(MemoryNotifier::new());
        let ledger = Ledger::new(store.clone(), time.clone());
        ledger.init_if_missing(ResourceState::new_player()).unwrap();

        let rewards = RewardService::new(
            ledger.clone(),
            SkillBook::new(store.clone(), ledger.clone()),
            Shop::new(store.clone(), ledger.clone(), time.clone()),
            EventManager::new(store.clone(), ledger.clone(), notifier.clone(), time.clone(), 50),
            PetKennel::new(store.clone(), notifier.clone(), time.clone()),
        );
        let daily = DailyBoard::new(store.clone(), ledger.clone(), notifier.clone(), time.clone(), 3);
        let triggers = TriggerEngine::new(store.clone(), ledger.clone(), notifier, time.clone(), daily);
        let armory = Armory::new(store.clone(), ledger.clone(), time.clone());
        let expedition = Expedition::new(
            store.clone(),
            rewards,
            armory.clone(),
            triggers.clone(),
            time.clone(),
            history_limit,
        );
        Fixture {
            store,
            expedition,
            ledger,
            armory,
            triggers,
            time,
        }
    }

    #[test]
    fn forest_rewards_stay_in_range() {
        let forest = ExplorationArea::get(1).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let mut seen = BTreeSet::new();
        for _ in 0..2_000 {
            let reward = roll_rewards(forest, &mut rng);
            assert!((10..=30).contains(&reward.gold), "gold {}", reward.gold);
            assert!((5..=15).contains(&reward.experience));
            seen.insert(reward.gold);
        }
        // Both bounds are reachable
        assert!(seen.contains(&10) && seen.contains(&30));
    }

    #[test]
    fn sub_events_follow_their_chances() {
        let forest = ExplorationArea::get(1).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let runs = 20_000;
        let mut battles = 0;
        let mut victories = 0;
        for _ in 0..runs {
            for event in roll_events(forest, &mut rng) {
                if event.kind == SubEventType::Battle {
                    battles += 1;
                    if event.outcome == Some(SubEventOutcome::Victory) {
                        victories += 1;
                    }
                }
            }
        }
        let battle_rate = f64::from(battles) / f64::from(runs);
        assert!((battle_rate - 0.3).abs() < 0.02, "battle rate {battle_rate}");
        let win_rate = f64::from(victories) / f64::from(battles);
        assert!((win_rate - 0.7).abs() < 0.03, "win rate {win_rate}");
    }

    #[test]
    fn full_run_pays_once() {
        let f = fixture(50);
        let mut rng = StdRng::seed_from_u64(1);
        f.expedition.start(1, 1, 50).unwrap();
        assert_eq!(f.expedition.progress_percent().unwrap(), 0);

        f.time.advance(4_000);
        assert_eq!(f.expedition.progress_percent().unwrap(), 50);
        assert!(!f.expedition.check_complete().unwrap());
        assert!(matches!(
            f.expedition.complete(&mut rng).unwrap_err().rejection(),
            Some(Rejection::StillRunning { remaining_ms: 4_000 })
        ));
        assert_eq!(
            f.expedition.claim().unwrap_err().rejection(),
            Some(&Rejection::NotCompleted)
        );

        f.time.advance(4_000);
        assert!(f.expedition.check_complete().unwrap());
        let done = f.expedition.complete(&mut rng).unwrap();
        let rolled = done.rewards.unwrap();

        let claim = f.expedition.claim().unwrap();
        assert_eq!(claim.grant.reward, rolled);
        let after = f.ledger.load().unwrap();
        assert_eq!(after.gold, rolled.gold);
        assert_eq!(after.energy, ResourceState::new_player().energy);
        assert_eq!(f.armory.list().unwrap().len(), done.items.len());
        assert_eq!(claim.items.len(), done.items.len());

        assert_eq!(
            f.expedition.claim().unwrap_err().rejection(),
            Some(&Rejection::AlreadyClaimed)
        );
        assert_eq!(f.ledger.load().unwrap(), after);

        let stats = f.triggers.statistics().unwrap();
        assert_eq!(stats.explorations_completed, 1);
        assert_eq!(stats.gold_earned, rolled.gold as u64);
        assert_eq!(f.expedition.history().unwrap().len(), 1);
    }

    #[test]
    fn failed_claim_keeps_nothing() {
        let f = fixture(50);
        let mut rng = StdRng::seed_from_u64(3);
        f.expedition.start(1, 1, 50).unwrap();
        f.time.advance(8_000);
        f.expedition.complete(&mut rng).unwrap();

        let forest = ExplorationArea::get(1).unwrap();
        let mut state = f.expedition.state().unwrap().unwrap();
        state.items = vec![
            ItemDrop::from_template(&forest.drops[0]),
            ItemDrop::from_template(&forest.drops[0]),
        ];
        f.expedition.save_state(&state).unwrap();
        let before = f.ledger.load().unwrap();

        f.store
            .execute_sql(
                r#"CREATE TRIGGER block_insert BEFORE INSERT ON "exploration"
                   WHEN NEW.id = 'state' BEGIN SELECT RAISE(ABORT, 'blocked'); END;
                   CREATE TRIGGER block_update BEFORE UPDATE ON "exploration"
                   WHEN NEW.id = 'state' BEGIN SELECT RAISE(ABORT, 'blocked'); END;"#,
            )
            .unwrap();
        assert!(f.expedition.claim().unwrap_err().rejection().is_none());
        assert!(f.armory.list().unwrap().is_empty());
        assert_eq!(f.ledger.load().unwrap(), before);
        assert_eq!(
            f.expedition.state().unwrap().unwrap().status,
            ExplorationStatus::Completed
        );

        f.store
            .execute_sql("DROP TRIGGER block_insert; DROP TRIGGER block_update;")
            .unwrap();
        let claim = f.expedition.claim().unwrap();
        assert_eq!(f.armory.list().unwrap().len(), 2);
        assert_eq!(f.ledger.load().unwrap().gold, before.gold + claim.grant.reward.gold);
    }

    #[test]
    fn start_checks_lock_level_energy_and_busy() {
        let f = fixture(50);
        assert_eq!(
            f.expedition.start(2, 10, 100).unwrap_err().rejection(),
            Some(&Rejection::AreaLocked("Barren Peaks".into()))
        );
        f.expedition.unlock_area(2).unwrap();
        assert_eq!(
            f.expedition.start(2, 9, 100).unwrap_err().rejection(),
            Some(&Rejection::LevelTooLow { required: 10 })
        );
        assert_eq!(
            f.expedition.start(1, 1, 14).unwrap_err().rejection(),
            Some(&Rejection::InsufficientEnergy { need: 15, have: 14 })
        );
        assert!(f.expedition.start(42, 1, 100).is_err());

        f.expedition.start(2, 10, 100).unwrap();
        assert_eq!(
            f.expedition.start(1, 10, 100).unwrap_err().rejection(),
            Some(&Rejection::ExplorationBusy)
        );
    }

    #[test]
    fn unlocks_persist_and_filter_by_level() {
        let f = fixture(50);
        let available = f.expedition.available_areas(20).unwrap();
        assert_eq!(available.len(), 3);
        assert!(available[0].unlocked);
        assert!(!available[2].unlocked);

        f.expedition.unlock_area(3).unwrap();
        f.expedition.unlock_area(3).unwrap();
        let areas = f.expedition.areas().unwrap();
        let unlocked: Vec<u32> = areas.iter().filter(|s| s.unlocked).map(|s| s.area.id).collect();
        assert_eq!(unlocked, vec![1, 3]);
    }

    #[test]
    fn history_keeps_the_newest_entries() {
        let f = fixture(3);
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..5 {
            f.expedition.start(1, 1, 100).unwrap();
            f.time.advance(8_000);
            f.expedition.complete(&mut rng).unwrap();
            f.expedition.claim().unwrap();
        }
        let history = f.expedition.history().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].completed_time, 10_000 + 5 * 8_000);
        assert_eq!(f.triggers.statistics().unwrap().explorations_completed, 5);
    }

    #[test]
    fn complete_without_run_is_rejected() {
        let f = fixture(50);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            f.expedition.complete(&mut rng).unwrap_err().rejection(),
            Some(&Rejection::NotExploring)
        );
        assert_eq!(
            f.expedition.claim().unwrap_err().rejection(),
            Some(&Rejection::NothingToClaim)
        );
    }
}
