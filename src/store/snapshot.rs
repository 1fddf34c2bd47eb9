//! Record shapes written to the save database
//!
//! Aggregates live under fixed keys; entity collections (skills, pets,
//! equipment, notifications) hold one record per entity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::equipment::EquipmentType;
use crate::events::ActiveEvent;
use crate::exploration::{ExplorationState, HistoryEntry};
use crate::ledger::ResourceState;
use crate::notify::NotificationKind;
use crate::shop::{ActiveBoost, PermanentEffect};
use crate::tasks::ActiveTask;
use crate::triggers::Statistics;
use crate::triggers::daily::DailyTask;

/// Fixed keys of singleton records
pub mod keys {
    pub const GAME_STATE: &str = "current";
    pub const ACTIVE_TASK: &str = "activeTask";
    pub const USER_SETTINGS: &str = "userSettings";
    pub const SHOP_STATE: &str = "shopState";
    pub const PERMANENT_EFFECTS: &str = "permanentEffects";
    pub const ACTIVE_EVENTS: &str = "activeEvents";
    pub const EVENT_HISTORY: &str = "eventHistory";
    pub const STATISTICS: &str = "stats";
    pub const DAILY_TASKS: &str = "dailyTasks";
    pub const EQUIPPED: &str = "equipped";
    pub const AREA_UNLOCKS: &str = "areas";
    pub const EXPLORATION_STATE: &str = "state";
    pub const EXPLORATION_HISTORY: &str = "history";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesRecord {
    pub gold: i64,
    pub experience: i64,
    pub energy: i64,
}

/// `gameState/current`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateRecord {
    pub id: String,
    pub resources: ResourcesRecord,
    pub level: u32,
    pub last_updated: i64,
    /// Anchor for passive energy regeneration
    #[serde(default)]
    pub last_regen_at: i64,
}

impl GameStateRecord {
    pub fn new(state: &ResourceState, now: i64, last_regen_at: i64) -> Self {
        Self {
            id: keys::GAME_STATE.to_string(),
            resources: ResourcesRecord {
                gold: state.gold,
                experience: state.experience,
                energy: state.energy,
            },
            level: state.level,
            last_updated: now,
            last_regen_at,
        }
    }

    pub fn state(&self) -> ResourceState {
        ResourceState {
            gold: self.resources.gold,
            experience: self.resources.experience,
            energy: self.resources.energy,
            level: self.level,
        }
    }
}

/// `gameState/activeTask`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTaskRecord {
    pub id: String,
    pub task: ActiveTask,
}

impl ActiveTaskRecord {
    pub fn new(task: ActiveTask) -> Self {
        Self {
            id: keys::ACTIVE_TASK.to_string(),
            task,
        }
    }
}

/// `settings/userSettings`, free-form key/value pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRecord {
    pub id: String,
    pub last_updated: i64,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

/// One record per upgraded skill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRecord {
    pub id: String,
    pub current_level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStockRecord {
    pub id: String,
    pub purchased: u32,
}

/// `shop/shopState`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopStateRecord {
    pub id: String,
    pub items: Vec<ItemStockRecord>,
    pub active_boosts: Vec<ActiveBoost>,
    pub last_updated: i64,
}

impl ShopStateRecord {
    pub fn empty() -> Self {
        Self {
            id: keys::SHOP_STATE.to_string(),
            ..Default::default()
        }
    }

    pub fn purchased(&self, item_id: &str) -> u32 {
        self.items
            .iter()
            .find(|i| i.id == item_id)
            .map(|i| i.purchased)
            .unwrap_or(0)
    }
}

/// `shop/permanentEffects`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermanentEffectsRecord {
    pub id: String,
    pub effects: Vec<PermanentEffect>,
}

impl PermanentEffectsRecord {
    pub fn new(effects: Vec<PermanentEffect>) -> Self {
        Self {
            id: keys::PERMANENT_EFFECTS.to_string(),
            effects,
        }
    }
}

/// `events/activeEvents` and `events/eventHistory`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListRecord {
    pub id: String,
    pub events: Vec<ActiveEvent>,
    pub last_updated: i64,
}

impl EventListRecord {
    pub fn new(key: &str, events: Vec<ActiveEvent>, now: i64) -> Self {
        Self {
            id: key.to_string(),
            events,
            last_updated: now,
        }
    }
}

/// One record per achievement that has been completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementRecord {
    pub id: String,
    pub completed: bool,
    pub reward_claimed: bool,
    #[serde(default)]
    pub completed_at: Option<i64>,
}

/// `achievements/stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRecord {
    pub id: String,
    pub data: Statistics,
}

impl StatisticsRecord {
    pub fn new(data: Statistics) -> Self {
        Self {
            id: keys::STATISTICS.to_string(),
            data,
        }
    }
}

/// `dailyTasks/dailyTasks`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTasksRecord {
    pub id: String,
    pub tasks: Vec<DailyTask>,
    pub last_refresh_time: i64,
    pub last_updated: i64,
}

/// One record per notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub icon: String,
    #[serde(default)]
    pub data: Option<Value>,
    pub timestamp: i64,
    pub read: bool,
}

/// `equipment/equipped`, slot type to item id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquippedRecord {
    pub id: String,
    pub slots: BTreeMap<EquipmentType, String>,
}

impl EquippedRecord {
    pub fn new(slots: BTreeMap<EquipmentType, String>) -> Self {
        Self {
            id: keys::EQUIPPED.to_string(),
            slots,
        }
    }
}

/// `exploration/areas`, ids of areas unlocked beyond the defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaUnlocksRecord {
    pub id: String,
    pub unlocked: Vec<u32>,
}

impl AreaUnlocksRecord {
    pub fn new(unlocked: Vec<u32>) -> Self {
        Self {
            id: keys::AREA_UNLOCKS.to_string(),
            unlocked,
        }
    }
}

/// `exploration/state`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationStateRecord {
    pub id: String,
    pub state: ExplorationState,
}

impl ExplorationStateRecord {
    pub fn new(state: ExplorationState) -> Self {
        Self {
            id: keys::EXPLORATION_STATE.to_string(),
            state,
        }
    }
}

/// `exploration/history`, newest last
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationHistoryRecord {
    pub id: String,
    pub entries: Vec<HistoryEntry>,
}

impl ExplorationHistoryRecord {
    pub fn new(entries: Vec<HistoryEntry>) -> Self {
        Self {
            id: keys::EXPLORATION_HISTORY.to_string(),
            entries,
        }
    }
}
