//! Game facade
//!
//! Wires every manager to one [`GameContext`] and exposes the handful of
//! operations that span several of them.

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::context::GameContext;
use crate::equipment::Armory;
use crate::error::{ActionResult, StoreError};
use crate::events::EventManager;
use crate::exploration::{ExplorationState, Expedition};
use crate::ledger::{Ledger, ResourceState};
use crate::pets::PetKennel;
use crate::rewards::RewardService;
use crate::shop::Shop;
use crate::skills::SkillBook;
use crate::store::export::{self, ExportDocument};
use crate::store::snapshot::{SettingsRecord, keys};
use crate::store::{Collection, Store};
use crate::tasks::TaskRunner;
use crate::triggers::{AchievementDef, DailyBoard, TriggerEngine};

#[derive(Clone)]
pub struct Game {
    ctx: GameContext,
    pub skills: SkillBook,
    pub shop: Shop,
    pub events: EventManager,
    pub pets: PetKennel,
    pub armory: Armory,
    pub triggers: TriggerEngine,
    pub rewards: RewardService,
    pub tasks: TaskRunner,
    pub exploration: Expedition,
}

impl Game {
    pub fn new(ctx: GameContext) -> Self {
        let GameContext {
            store,
            ledger,
            notifier,
            time,
            clock,
            gameplay,
        } = ctx.clone();

        let skills = SkillBook::new(store.clone(), ledger.clone());
        let shop = Shop::new(store.clone(), ledger.clone(), time.clone());
        let events = EventManager::new(
            store.clone(),
            ledger.clone(),
            notifier.clone(),
            time.clone(),
            gameplay.event_history_limit,
        );
        let pets = PetKennel::new(store.clone(), notifier.clone(), time.clone());
        let armory = Armory::new(store.clone(), ledger.clone(), time.clone());
        let daily = DailyBoard::new(
            store.clone(),
            ledger.clone(),
            notifier.clone(),
            time.clone(),
            gameplay.daily_task_count,
        );
        let triggers = TriggerEngine::new(store.clone(), ledger.clone(), notifier, time.clone(), daily);
        let rewards = RewardService::new(
            ledger.clone(),
            skills.clone(),
            shop.clone(),
            events.clone(),
            pets.clone(),
        );
        let tasks = TaskRunner::new(
            store.clone(),
            ledger,
            rewards.clone(),
            events.clone(),
            triggers.clone(),
            clock,
            time.clone(),
        );
        let exploration = Expedition::new(
            store,
            rewards.clone(),
            armory.clone(),
            triggers.clone(),
            time,
            gameplay.exploration_history_limit,
        );

        Self {
            ctx,
            skills,
            shop,
            events,
            pets,
            armory,
            triggers,
            rewards,
            tasks,
            exploration,
        }
    }

    pub fn context(&self) -> &GameContext {
        &self.ctx
    }

    pub fn store(&self) -> &Store {
        &self.ctx.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ctx.ledger
    }

    pub fn daily(&self) -> &DailyBoard {
        self.triggers.daily()
    }

    /// Create the starting resources on first launch
    pub fn ensure_started(&self) -> Result<ResourceState, StoreError> {
        self.ctx.ledger.init_if_missing(ResourceState::new_player())
    }

    /// Set the level from the outside leveling rules and re-check
    /// level-gated achievements
    pub fn set_level(&self, level: u32) -> ActionResult<Vec<&'static AchievementDef>> {
        let state = self.ctx.ledger.require()?;
        self.ctx.ledger.try_save(&ResourceState { level, ..state })?;
        debug!(level, "Level set");
        Ok(self.triggers.check_achievements()?)
    }

    /// Apply passive regeneration for the elapsed whole minutes
    pub fn regenerate_energy(&self) -> Result<i64, StoreError> {
        let rate = self.rewards.sources()?.energy_regen_rate();
        self.ctx.ledger.regenerate(rate)
    }

    /// Start an expedition with the player's current level and energy
    pub fn start_exploration(&self, area_id: u32) -> ActionResult<ExplorationState> {
        let state = self.ctx.ledger.require()?;
        self.exploration.start(area_id, state.level, state.energy)
    }

    pub fn save_settings(&self, values: Map<String, Value>) -> Result<(), StoreError> {
        self.ctx.store.put(
            Collection::Settings,
            &SettingsRecord {
                id: keys::USER_SETTINGS.to_string(),
                last_updated: self.ctx.time.now_ms(),
                values,
            },
        )?;
        Ok(())
    }

    pub fn load_settings(&self) -> Result<Option<Map<String, Value>>, StoreError> {
        Ok(self
            .ctx
            .store
            .get::<SettingsRecord>(Collection::Settings, keys::USER_SETTINGS)?
            .map(|r| r.values))
    }

    /// Snapshot of the save, `None` before the first launch
    pub fn export(&self) -> Result<Option<ExportDocument>, StoreError> {
        export::export(&self.ctx.store, self.ctx.time.now_ms())
    }

    pub fn import(&self, json: &str) -> ActionResult<usize> {
        export::import(&self.ctx.store, json)
    }

    /// Wipe the save; the schema stays in place
    pub fn reset(&self) -> Result<(), StoreError> {
        self.ctx.clock.cancel();
        self.ctx.store.reset_all()?;
        info!("Game reset");
        Ok(())
    }
}
