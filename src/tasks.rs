//! Timed tasks
//!
//! The player runs one timed task at a time: energy is paid up front, the
//! reward is claimed once the duration has elapsed. The active task is
//! stored as `gameState/activeTask`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{ClockRequest, ProgressClock, progress_percent};
use crate::context::TimeSource;
use crate::error::{ActionResult, Rejection, StoreError};
use crate::events::{EventEffect, EventManager, TaskEffectKind};
use crate::ledger::{Ledger, ResourceState};
use crate::modifiers::Reward;
use crate::rewards::{Grant, RewardService};
use crate::store::snapshot::{ActiveTaskRecord, keys};
use crate::store::{Collection, Store};
use crate::triggers::{StatEvent, TriggerEngine, TriggerReport};

pub const GATHER_TASK_ID: u32 = 1;
pub const EXPLORE_TASK_ID: u32 = 2;
pub const COMBAT_TASK_ID: u32 = 3;

#[derive(Debug, PartialEq)]
pub struct TimedTask {
    pub id: u32,
    pub name: &'static str,
    pub min_level: u32,
    pub energy_cost: i64,
    pub duration_ms: u64,
    pub reward: Reward,
}

impl TimedTask {
    pub fn get(id: u32) -> Option<&'static TimedTask> {
        TIMED_TASKS.iter().find(|t| t.id == id)
    }
}

pub static TIMED_TASKS: &[TimedTask] = &[
    TimedTask {
        id: GATHER_TASK_ID,
        name: "Gather resources",
        min_level: 1,
        energy_cost: 10,
        duration_ms: 5_000,
        reward: Reward::new(10, 5),
    },
    TimedTask {
        id: EXPLORE_TASK_ID,
        name: "Explore the map",
        min_level: 3,
        energy_cost: 20,
        duration_ms: 10_000,
        reward: Reward::new(25, 15),
    },
    TimedTask {
        id: COMBAT_TASK_ID,
        name: "Defeat monsters",
        min_level: 5,
        energy_cost: 30,
        duration_ms: 15_000,
        reward: Reward::new(50, 30),
    },
];

/// The running timed task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTask {
    pub task_id: u32,
    pub start_time: i64,
    /// Effective duration after speed modifiers
    pub duration: u64,
    pub energy_spent: i64,
}

impl ActiveTask {
    pub fn is_complete(&self, now: i64) -> bool {
        now - self.start_time >= self.duration as i64
    }

    pub fn remaining_ms(&self, now: i64) -> i64 {
        (self.start_time + self.duration as i64 - now).max(0)
    }

    pub fn progress_percent(&self, now: i64) -> u8 {
        progress_percent((now - self.start_time).max(0) as u64, self.duration)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskClaim {
    pub task_id: u32,
    pub grant: Grant,
    pub report: TriggerReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskStart {
    pub task: ActiveTask,
    pub resources: ResourceState,
    pub report: TriggerReport,
}

#[derive(Clone)]
pub struct TaskRunner {
    store: Store,
    ledger: Ledger,
    rewards: RewardService,
    events: EventManager,
    triggers: TriggerEngine,
    clock: Arc<dyn ProgressClock>,
    time: Arc<dyn TimeSource>,
}

impl TaskRunner {
    pub fn new(
        store: Store,
        ledger: Ledger,
        rewards: RewardService,
        events: EventManager,
        triggers: TriggerEngine,
        clock: Arc<dyn ProgressClock>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            store,
            ledger,
            rewards,
            events,
            triggers,
            clock,
            time,
        }
    }

    pub fn active(&self) -> Result<Option<ActiveTask>, StoreError> {
        Ok(self
            .store
            .get::<ActiveTaskRecord>(Collection::GameState, keys::ACTIVE_TASK)?
            .map(|r| r.task))
    }

    /// Start a task, replacing any running one without refund
    pub fn start(&self, task_id: u32) -> ActionResult<TaskStart> {
        let task = TimedTask::get(task_id).ok_or_else(|| Rejection::not_found("Task", task_id))?;
        let state = self.ledger.require()?;
        if state.level < task.min_level {
            return Err(Rejection::LevelTooLow {
                required: task.min_level,
            }
            .into());
        }

        let sources = self.rewards.sources()?;
        let cost = sources.effective_energy_cost(task.energy_cost);
        if state.energy < cost {
            return Err(Rejection::InsufficientEnergy {
                need: cost,
                have: state.energy,
            }
            .into());
        }

        self.clock.cancel();
        let resources = self.ledger.try_save(&ResourceState {
            energy: state.energy - cost,
            ..state
        })?;

        let speed_event = self.events.consume_task_effect(TaskEffectKind::TaskSpeed)?;
        let event_speed = speed_event.and_then(|e| match e.effect {
            EventEffect::TaskSpeed { value } => Some(value),
            _ => None,
        });
        let active = ActiveTask {
            task_id,
            start_time: self.time.now_ms(),
            duration: sources.effective_duration(task.duration_ms, event_speed),
            energy_spent: cost,
        };
        self.store
            .put(Collection::GameState, &ActiveTaskRecord::new(active.clone()))?;

        let report = self.triggers.record(StatEvent::EnergySpent(cost as u64))?;
        self.clock.start(ClockRequest {
            task_id: task_id.to_string(),
            duration_ms: active.duration,
            initial_progress: None,
        });

        debug!(task_id, duration = active.duration, cost, "Task started");
        Ok(TaskStart {
            task: active,
            resources,
            report,
        })
    }

    /// Whether the running task's duration has elapsed
    pub fn check_complete(&self) -> Result<bool, StoreError> {
        let now = self.time.now_ms();
        Ok(self.active()?.is_some_and(|t| t.is_complete(now)))
    }

    pub fn claim(&self) -> ActionResult<TaskClaim> {
        let active = self.active()?.ok_or(Rejection::NothingToClaim)?;
        let now = self.time.now_ms();
        if !active.is_complete(now) {
            return Err(Rejection::StillRunning {
                remaining_ms: active.remaining_ms(now),
            }
            .into());
        }
        let task = TimedTask::get(active.task_id)
            .ok_or_else(|| Rejection::not_found("Task", active.task_id))?;

        let grant = self.rewards.grant_task_reward(task.reward, task.id)?;
        self.store.delete(Collection::GameState, keys::ACTIVE_TASK)?;

        let report = self.triggers.record_all(&[
            StatEvent::TaskCompleted {
                task_id: Some(task.id),
            },
            StatEvent::GoldEarned(grant.reward.gold.max(0) as u64),
        ])?;

        info!("{} done: +{} gold, +{} exp", task.name, grant.reward.gold, grant.reward.experience);
        Ok(TaskClaim {
            task_id: task.id,
            grant,
            report,
        })
    }

    /// Stop the running task without reward or refund
    pub fn cancel(&self) -> Result<bool, StoreError> {
        self.clock.cancel();
        if self.active()?.is_none() {
            return Ok(false);
        }
        self.store.delete(Collection::GameState, keys::ACTIVE_TASK)?;
        debug!("Task cancelled");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::NoopProgressClock;
    use crate::context::ManualTime;
    use crate::events::GameEvent;
    use crate::notify::MemoryNotifier;
    use crate::pets::PetKennel;
    use crate::shop::Shop;
    use crate::skills::SkillBook;
    use crate::store::LATEST_VERSION;
    use crate::triggers::DailyBoard;

    struct Fixture {
        runner: TaskRunner,
        ledger: Ledger,
        events: EventManager,
        time: Arc<ManualTime>,
    }

    fn fixture(state: ResourceState) -> Fixture {
        let store = Store::open_in_memory(LATEST_VERSION).unwrap();
        let time = Arc::new(ManualTime::new(1_000));
        let notifier = Arc::new(MemoryNotifier::new());
        let ledger = Ledger::new(store.clone(), time.clone());
        ledger.init_if_missing(state).unwrap();

        let events = EventManager::new(store.clone(), ledger.clone(), notifier.clone(), time.clone(), 50);
        let rewards = RewardService::new(
            ledger.clone(),
            SkillBook::new(store.clone(), ledger.clone()),
            Shop::new(store.clone(), ledger.clone(), time.clone()),
            events.clone(),
            PetKennel::new(store.clone(), notifier.clone(), time.clone()),
        );
        let daily = DailyBoard::new(store.clone(), ledger.clone(), notifier.clone(), time.clone(), 3);
        let triggers = TriggerEngine::new(store.clone(), ledger.clone(), notifier, time.clone(), daily);
        let runner = TaskRunner::new(
            store,
            ledger.clone(),
            rewards,
            events.clone(),
            triggers,
            Arc::new(NoopProgressClock::new()),
            time.clone(),
        );
        Fixture {
            runner,
            ledger,
            events,
            time,
        }
    }

    fn player(energy: i64, level: u32) -> ResourceState {
        ResourceState {
            energy,
            level,
            ..ResourceState::new_player()
        }
    }

    #[test]
    fn start_pays_energy_and_claim_pays_reward_once() {
        let f = fixture(player(50, 1));
        let started = f.runner.start(GATHER_TASK_ID).unwrap();
        assert_eq!(started.resources.energy, 40);
        assert_eq!(started.task.duration, 5_000);

        let err = f.runner.claim().unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&Rejection::StillRunning { remaining_ms: 5_000 })
        );

        f.time.advance(5_000);
        assert!(f.runner.check_complete().unwrap());
        let claim = f.runner.claim().unwrap();
        assert_eq!(claim.grant.reward, Reward::new(10, 5));
        let after = f.ledger.load().unwrap();
        assert_eq!((after.gold, after.experience), (10, 5));

        assert_eq!(
            f.runner.claim().unwrap_err().rejection(),
            Some(&Rejection::NothingToClaim)
        );
        assert_eq!(f.ledger.load().unwrap(), after);
    }

    #[test]
    fn start_checks_level_and_energy() {
        let f = fixture(player(5, 1));
        assert_eq!(
            f.runner.start(COMBAT_TASK_ID).unwrap_err().rejection(),
            Some(&Rejection::LevelTooLow { required: 5 })
        );
        assert_eq!(
            f.runner.start(GATHER_TASK_ID).unwrap_err().rejection(),
            Some(&Rejection::InsufficientEnergy { need: 10, have: 5 })
        );
        assert!(f.runner.start(99).is_err());
        assert!(f.runner.active().unwrap().is_none());
    }

    #[test]
    fn speed_event_is_consumed_by_start() {
        let f = fixture(player(100, 3));
        let speedup = GameEvent::get("task_speedup").unwrap();
        arm(&f.events, speedup);

        let started = f.runner.start(EXPLORE_TASK_ID).unwrap();
        assert_eq!(started.task.duration, 6_667);
        assert!(f.events.active_events().unwrap().is_empty());

        // Next start runs at normal speed
        let again = f.runner.start(GATHER_TASK_ID).unwrap();
        assert_eq!(again.task.duration, 5_000);
    }

    #[test]
    fn multiplier_event_doubles_one_claim() {
        let f = fixture(player(100, 3));
        arm(&f.events, GameEvent::get("double_reward").unwrap());
        arm(&f.events, GameEvent::get("double_reward").unwrap());

        f.runner.start(GATHER_TASK_ID).unwrap();
        f.time.advance(5_000);
        let claim = f.runner.claim().unwrap();
        assert_eq!(claim.grant.multiplier, Some(2.0));
        assert_eq!(claim.grant.reward, Reward::new(20, 10));
        assert_eq!(f.events.active_events().unwrap().len(), 1);
    }

    #[test]
    fn claim_feeds_statistics() {
        let f = fixture(player(100, 1));
        f.runner.start(GATHER_TASK_ID).unwrap();
        f.time.advance(6_000);
        f.runner.claim().unwrap();

        let stats = f.runner.triggers.statistics().unwrap();
        assert_eq!(stats.energy_spent, 10);
        assert_eq!(stats.tasks_completed, 1);
        assert_eq!(stats.task_count(GATHER_TASK_ID), 1);
        assert_eq!(stats.gold_earned, 10);
    }

    #[test]
    fn cancel_drops_task_without_refund() {
        let f = fixture(player(100, 1));
        f.runner.start(GATHER_TASK_ID).unwrap();
        assert!(f.runner.cancel().unwrap());
        assert!(!f.runner.cancel().unwrap());
        assert_eq!(f.ledger.load().unwrap().energy, 90);
        assert!(!f.runner.check_complete().unwrap());
    }

    fn arm(events: &EventManager, event: &GameEvent) {
        let mut active = events.active_events().unwrap();
        active.push(crate::events::ActiveEvent {
            id: event.id.to_string(),
            name: event.name.to_string(),
            polarity: event.polarity,
            effect: event.effect,
            timestamp: active.len() as i64,
        });
        events.replace_active(active).unwrap();
    }
}
