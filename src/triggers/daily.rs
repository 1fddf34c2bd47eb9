//! Daily tasks
//!
//! A small rotating set of goals, regenerated whenever the UTC hour bucket
//! changes. Targets and rewards scale with how far the player is above a
//! template's minimum level.

use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::TriggerReport;
use crate::context::TimeSource;
use crate::error::{ActionResult, Rejection, StoreError};
use crate::ledger::{Ledger, ResourceState};
use crate::modifiers::Reward;
use crate::notify::{NewNotification, NotificationKind, NotificationSink};
use crate::store::snapshot::{DailyTasksRecord, keys};
use crate::store::{Collection, Store};
use crate::tasks::{COMBAT_TASK_ID, EXPLORE_TASK_ID, GATHER_TASK_ID};
use crate::time_bucket::same_hour_bucket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyTaskType {
    GoldCollect,
    CompleteTasks,
    SpendEnergy,
    SpecificTask,
}

/// Kind of progress a gameplay action produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Gold,
    TasksCompleted,
    EnergySpent,
}

impl DailyTaskType {
    fn tracks(&self, kind: ProgressKind) -> bool {
        matches!(
            (self, kind),
            (DailyTaskType::GoldCollect, ProgressKind::Gold)
                | (DailyTaskType::CompleteTasks, ProgressKind::TasksCompleted)
                | (DailyTaskType::SpecificTask, ProgressKind::TasksCompleted)
                | (DailyTaskType::SpendEnergy, ProgressKind::EnergySpent)
        )
    }
}

#[derive(Debug, PartialEq)]
pub struct DailyTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub task_type: DailyTaskType,
    pub task_id: Option<u32>,
    pub min_level: u32,
    pub base_target: u64,
    pub reward: Reward,
}

pub static DAILY_TEMPLATES: &[DailyTemplate] = &[
    DailyTemplate {
        id: "daily_gold",
        name: "Gold Digger",
        description: "Collect gold",
        task_type: DailyTaskType::GoldCollect,
        task_id: None,
        min_level: 1,
        base_target: 50,
        reward: Reward::new(30, 15),
    },
    DailyTemplate {
        id: "daily_tasks",
        name: "Busy Day",
        description: "Complete tasks",
        task_type: DailyTaskType::CompleteTasks,
        task_id: None,
        min_level: 1,
        base_target: 3,
        reward: Reward::new(25, 20),
    },
    DailyTemplate {
        id: "daily_energy",
        name: "Hard Worker",
        description: "Spend energy",
        task_type: DailyTaskType::SpendEnergy,
        task_id: None,
        min_level: 2,
        base_target: 30,
        reward: Reward::new(20, 25),
    },
    DailyTemplate {
        id: "daily_mining",
        name: "Gatherer",
        description: "Gather resources",
        task_type: DailyTaskType::SpecificTask,
        task_id: Some(GATHER_TASK_ID),
        min_level: 1,
        base_target: 2,
        reward: Reward::new(15, 10),
    },
    DailyTemplate {
        id: "daily_explore",
        name: "Wanderer",
        description: "Explore the map",
        task_type: DailyTaskType::SpecificTask,
        task_id: Some(EXPLORE_TASK_ID),
        min_level: 5,
        base_target: 2,
        reward: Reward::new(30, 20),
    },
    DailyTemplate {
        id: "daily_combat",
        name: "Monster Hunter",
        description: "Defeat monsters",
        task_type: DailyTaskType::SpecificTask,
        task_id: Some(COMBAT_TASK_ID),
        min_level: 10,
        base_target: 1,
        reward: Reward::new(50, 30),
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTask {
    pub id: String,
    pub template_id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub task_type: DailyTaskType,
    #[serde(default)]
    pub task_id: Option<u32>,
    pub target: u64,
    pub progress: u64,
    pub reward: Reward,
    pub completed: bool,
    pub claimed: bool,
}

impl DailyTask {
    fn matches(&self, kind: ProgressKind, task_id: Option<u32>) -> bool {
        if !self.task_type.tracks(kind) {
            return false;
        }
        match self.task_type {
            DailyTaskType::SpecificTask => task_id.is_some() && self.task_id == task_id,
            _ => true,
        }
    }
}

fn level_gap(level: u32, min_level: u32) -> f64 {
    f64::from(level.saturating_sub(min_level))
}

/// `ceil(base * max(1, gap/5 + 1))`
pub fn scale_target(base: u64, level: u32, min_level: u32) -> u64 {
    let multiplier = (level_gap(level, min_level) / 5.0 + 1.0).max(1.0);
    (base as f64 * multiplier).ceil() as u64
}

/// `ceil(r * max(1, gap/10 + 1))` per resource
pub fn scale_reward(reward: Reward, level: u32, min_level: u32) -> Reward {
    let multiplier = (level_gap(level, min_level) / 10.0 + 1.0).max(1.0);
    Reward {
        gold: (reward.gold as f64 * multiplier).ceil() as i64,
        experience: (reward.experience as f64 * multiplier).ceil() as i64,
    }
}

/// Pick up to `count` distinct eligible templates and instantiate them
pub fn generate_tasks<R: Rng + ?Sized>(level: u32, now: i64, count: usize, rng: &mut R) -> Vec<DailyTask> {
    let mut eligible: Vec<&DailyTemplate> = DAILY_TEMPLATES
        .iter()
        .filter(|t| t.min_level <= level)
        .collect();
    eligible.shuffle(rng);

    eligible
        .into_iter()
        .take(count)
        .map(|t| DailyTask {
            id: format!("{}_{}", t.id, now),
            template_id: t.id.to_string(),
            name: t.name.to_string(),
            description: t.description.to_string(),
            task_type: t.task_type,
            task_id: t.task_id,
            target: scale_target(t.base_target, level, t.min_level),
            progress: 0,
            reward: scale_reward(t.reward, level, t.min_level),
            completed: false,
            claimed: false,
        })
        .collect()
}

/// Add progress to matching open tasks. Returns the tasks completed by this call.
pub fn apply_progress(
    tasks: &mut [DailyTask],
    kind: ProgressKind,
    amount: u64,
    task_id: Option<u32>,
) -> Vec<DailyTask> {
    let mut newly_completed = Vec::new();
    for task in tasks.iter_mut().filter(|t| !t.completed && t.matches(kind, task_id)) {
        task.progress += amount;
        if task.progress >= task.target {
            task.completed = true;
            newly_completed.push(task.clone());
        }
    }
    newly_completed
}

/// No tasks yet, or `now` is in a different UTC hour than the last refresh
pub fn needs_refresh(record: Option<&DailyTasksRecord>, now: i64) -> bool {
    match record {
        Some(r) if !r.tasks.is_empty() => !same_hour_bucket(r.last_refresh_time, now),
        _ => true,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyClaim {
    pub task: DailyTask,
    pub resources: ResourceState,
    /// Achievements and tasks unlocked by the claimed gold
    pub report: TriggerReport,
}

#[derive(Clone)]
pub struct DailyBoard {
    store: Store,
    ledger: Ledger,
    notifier: Arc<dyn NotificationSink>,
    time: Arc<dyn TimeSource>,
    task_count: usize,
}

impl DailyBoard {
    pub fn new(
        store: Store,
        ledger: Ledger,
        notifier: Arc<dyn NotificationSink>,
        time: Arc<dyn TimeSource>,
        task_count: usize,
    ) -> Self {
        Self {
            store,
            ledger,
            notifier,
            time,
            task_count,
        }
    }

    fn record(&self) -> Result<Option<DailyTasksRecord>, StoreError> {
        self.store.get(Collection::DailyTasks, keys::DAILY_TASKS)
    }

    fn write(&self, tasks: Vec<DailyTask>, last_refresh_time: i64) -> Result<(), StoreError> {
        self.store.put(
            Collection::DailyTasks,
            &DailyTasksRecord {
                id: keys::DAILY_TASKS.to_string(),
                tasks,
                last_refresh_time,
                last_updated: self.time.now_ms(),
            },
        )?;
        Ok(())
    }

    pub fn tasks(&self) -> Result<Vec<DailyTask>, StoreError> {
        Ok(self.record()?.map(|r| r.tasks).unwrap_or_default())
    }

    pub fn needs_refresh(&self) -> Result<bool, StoreError> {
        Ok(needs_refresh(self.record()?.as_ref(), self.time.now_ms()))
    }

    /// Regenerate tasks if the hour bucket changed. Returns the new list when
    /// a refresh happened.
    pub fn refresh<R: Rng + ?Sized>(&self, rng: &mut R) -> ActionResult<Option<Vec<DailyTask>>> {
        if !self.needs_refresh()? {
            debug!("Daily tasks still fresh");
            return Ok(None);
        }
        self.force_refresh(rng).map(Some)
    }

    /// Regenerate tasks unconditionally
    pub fn force_refresh<R: Rng + ?Sized>(&self, rng: &mut R) -> ActionResult<Vec<DailyTask>> {
        let level = self.ledger.require()?.level;
        let now = self.time.now_ms();
        let tasks = generate_tasks(level, now, self.task_count, rng);
        self.write(tasks.clone(), now)?;

        info!("Daily tasks refreshed ({} tasks)", tasks.len());
        self.notifier.create_notification(NewNotification::new(
            NotificationKind::DailyTask,
            "New daily tasks",
            format!("{} new daily tasks are available", tasks.len()),
        ));
        Ok(tasks)
    }

    /// Feed progress into the current tasks. Returns the tasks completed by
    /// this update.
    pub fn update_progress(
        &self,
        kind: ProgressKind,
        amount: u64,
        task_id: Option<u32>,
    ) -> Result<Vec<DailyTask>, StoreError> {
        let Some(mut record) = self.record()? else {
            return Ok(Vec::new());
        };
        let before = record.tasks.clone();
        let completed = apply_progress(&mut record.tasks, kind, amount, task_id);
        if record.tasks == before {
            return Ok(completed);
        }
        self.write(record.tasks, record.last_refresh_time)?;

        for task in &completed {
            info!("Daily task completed: {}", task.name);
            self.notifier.create_notification(
                NewNotification::new(
                    NotificationKind::DailyTask,
                    "Daily task completed",
                    format!("{} is done, claim your reward", task.name),
                )
                .with_data(serde_json::json!({ "taskId": task.id })),
            );
        }
        Ok(completed)
    }

    /// Pay out a completed task. Statistics are counted by
    /// [`TriggerEngine::claim_daily`](super::TriggerEngine::claim_daily).
    pub(super) fn claim(&self, task_id: &str) -> ActionResult<DailyClaim> {
        let mut record = self
            .record()?
            .ok_or_else(|| Rejection::not_found("Daily task", task_id))?;
        let index = record
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| Rejection::not_found("Daily task", task_id))?;

        let task = &record.tasks[index];
        if !task.completed {
            return Err(Rejection::NotCompleted.into());
        }
        if task.claimed {
            return Err(Rejection::AlreadyClaimed.into());
        }

        // Ledger first, the claimed flag is the last write
        let resources = self.ledger.credit(task.reward)?;
        record.tasks[index].claimed = true;
        let task = record.tasks[index].clone();
        self.write(record.tasks, record.last_refresh_time)?;

        Ok(DailyClaim {
            task,
            resources,
            report: TriggerReport::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::context::ManualTime;
    use crate::notify::MemoryNotifier;
    use crate::store::LATEST_VERSION;

    // 2024-05-01T10:00:00Z
    const TEN_AM: i64 = 1_714_557_600_000;

    fn board(level: u32) -> (DailyBoard, Ledger, Arc<ManualTime>, Arc<MemoryNotifier>) {
        let store = Store::open_in_memory(LATEST_VERSION).unwrap();
        let time = Arc::new(ManualTime::new(TEN_AM));
        let ledger = Ledger::new(store.clone(), time.clone());
        ledger
            .init_if_missing(ResourceState {
                level,
                ..ResourceState::new_player()
            })
            .unwrap();
        let notifier = Arc::new(MemoryNotifier::new());
        let board = DailyBoard::new(store, ledger.clone(), notifier.clone(), time.clone(), 3);
        (board, ledger, time, notifier)
    }

    fn task(task_type: DailyTaskType, task_id: Option<u32>, target: u64) -> DailyTask {
        DailyTask {
            id: "t".into(),
            template_id: "t".into(),
            name: "t".into(),
            description: String::new(),
            task_type,
            task_id,
            target,
            progress: 0,
            reward: Reward::new(10, 5),
            completed: false,
            claimed: false,
        }
    }

    #[test]
    fn scaling_formulas() {
        assert_eq!(scale_target(50, 1, 1), 50);
        assert_eq!(scale_target(50, 6, 1), 100);
        assert_eq!(scale_target(3, 8, 1), 8);
        assert_eq!(scale_reward(Reward::new(30, 15), 6, 1), Reward::new(45, 23));
        assert_eq!(scale_reward(Reward::new(30, 15), 1, 1), Reward::new(30, 15));
    }

    #[test]
    fn generated_tasks_are_distinct_and_eligible() {
        let mut rng = StdRng::seed_from_u64(42);
        for level in [1, 2, 5, 10, 40] {
            let tasks = generate_tasks(level, TEN_AM, 3, &mut rng);
            assert_eq!(tasks.len(), 3);
            let mut templates: Vec<&str> = tasks.iter().map(|t| t.template_id.as_str()).collect();
            templates.sort_unstable();
            templates.dedup();
            assert_eq!(templates.len(), 3);
            for t in &tasks {
                let template = DAILY_TEMPLATES.iter().find(|d| d.id == t.template_id).unwrap();
                assert!(template.min_level <= level);
            }
        }
    }

    #[test]
    fn progress_flips_completed_without_clamping() {
        let mut tasks = vec![
            task(DailyTaskType::GoldCollect, None, 50),
            task(DailyTaskType::SpecificTask, Some(1), 2),
            task(DailyTaskType::CompleteTasks, None, 1),
        ];
        let done = apply_progress(&mut tasks, ProgressKind::Gold, 80, None);
        assert_eq!(done.len(), 1);
        assert_eq!(tasks[0].progress, 80);

        // Completed tasks no longer move
        apply_progress(&mut tasks, ProgressKind::Gold, 10, None);
        assert_eq!(tasks[0].progress, 80);

        apply_progress(&mut tasks, ProgressKind::TasksCompleted, 1, Some(3));
        assert_eq!(tasks[1].progress, 0);
        assert!(tasks[2].completed);
        apply_progress(&mut tasks, ProgressKind::TasksCompleted, 1, Some(1));
        assert_eq!(tasks[1].progress, 1);
    }

    #[test]
    fn refresh_is_idempotent_within_an_hour() {
        let (board, _, time, notifier) = board(1);
        let mut rng = StdRng::seed_from_u64(1);

        let first = board.refresh(&mut rng).unwrap().unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(notifier.drain().len(), 1);

        time.advance(59 * 60_000);
        assert!(board.refresh(&mut rng).unwrap().is_none());
        assert_eq!(board.tasks().unwrap(), first);

        time.advance(60_000);
        let second = board.refresh(&mut rng).unwrap().unwrap();
        assert_ne!(second[0].id, first[0].id);
    }

    #[test]
    fn claim_is_one_shot() {
        let (board, ledger, _, notifier) = board(1);
        let mut rng = StdRng::seed_from_u64(9);
        let tasks = board.force_refresh(&mut rng).unwrap();
        notifier.drain();

        let id = tasks[0].id.clone();
        assert_eq!(board.claim(&id).unwrap_err().rejection(), Some(&Rejection::NotCompleted));

        // Enough of everything to finish any level-1 task
        board.update_progress(ProgressKind::Gold, 1_000, None).unwrap();
        board.update_progress(ProgressKind::EnergySpent, 1_000, None).unwrap();
        for _ in 0..10 {
            board.update_progress(ProgressKind::TasksCompleted, 1, Some(GATHER_TASK_ID)).unwrap();
        }
        assert!(board.tasks().unwrap().iter().all(|t| t.completed));
        assert_eq!(notifier.drain().len(), 3);

        let claim = board.claim(&id).unwrap();
        let after = ledger.load().unwrap();
        assert_eq!(after.gold, claim.task.reward.gold);

        assert_eq!(board.claim(&id).unwrap_err().rejection(), Some(&Rejection::AlreadyClaimed));
        assert_eq!(ledger.load().unwrap(), after);
    }
}
