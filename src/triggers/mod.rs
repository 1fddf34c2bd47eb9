//! Trigger engine
//!
//! Gameplay reports statistic deltas here. Each delta is counted once, fed
//! into daily task progress, and then every open achievement is re-checked
//! against the totals and the player's level.

pub mod achievements;
pub mod daily;
pub mod stats;

use std::sync::Arc;

use tracing::info;

use crate::context::TimeSource;
use crate::error::{ActionResult, Rejection, StoreError};
use crate::ledger::{Ledger, ResourceState};
use crate::modifiers::Reward;
use crate::notify::{NewNotification, NotificationKind, NotificationSink};
use crate::store::snapshot::{AchievementRecord, StatisticsRecord, keys};
use crate::store::{Collection, Store};

pub use achievements::{ACHIEVEMENTS, Achievement, AchievementDef, AchievementId, Requirement};
pub use daily::{DailyBoard, DailyClaim, DailyTask, ProgressKind};
pub use stats::{StatEvent, Statistics};

/// What a statistics update unlocked
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerReport {
    pub achievements: Vec<&'static AchievementDef>,
    pub daily_tasks: Vec<DailyTask>,
}

impl TriggerReport {
    pub fn is_empty(&self) -> bool {
        self.achievements.is_empty() && self.daily_tasks.is_empty()
    }

    fn merge(&mut self, other: TriggerReport) {
        self.achievements.extend(other.achievements);
        self.daily_tasks.extend(other.daily_tasks);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AchievementClaim {
    pub achievement: &'static AchievementDef,
    pub reward: Reward,
    pub resources: ResourceState,
}

#[derive(Clone)]
pub struct TriggerEngine {
    store: Store,
    ledger: Ledger,
    notifier: Arc<dyn NotificationSink>,
    time: Arc<dyn TimeSource>,
    daily: DailyBoard,
}

impl TriggerEngine {
    pub fn new(
        store: Store,
        ledger: Ledger,
        notifier: Arc<dyn NotificationSink>,
        time: Arc<dyn TimeSource>,
        daily: DailyBoard,
    ) -> Self {
        Self {
            store,
            ledger,
            notifier,
            time,
            daily,
        }
    }

    pub fn daily(&self) -> &DailyBoard {
        &self.daily
    }

    pub fn statistics(&self) -> Result<Statistics, StoreError> {
        Ok(self
            .store
            .get::<StatisticsRecord>(Collection::Achievements, keys::STATISTICS)?
            .map(|r| r.data)
            .unwrap_or_default())
    }

    /// Every achievement with its saved progress
    pub fn achievements(&self) -> Result<Vec<Achievement>, StoreError> {
        let mut list = Vec::with_capacity(ACHIEVEMENTS.len());
        for definition in ACHIEVEMENTS {
            let saved: Option<AchievementRecord> = self
                .store
                .get(Collection::Achievements, definition.id.as_str())?;
            list.push(Achievement {
                definition,
                completed: saved.as_ref().is_some_and(|r| r.completed),
                reward_claimed: saved.as_ref().is_some_and(|r| r.reward_claimed),
                completed_at: saved.and_then(|r| r.completed_at),
            });
        }
        Ok(list)
    }

    /// Count one statistic delta and evaluate everything it may unlock
    pub fn record(&self, event: StatEvent) -> Result<TriggerReport, StoreError> {
        let mut stats = self.statistics()?;
        stats.apply(event);
        self.store
            .put(Collection::Achievements, &StatisticsRecord::new(stats.clone()))?;

        let daily_tasks = match event {
            StatEvent::GoldEarned(amount) => {
                self.daily.update_progress(ProgressKind::Gold, amount, None)?
            }
            StatEvent::EnergySpent(amount) => {
                self.daily.update_progress(ProgressKind::EnergySpent, amount, None)?
            }
            StatEvent::TaskCompleted { task_id } => {
                self.daily.update_progress(ProgressKind::TasksCompleted, 1, task_id)?
            }
            StatEvent::ExplorationCompleted { .. } => Vec::new(),
        };

        let achievements = self.evaluate(&stats)?;
        Ok(TriggerReport {
            achievements,
            daily_tasks,
        })
    }

    /// Record several deltas in order, merging the reports
    pub fn record_all(&self, events: &[StatEvent]) -> Result<TriggerReport, StoreError> {
        let mut report = TriggerReport::default();
        for event in events {
            report.merge(self.record(*event)?);
        }
        Ok(report)
    }

    /// Re-check achievements without a delta, e.g. after a level change
    pub fn check_achievements(&self) -> Result<Vec<&'static AchievementDef>, StoreError> {
        let stats = self.statistics()?;
        self.evaluate(&stats)
    }

    fn evaluate(&self, stats: &Statistics) -> Result<Vec<&'static AchievementDef>, StoreError> {
        let level = self.ledger.try_load()?.map(|s| s.level).unwrap_or(1);
        let current = self.achievements()?;
        let newly = achievements::check_achievements(&current, stats, level);
        if newly.is_empty() {
            return Ok(newly);
        }

        let now = self.time.now_ms();
        self.store.batch(|tx| {
            for def in &newly {
                tx.put(
                    Collection::Achievements,
                    &AchievementRecord {
                        id: def.id.as_str().to_string(),
                        completed: true,
                        reward_claimed: false,
                        completed_at: Some(now),
                    },
                )?;
            }
            Ok(())
        })?;

        for def in &newly {
            info!("Achievement unlocked: {}", def.name);
            self.notifier.create_notification(
                NewNotification::new(
                    NotificationKind::Achievement,
                    format!("Achievement unlocked: {}", def.name),
                    def.description,
                )
                .with_data(serde_json::json!({ "achievementId": def.id.as_str() })),
            );
        }
        Ok(newly)
    }

    /// Pay out a completed daily task once. Its gold counts as earned.
    pub fn claim_daily(&self, task_id: &str) -> ActionResult<DailyClaim> {
        let mut claim = self.daily.claim(task_id)?;
        let gold = claim.task.reward.gold.max(0) as u64;
        claim.report = self.record(StatEvent::GoldEarned(gold))?;
        Ok(claim)
    }

    /// Pay out a completed achievement once
    pub fn claim_achievement(&self, id: &str) -> ActionResult<AchievementClaim> {
        let definition =
            AchievementDef::by_key(id).ok_or_else(|| Rejection::not_found("Achievement", id))?;
        let saved: Option<AchievementRecord> = self.store.get(Collection::Achievements, id)?;
        let Some(mut record) = saved.filter(|r| r.completed) else {
            return Err(Rejection::NotCompleted.into());
        };
        if record.reward_claimed {
            return Err(Rejection::AlreadyClaimed.into());
        }

        let resources = self.ledger.credit(definition.reward)?;
        record.reward_claimed = true;
        self.store.put(Collection::Achievements, &record)?;

        Ok(AchievementClaim {
            achievement: definition,
            reward: definition.reward,
            resources,
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
    use crate::tasks::GATHER_TASK_ID;

    fn engine() -> (TriggerEngine, Ledger, Arc<MemoryNotifier>) {
        let store = Store::open_in_memory(LATEST_VERSION).unwrap();
        let time = Arc::new(ManualTime::new(0));
        let ledger = Ledger::new(store.clone(), time.clone());
        ledger.init_if_missing(ResourceState::new_player()).unwrap();
        let notifier = Arc::new(MemoryNotifier::new());
        let daily = DailyBoard::new(store.clone(), ledger.clone(), notifier.clone(), time.clone(), 3);
        (
            TriggerEngine::new(store, ledger.clone(), notifier.clone(), time, daily),
            ledger,
            notifier,
        )
    }

    #[test]
    fn gold_achievement_unlocks_once() {
        let (engine, _, notifier) = engine();
        let report = engine.record(StatEvent::GoldEarned(60)).unwrap();
        assert!(report.achievements.is_empty());

        let report = engine.record(StatEvent::GoldEarned(40)).unwrap();
        assert_eq!(report.achievements.len(), 1);
        assert_eq!(report.achievements[0].id, AchievementId::FirstGold);

        let report = engine.record(StatEvent::GoldEarned(500)).unwrap();
        assert!(report.achievements.is_empty());

        let notes = notifier.drain();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Achievement);
        assert_eq!(engine.statistics().unwrap().gold_earned, 600);
    }

    #[test]
    fn level_achievement_needs_explicit_check() {
        let (engine, ledger, _) = engine();
        assert!(engine.check_achievements().unwrap().is_empty());
        ledger.save(&ResourceState {
            level: 5,
            ..ResourceState::new_player()
        });
        let unlocked = engine.check_achievements().unwrap();
        assert_eq!(unlocked[0].id, AchievementId::LevelUp);
    }

    #[test]
    fn claim_pays_exactly_once() {
        let (engine, ledger, _) = engine();
        assert_eq!(
            engine.claim_achievement("first_gold").unwrap_err().rejection(),
            Some(&Rejection::NotCompleted)
        );

        engine.record(StatEvent::GoldEarned(100)).unwrap();
        let claim = engine.claim_achievement("first_gold").unwrap();
        assert_eq!(claim.reward, Reward::new(50, 20));
        let after = ledger.load().unwrap();
        assert_eq!((after.gold, after.experience), (50, 20));

        assert_eq!(
            engine.claim_achievement("first_gold").unwrap_err().rejection(),
            Some(&Rejection::AlreadyClaimed)
        );
        assert_eq!(ledger.load().unwrap(), after);

        let list = engine.achievements().unwrap();
        let first = list.iter().find(|a| a.definition.id == AchievementId::FirstGold).unwrap();
        assert!(first.completed && first.reward_claimed);
    }

    #[test]
    fn daily_claim_counts_gold_earned() {
        let (engine, ledger, _) = engine();
        let mut rng = StdRng::seed_from_u64(3);
        let tasks = engine.daily().force_refresh(&mut rng).unwrap();

        engine.daily().update_progress(ProgressKind::Gold, 1_000, None).unwrap();
        engine.daily().update_progress(ProgressKind::EnergySpent, 1_000, None).unwrap();
        for _ in 0..10 {
            engine
                .daily()
                .update_progress(ProgressKind::TasksCompleted, 1, Some(GATHER_TASK_ID))
                .unwrap();
        }
        assert_eq!(engine.statistics().unwrap().gold_earned, 0);

        let claim = engine.claim_daily(&tasks[0].id).unwrap();
        let gold = claim.task.reward.gold;
        assert!(gold > 0);
        assert_eq!(engine.statistics().unwrap().gold_earned, gold as u64);
        assert_eq!(ledger.load().unwrap().gold, gold);

        // A refused claim counts nothing
        assert_eq!(
            engine.claim_daily(&tasks[0].id).unwrap_err().rejection(),
            Some(&Rejection::AlreadyClaimed)
        );
        assert_eq!(engine.statistics().unwrap().gold_earned, gold as u64);
    }

    #[test]
    fn task_completion_feeds_specific_counter() {
        let (engine, _, _) = engine();
        let report = engine
            .record_all(&[
                StatEvent::TaskCompleted { task_id: Some(2) },
                StatEvent::EnergySpent(12),
            ])
            .unwrap();
        assert!(report.is_empty());
        let stats = engine.statistics().unwrap();
        assert_eq!((stats.tasks_completed, stats.task_count(2), stats.energy_spent), (1, 1, 12));
    }
}
