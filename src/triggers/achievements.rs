//! Achievement definitions and checking
//!
//! Completion is monotonic: once an achievement is completed it is never
//! checked again, and its reward can be claimed exactly once.

use std::str::FromStr;

use super::stats::Statistics;
use crate::error::Rejection;
use crate::modifiers::Reward;
use crate::tasks::EXPLORE_TASK_ID;

/// Unique identifier for each achievement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AchievementId {
    FirstGold,
    EnergyMaster,
    TaskNovice,
    LevelUp,
    Explorer,
}

impl AchievementId {
    /// String id used as the record key
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstGold => "first_gold",
            Self::EnergyMaster => "energy_master",
            Self::TaskNovice => "task_novice",
            Self::LevelUp => "level_up",
            Self::Explorer => "explorer",
        }
    }
}

impl FromStr for AchievementId {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_gold" => Ok(Self::FirstGold),
            "energy_master" => Ok(Self::EnergyMaster),
            "task_novice" => Ok(Self::TaskNovice),
            "level_up" => Ok(Self::LevelUp),
            "explorer" => Ok(Self::Explorer),
            _ => Err(Rejection::not_found("Achievement", s)),
        }
    }
}

/// What has to happen for an achievement to complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    GoldEarned(u64),
    EnergySpent(u64),
    TasksCompleted(u64),
    LevelReached(u32),
    TaskCount { task_id: u32, count: u64 },
}

impl Requirement {
    /// `(current, target)` for progress bars
    pub fn progress(&self, stats: &Statistics, level: u32) -> (u64, u64) {
        match *self {
            Requirement::GoldEarned(target) => (stats.gold_earned, target),
            Requirement::EnergySpent(target) => (stats.energy_spent, target),
            Requirement::TasksCompleted(target) => (stats.tasks_completed, target),
            Requirement::LevelReached(target) => (u64::from(level), u64::from(target)),
            Requirement::TaskCount { task_id, count } => (stats.task_count(task_id), count),
        }
    }

    pub fn is_met(&self, stats: &Statistics, level: u32) -> bool {
        let (current, target) = self.progress(stats, level);
        current >= target
    }
}

#[derive(Debug, PartialEq)]
pub struct AchievementDef {
    pub id: AchievementId,
    pub name: &'static str,
    pub description: &'static str,
    pub requirement: Requirement,
    pub reward: Reward,
}

pub static ACHIEVEMENTS: &[AchievementDef] = &[
    AchievementDef {
        id: AchievementId::FirstGold,
        name: "First Gold",
        description: "Earn 100 gold",
        requirement: Requirement::GoldEarned(100),
        reward: Reward::new(50, 20),
    },
    AchievementDef {
        id: AchievementId::EnergyMaster,
        name: "Energy Master",
        description: "Spend 500 energy",
        requirement: Requirement::EnergySpent(500),
        reward: Reward::new(100, 50),
    },
    AchievementDef {
        id: AchievementId::TaskNovice,
        name: "Task Novice",
        description: "Complete 10 tasks",
        requirement: Requirement::TasksCompleted(10),
        reward: Reward::new(150, 75),
    },
    AchievementDef {
        id: AchievementId::LevelUp,
        name: "Growing Up",
        description: "Reach level 5",
        requirement: Requirement::LevelReached(5),
        reward: Reward::new(200, 100),
    },
    AchievementDef {
        id: AchievementId::Explorer,
        name: "Explorer",
        description: "Explore the map 20 times",
        requirement: Requirement::TaskCount {
            task_id: EXPLORE_TASK_ID,
            count: 20,
        },
        reward: Reward::new(250, 125),
    },
];

impl AchievementDef {
    pub fn get(id: AchievementId) -> Option<&'static AchievementDef> {
        ACHIEVEMENTS.iter().find(|a| a.id == id)
    }

    pub fn by_key(key: &str) -> Option<&'static AchievementDef> {
        key.parse().ok().and_then(Self::get)
    }
}

/// A definition with the player's progress on it
#[derive(Debug, Clone, PartialEq)]
pub struct Achievement {
    pub definition: &'static AchievementDef,
    pub completed: bool,
    pub reward_claimed: bool,
    pub completed_at: Option<i64>,
}

/// Achievements that are not yet completed but whose requirement now holds
pub fn check_achievements(
    achievements: &[Achievement],
    stats: &Statistics,
    level: u32,
) -> Vec<&'static AchievementDef> {
    achievements
        .iter()
        .filter(|a| !a.completed && a.definition.requirement.is_met(stats, level))
        .map(|a| a.definition)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triggers::stats::StatEvent;

    fn fresh() -> Vec<Achievement> {
        ACHIEVEMENTS
            .iter()
            .map(|definition| Achievement {
                definition,
                completed: false,
                reward_claimed: false,
                completed_at: None,
            })
            .collect()
    }

    #[test]
    fn ids_roundtrip() {
        for def in ACHIEVEMENTS {
            assert_eq!(def.id.as_str().parse::<AchievementId>(), Ok(def.id));
            assert_eq!(AchievementDef::get(def.id).map(|d| d.id), Some(def.id));
        }
        assert!(AchievementDef::by_key("unknown").is_none());
    }

    #[test]
    fn gold_threshold_is_inclusive() {
        let mut stats = Statistics::default();
        stats.apply(StatEvent::GoldEarned(99));
        assert!(check_achievements(&fresh(), &stats, 1).is_empty());

        stats.apply(StatEvent::GoldEarned(1));
        let done = check_achievements(&fresh(), &stats, 1);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, AchievementId::FirstGold);
    }

    #[test]
    fn completed_ones_are_skipped() {
        let stats = Statistics::default();
        let mut list = fresh();
        assert_eq!(check_achievements(&list, &stats, 5).len(), 1);
        for a in list.iter_mut() {
            if a.definition.id == AchievementId::LevelUp {
                a.completed = true;
            }
        }
        assert!(check_achievements(&list, &stats, 5).is_empty());
    }

    #[test]
    fn task_specific_requirement_counts_one_task() {
        let mut stats = Statistics::default();
        for _ in 0..20 {
            stats.apply(StatEvent::TaskCompleted { task_id: Some(1) });
        }
        let req = AchievementDef::get(AchievementId::Explorer).unwrap().requirement;
        assert!(!req.is_met(&stats, 1));
        for _ in 0..20 {
            stats.apply(StatEvent::TaskCompleted { task_id: Some(EXPLORE_TASK_ID) });
        }
        assert!(req.is_met(&stats, 1));
        assert_eq!(req.progress(&stats, 1), (20, 20));
    }
}
