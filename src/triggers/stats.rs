//! Lifetime counters fed by gameplay

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A statistic delta reported by a gameplay action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatEvent {
    GoldEarned(u64),
    EnergySpent(u64),
    TaskCompleted { task_id: Option<u32> },
    ExplorationCompleted { area_id: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub gold_earned: u64,
    pub energy_spent: u64,
    pub tasks_completed: u64,
    /// Completions per timed task id
    #[serde(default)]
    pub task_specific_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub explorations_completed: u64,
}

impl Statistics {
    pub fn apply(&mut self, event: StatEvent) {
        match event {
            StatEvent::GoldEarned(amount) => self.gold_earned += amount,
            StatEvent::EnergySpent(amount) => self.energy_spent += amount,
            StatEvent::TaskCompleted { task_id } => {
                self.tasks_completed += 1;
                if let Some(id) = task_id {
                    *self.task_specific_counts.entry(id.to_string()).or_insert(0) += 1;
                }
            }
            StatEvent::ExplorationCompleted { .. } => self.explorations_completed += 1,
        }
    }

    pub fn task_count(&self, task_id: u32) -> u64 {
        self.task_specific_counts
            .get(&task_id.to_string())
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_move_once_per_event() {
        let mut stats = Statistics::default();
        stats.apply(StatEvent::GoldEarned(30));
        stats.apply(StatEvent::GoldEarned(20));
        stats.apply(StatEvent::EnergySpent(15));
        stats.apply(StatEvent::TaskCompleted { task_id: Some(2) });
        stats.apply(StatEvent::TaskCompleted { task_id: Some(2) });
        stats.apply(StatEvent::TaskCompleted { task_id: None });
        stats.apply(StatEvent::ExplorationCompleted { area_id: 1 });

        assert_eq!(stats.gold_earned, 50);
        assert_eq!(stats.energy_spent, 15);
        assert_eq!(stats.tasks_completed, 3);
        assert_eq!(stats.task_count(2), 2);
        assert_eq!(stats.task_count(1), 0);
        assert_eq!(stats.explorations_completed, 1);
    }

    #[test]
    fn older_records_without_new_fields_load() {
        let json = r#"{"gold_earned":5,"energy_spent":1,"tasks_completed":2}"#;
        let stats: Statistics = serde_json::from_str(json).unwrap();
        assert_eq!(stats.gold_earned, 5);
        assert!(stats.task_specific_counts.is_empty());
    }
}
