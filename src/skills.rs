//! Upgradable skills
//!
//! Static catalog plus the player's levels, stored one record per skill.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ActionResult, Rejection, StoreError};
use crate::ledger::{Ledger, ResourceState};
use crate::store::snapshot::SkillRecord;
use crate::store::{Collection, Store};
use crate::tasks::{COMBAT_TASK_ID, EXPLORE_TASK_ID, GATHER_TASK_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillEffectKind {
    GoldBoost,
    ExpBoost,
    AllBoost,
    EnergyRegen,
    EnergySave,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkillEffect {
    pub kind: SkillEffectKind,
    pub value_per_level: f64,
    /// Timed task the effect is limited to
    pub task_id: Option<u32>,
}

#[derive(Debug, PartialEq)]
pub struct SkillDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub max_level: u32,
    pub effect: SkillEffect,
    /// Gold per target level
    pub cost_per_level: i64,
}

impl SkillDefinition {
    pub fn get(id: &str) -> Option<&'static SkillDefinition> {
        SKILLS.iter().find(|s| s.id == id)
    }
}

pub static SKILLS: &[SkillDefinition] = &[
    SkillDefinition {
        id: "mining",
        name: "Mining",
        description: "More gold from gathering",
        max_level: 5,
        effect: SkillEffect {
            kind: SkillEffectKind::GoldBoost,
            value_per_level: 0.2,
            task_id: Some(GATHER_TASK_ID),
        },
        cost_per_level: 50,
    },
    SkillDefinition {
        id: "exploration",
        name: "Exploration",
        description: "More experience from exploring",
        max_level: 5,
        effect: SkillEffect {
            kind: SkillEffectKind::ExpBoost,
            value_per_level: 0.15,
            task_id: Some(EXPLORE_TASK_ID),
        },
        cost_per_level: 75,
    },
    SkillDefinition {
        id: "combat",
        name: "Combat",
        description: "More of everything from fights",
        max_level: 5,
        effect: SkillEffect {
            kind: SkillEffectKind::AllBoost,
            value_per_level: 0.1,
            task_id: Some(COMBAT_TASK_ID),
        },
        cost_per_level: 100,
    },
    SkillDefinition {
        id: "energy_recovery",
        name: "Energy Recovery",
        description: "Faster passive energy regeneration",
        max_level: 3,
        effect: SkillEffect {
            kind: SkillEffectKind::EnergyRegen,
            value_per_level: 1.0,
            task_id: None,
        },
        cost_per_level: 150,
    },
    SkillDefinition {
        id: "efficiency",
        name: "Efficiency",
        description: "Tasks cost less energy",
        max_level: 3,
        effect: SkillEffect {
            kind: SkillEffectKind::EnergySave,
            value_per_level: 0.1,
            task_id: None,
        },
        cost_per_level: 200,
    },
];

/// A catalog skill at the player's level
#[derive(Debug, Clone, PartialEq)]
pub struct Skill {
    pub definition: &'static SkillDefinition,
    pub current_level: u32,
}

impl Skill {
    pub fn at_level(definition: &'static SkillDefinition, current_level: u32) -> Self {
        Self {
            definition,
            current_level: current_level.min(definition.max_level),
        }
    }

    pub fn id(&self) -> &'static str {
        self.definition.id
    }

    pub fn effect(&self) -> &SkillEffect {
        &self.definition.effect
    }

    /// Effect magnitude at the current level
    pub fn contribution(&self) -> f64 {
        self.definition.effect.value_per_level * f64::from(self.current_level)
    }

    pub fn is_maxed(&self) -> bool {
        self.current_level >= self.definition.max_level
    }

    /// Gold needed to reach the next level
    pub fn upgrade_cost(&self) -> i64 {
        self.definition.cost_per_level * (i64::from(self.current_level) + 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillUpgrade {
    pub skill: Skill,
    pub cost: i64,
    pub resources: ResourceState,
}

#[derive(Clone)]
pub struct SkillBook {
    store: Store,
    ledger: Ledger,
}

impl SkillBook {
    pub fn new(store: Store, ledger: Ledger) -> Self {
        Self { store, ledger }
    }

    /// Every catalog skill with the saved level (0 when never upgraded)
    pub fn list(&self) -> Result<Vec<Skill>, StoreError> {
        let saved: Vec<SkillRecord> = self.store.get_all(Collection::Skills)?;
        Ok(SKILLS
            .iter()
            .map(|def| {
                let level = saved
                    .iter()
                    .find(|r| r.id == def.id)
                    .map(|r| r.current_level)
                    .unwrap_or(0);
                Skill::at_level(def, level)
            })
            .collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<Skill>, StoreError> {
        Ok(self.list()?.into_iter().find(|s| s.id() == id))
    }

    /// Spend gold to raise a skill by one level
    pub fn upgrade(&self, id: &str) -> ActionResult<SkillUpgrade> {
        let skill = self
            .get(id)?
            .ok_or_else(|| Rejection::not_found("Skill", id))?;
        if skill.is_maxed() {
            return Err(Rejection::MaxLevel(skill.definition.name.to_string()).into());
        }

        let state = self.ledger.require()?;
        let cost = skill.upgrade_cost();
        if state.gold < cost {
            return Err(Rejection::InsufficientGold {
                need: cost,
                have: state.gold,
            }
            .into());
        }

        let resources = self.ledger.try_save(&ResourceState {
            gold: state.gold - cost,
            ..state
        })?;
        let upgraded = Skill::at_level(skill.definition, skill.current_level + 1);
        self.store.put(
            Collection::Skills,
            &SkillRecord {
                id: upgraded.id().to_string(),
                current_level: upgraded.current_level,
            },
        )?;

        info!("Skill {} upgraded to level {}", upgraded.id(), upgraded.current_level);
        Ok(SkillUpgrade {
            skill: upgraded,
            cost,
            resources,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::ManualTime;
    use crate::store::LATEST_VERSION;

    fn book(gold: i64) -> (SkillBook, Ledger) {
        let store = Store::open_in_memory(LATEST_VERSION).unwrap();
        let ledger = Ledger::new(store.clone(), Arc::new(ManualTime::new(0)));
        ledger
            .init_if_missing(ResourceState {
                gold,
                ..ResourceState::new_player()
            })
            .unwrap();
        (SkillBook::new(store, ledger.clone()), ledger)
    }

    #[test]
    fn fresh_save_lists_every_skill_at_zero() {
        let (book, _) = book(0);
        let skills = book.list().unwrap();
        assert_eq!(skills.len(), SKILLS.len());
        assert!(skills.iter().all(|s| s.current_level == 0));
    }

    #[test]
    fn cost_grows_linearly() {
        let mining = Skill::at_level(SkillDefinition::get("mining").unwrap(), 0);
        assert_eq!(mining.upgrade_cost(), 50);
        let mining = Skill::at_level(mining.definition, 3);
        assert_eq!(mining.upgrade_cost(), 200);
    }

    #[test]
    fn upgrade_spends_gold_then_persists_level() {
        let (book, ledger) = book(200);
        let first = book.upgrade("mining").unwrap();
        assert_eq!((first.skill.current_level, first.cost), (1, 50));
        let second = book.upgrade("mining").unwrap();
        assert_eq!((second.skill.current_level, second.cost), (2, 100));

        assert_eq!(ledger.load().unwrap().gold, 50);
        assert_eq!(book.get("mining").unwrap().unwrap().current_level, 2);
    }

    #[test]
    fn upgrade_rejections() {
        let (book, ledger) = book(10);
        let err = book.upgrade("mining").unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&Rejection::InsufficientGold { need: 50, have: 10 })
        );
        assert_eq!(ledger.load().unwrap().gold, 10);

        let err = book.upgrade("alchemy").unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::NotFound { .. })));
    }

    #[test]
    fn maxed_skill_cannot_be_upgraded() {
        let (book, _) = book(10_000);
        for _ in 0..3 {
            book.upgrade("efficiency").unwrap();
        }
        let err = book.upgrade("efficiency").unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::MaxLevel(_))));
    }
}
