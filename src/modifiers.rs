//! Modifier aggregation
//!
//! Turns skills, permanent shop effects, active boosts, pending events and
//! the active pet into numbers: reward fractions, energy cost, task speed and
//! regeneration rate. No I/O happens here; callers load a
//! [`ModifierSources`] snapshot and ask it questions.
//!
//! Reward pipeline for a claim:
//! 1. base reward
//! 2. `floor(base * (1 + fraction))` per resource
//! 3. plus the active pet's flat bonus
//! 4. times each consumed reward multiplier, flooring after each

use serde::{Deserialize, Serialize};

use crate::events::{ActiveEvent, EventEffect};
use crate::pets::{Pet, PetType};
use crate::shop::{ActiveBoost, BoostType, PermanentEffect, PermanentEffectKind};
use crate::skills::{Skill, SkillEffectKind};

/// Lowest allowed task speed factor
pub const MIN_SPEED_FACTOR: f64 = 0.1;

/// Pet bonus growth per level when the pet type matches the reward
const PET_MATCH_RATE: f64 = 0.05;
const PET_OTHER_RATE: f64 = 0.02;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub gold: i64,
    pub experience: i64,
}

impl Reward {
    pub const fn new(gold: i64, experience: i64) -> Self {
        Self { gold, experience }
    }
}

/// Reward resource a modifier can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Gold,
    Experience,
}

/// Everything that can adjust a reward or cost, loaded fresh per action
#[derive(Debug, Clone, Default)]
pub struct ModifierSources {
    pub skills: Vec<Skill>,
    pub permanent_effects: Vec<PermanentEffect>,
    /// Only unexpired boosts
    pub boosts: Vec<ActiveBoost>,
    /// Active events, oldest first
    pub events: Vec<ActiveEvent>,
    pub pet: Option<Pet>,
}

impl ModifierSources {
    /// Sum of skill effects of `kind` that apply to `task_id`.
    ///
    /// A skill without task scope applies everywhere; `None` matches every skill.
    pub fn skill_effect(&self, kind: SkillEffectKind, task_id: Option<u32>) -> f64 {
        self.skills
            .iter()
            .filter(|s| s.effect().kind == kind)
            .filter(|s| match (task_id, s.effect().task_id) {
                (Some(asked), Some(scope)) => asked == scope,
                _ => true,
            })
            .map(Skill::contribution)
            .sum()
    }

    fn permanent_task_boost(&self, task_id: u32, resource: ResourceKind) -> f64 {
        self.permanent_effects
            .iter()
            .filter(|e| {
                matches!(e.kind, PermanentEffectKind::TaskBoost { task_id: t, resource: r }
                    if t == task_id && r == resource)
            })
            .map(|e| e.value)
            .sum()
    }

    /// Sum of active shop boosts of one type
    pub fn boost_total(&self, boost: BoostType) -> f64 {
        self.boosts
            .iter()
            .filter(|b| b.boost_type == boost)
            .map(|b| b.value)
            .sum()
    }

    /// Additive gold fraction for a task
    pub fn gold_boost(&self, task_id: u32) -> f64 {
        self.skill_effect(SkillEffectKind::GoldBoost, Some(task_id))
            + self.skill_effect(SkillEffectKind::AllBoost, Some(task_id))
            + self.permanent_task_boost(task_id, ResourceKind::Gold)
            + self.boost_total(BoostType::Gold)
    }

    /// Additive experience fraction for a task
    pub fn exp_boost(&self, task_id: u32) -> f64 {
        self.skill_effect(SkillEffectKind::ExpBoost, Some(task_id))
            + self.skill_effect(SkillEffectKind::AllBoost, Some(task_id))
            + self.permanent_task_boost(task_id, ResourceKind::Experience)
            + self.boost_total(BoostType::Experience)
    }

    pub fn energy_save_fraction(&self) -> f64 {
        let permanent: f64 = self
            .permanent_effects
            .iter()
            .filter(|e| e.kind == PermanentEffectKind::EnergySave)
            .map(|e| e.value)
            .sum();
        self.skill_effect(SkillEffectKind::EnergySave, None) + permanent
    }

    pub fn effective_energy_cost(&self, base: i64) -> i64 {
        effective_energy_cost(base, self.energy_save_fraction())
    }

    /// Value of the oldest pending task speed event, if any
    pub fn next_task_speed(&self) -> Option<f64> {
        self.events.iter().find_map(|e| match e.effect {
            EventEffect::TaskSpeed { value } => Some(value),
            _ => None,
        })
    }

    /// Value of the oldest pending reward multiplier event, if any
    pub fn next_reward_multiplier(&self) -> Option<f64> {
        self.events.iter().find_map(|e| match e.effect {
            EventEffect::RewardMultiplier { value } => Some(value),
            _ => None,
        })
    }

    /// Speed factor including the task speed event a start would consume
    pub fn task_speed_factor(&self, event_speed: Option<f64>) -> f64 {
        (1.0 + self.boost_total(BoostType::TaskSpeed) + event_speed.unwrap_or(0.0))
            .max(MIN_SPEED_FACTOR)
    }

    pub fn effective_duration(&self, base_ms: u64, event_speed: Option<f64>) -> u64 {
        (base_ms as f64 / self.task_speed_factor(event_speed)).ceil() as u64
    }

    /// Passive energy per minute
    pub fn energy_regen_rate(&self) -> f64 {
        (1.0 + self.skill_effect(SkillEffectKind::EnergyRegen, None))
            * (1.0 + self.boost_total(BoostType::EnergyRegen))
    }

    /// Flat bonus from the active pet for one stat
    pub fn pet_bonus(&self, wanted: PetType, stat: &str) -> i64 {
        let Some(pet) = self.pet.as_ref().filter(|p| p.active) else {
            return 0;
        };
        let Some(&value) = pet.stats.get(stat) else {
            return 0;
        };
        let rate = if pet.pet_type == wanted {
            PET_MATCH_RATE
        } else {
            PET_OTHER_RATE
        };
        (value as f64 * (1.0 + f64::from(pet.level) * rate)).floor() as i64
    }

    /// Reward after skill, shop and pet modifiers, before multipliers
    pub fn reward_for(&self, base: Reward, task_id: u32) -> Reward {
        let gold = (base.gold as f64 * (1.0 + self.gold_boost(task_id))).floor() as i64;
        let experience = (base.experience as f64 * (1.0 + self.exp_boost(task_id))).floor() as i64;
        Reward {
            gold: gold + self.pet_bonus(PetType::Gold, "gold"),
            experience: experience + self.pet_bonus(PetType::Utility, "experience"),
        }
    }
}

/// `max(1, floor(base * (1 - save)))`
pub fn effective_energy_cost(base: i64, save_fraction: f64) -> i64 {
    ((base as f64 * (1.0 - save_fraction)).floor() as i64).max(1)
}

/// `floor(x * multiplier)` per resource
pub fn apply_multiplier(reward: Reward, multiplier: f64) -> Reward {
    Reward {
        gold: (reward.gold as f64 * multiplier).floor() as i64,
        experience: (reward.experience as f64 * multiplier).floor() as i64,
    }
}
