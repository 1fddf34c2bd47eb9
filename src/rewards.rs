//! Reward payout for task and exploration claims
//!
//! Loads a fresh [`ModifierSources`] snapshot, runs the reward pipeline and
//! credits the ledger. A pending reward multiplier event is consumed in the
//! same transaction as the ledger write.

use crate::error::{ActionResult, StoreError};
use crate::events::{EventManager, TaskEffectKind};
use crate::ledger::{Ledger, ResourceState};
use crate::modifiers::{ModifierSources, Reward, apply_multiplier};
use crate::pets::PetKennel;
use crate::shop::Shop;
use crate::skills::SkillBook;
use crate::store::{Batch, Collection};

/// Outcome of a reward payout
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub base: Reward,
    pub reward: Reward,
    /// Multiplier event consumed by this payout
    pub multiplier: Option<f64>,
    pub resources: ResourceState,
}

#[derive(Clone)]
pub struct RewardService {
    ledger: Ledger,
    skills: SkillBook,
    shop: Shop,
    events: EventManager,
    pets: PetKennel,
}

impl RewardService {
    pub fn new(
        ledger: Ledger,
        skills: SkillBook,
        shop: Shop,
        events: EventManager,
        pets: PetKennel,
    ) -> Self {
        Self {
            ledger,
            skills,
            shop,
            events,
            pets,
        }
    }

    /// Current modifiers; expired boosts are swept first
    pub fn sources(&self) -> Result<ModifierSources, StoreError> {
        Ok(ModifierSources {
            skills: self.skills.list()?,
            permanent_effects: self.shop.permanent_effects()?,
            boosts: self.shop.active_boosts()?,
            events: self.events.active_events()?,
            pet: self.pets.active_pet()?,
        })
    }

    /// Pay out a task-scoped reward
    pub fn grant_task_reward(&self, base: Reward, task_id: u32) -> ActionResult<Grant> {
        self.grant_task_reward_with(base, task_id, |_| Ok(()))
    }

    /// Pay out a task-scoped reward. The new resources, the consumed
    /// multiplier and the writes of `also` commit together or not at all.
    pub(crate) fn grant_task_reward_with(
        &self,
        base: Reward,
        task_id: u32,
        also: impl FnOnce(&Batch<'_>) -> Result<(), StoreError>,
    ) -> ActionResult<Grant> {
        let sources = self.sources()?;
        let multiplier = sources.next_reward_multiplier();
        let mut reward = sources.reward_for(base, task_id);
        if let Some(m) = multiplier {
            reward = apply_multiplier(reward, m);
        }

        let state = self.ledger.require()?;
        let consumed = match multiplier {
            Some(_) => self.events.take_task_effect(TaskEffectKind::RewardMultiplier)?,
            None => None,
        };
        let resources = self.ledger.save_with(&state.with_reward(reward), |tx| {
            if let Some((_, remaining)) = &consumed {
                tx.put(Collection::Events, remaining)?;
            }
            also(tx)
        })?;

        Ok(Grant {
            base,
            reward,
            multiplier,
            resources,
        })
    }
}
