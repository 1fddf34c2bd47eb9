//! Resource ledger
//!
//! The only writer of the player's gold, experience and energy. Callers build
//! the complete next [`ResourceState`] and hand it over; the ledger clamps it
//! and persists it as `gameState/current`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::TimeSource;
use crate::error::{ActionResult, Rejection, StoreError};
use crate::modifiers::Reward;
use crate::store::snapshot::{GameStateRecord, keys};
use crate::store::{Batch, Collection, Store};

/// Energy cap before the per-level bonus
pub const BASE_MAX_ENERGY: i64 = 100;

/// Which resource an instant effect touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceTarget {
    Gold,
    Experience,
    Energy,
}

impl ResourceTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceTarget::Gold => "gold",
            ResourceTarget::Experience => "experience",
            ResourceTarget::Energy => "energy",
        }
    }
}

/// Canonical resource totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    pub gold: i64,
    pub experience: i64,
    pub energy: i64,
    /// Owned by the leveling collaborator, read-only for everyone else
    pub level: u32,
}

impl ResourceState {
    /// Starting resources of a fresh save
    pub fn new_player() -> Self {
        Self {
            gold: 0,
            experience: 0,
            energy: BASE_MAX_ENERGY,
            level: 1,
        }
    }

    pub fn max_energy(&self) -> i64 {
        BASE_MAX_ENERGY + i64::from(self.level)
    }

    /// Energy in `[0, max_energy]`, gold and experience floored at 0
    pub fn clamped(self) -> Self {
        Self {
            gold: self.gold.max(0),
            experience: self.experience.max(0),
            energy: self.energy.clamp(0, self.max_energy()),
            level: self.level,
        }
    }

    /// Apply an instant resource delta and clamp
    pub fn with_delta(self, target: ResourceTarget, value: i64) -> Self {
        let mut next = self;
        match target {
            ResourceTarget::Gold => next.gold += value,
            ResourceTarget::Experience => next.experience += value,
            ResourceTarget::Energy => next.energy += value,
        }
        next.clamped()
    }

    pub fn with_reward(self, reward: Reward) -> Self {
        Self {
            gold: self.gold + reward.gold,
            experience: self.experience + reward.experience,
            ..self
        }
        .clamped()
    }
}

/// Reads and writes the canonical resource record
#[derive(Clone)]
pub struct Ledger {
    store: Store,
    time: Arc<dyn TimeSource>,
}

impl Ledger {
    pub fn new(store: Store, time: Arc<dyn TimeSource>) -> Self {
        Self { store, time }
    }

    fn record(&self) -> Result<Option<GameStateRecord>, StoreError> {
        self.store.get(Collection::GameState, keys::GAME_STATE)
    }

    pub fn try_load(&self) -> Result<Option<ResourceState>, StoreError> {
        Ok(self.record()?.map(|r| r.state()))
    }

    /// Load the current state, logging and returning `None` on failure
    pub fn load(&self) -> Option<ResourceState> {
        match self.try_load() {
            Ok(state) => state,
            Err(e) => {
                warn!("Failed to load game state: {}", e);
                None
            }
        }
    }

    /// Load the current state or reject when no save exists
    pub fn require(&self) -> ActionResult<ResourceState> {
        Ok(self.try_load()?.ok_or(Rejection::NoGameState)?)
    }

    /// Clamp and persist `state`, returning what was written
    pub fn try_save(&self, state: &ResourceState) -> Result<ResourceState, StoreError> {
        self.save_with(state, |_| Ok(()))
    }

    /// Like [`Ledger::try_save`], committing the writes of `also` in the
    /// same transaction
    pub(crate) fn save_with(
        &self,
        state: &ResourceState,
        also: impl FnOnce(&Batch<'_>) -> Result<(), StoreError>,
    ) -> Result<ResourceState, StoreError> {
        let now = self.time.now_ms();
        let next = state.clamped();
        let anchor = self.record()?.map(|r| r.last_regen_at).unwrap_or(now);
        let record = GameStateRecord::new(&next, now, anchor);
        self.store.batch(|tx| {
            tx.put(Collection::GameState, &record)?;
            also(tx)
        })?;
        Ok(next)
    }

    /// Persist `state`, logging and returning `false` on failure
    pub fn save(&self, state: &ResourceState) -> bool {
        match self.try_save(state) {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to save game state: {}", e);
                false
            }
        }
    }

    /// Credit a fixed reward (achievement and daily task claims)
    pub fn credit(&self, reward: Reward) -> Result<ResourceState, StoreError> {
        let current = self.try_load()?.unwrap_or_else(ResourceState::new_player);
        self.try_save(&current.with_reward(reward))
    }

    /// Create the starting state unless a save already exists
    pub fn init_if_missing(&self, initial: ResourceState) -> Result<ResourceState, StoreError> {
        if let Some(existing) = self.try_load()? {
            return Ok(existing);
        }
        let now = self.time.now_ms();
        let state = initial.clamped();
        self.store
            .put(Collection::GameState, &GameStateRecord::new(&state, now, now))?;
        debug!("Created new game state");
        Ok(state)
    }

    /// Add passive energy for every whole minute since the last anchor.
    ///
    /// Returns the energy actually gained after clamping.
    pub fn regenerate(&self, rate_per_minute: f64) -> Result<i64, StoreError> {
        let Some(record) = self.record()? else {
            return Ok(0);
        };
        let now = self.time.now_ms();
        let minutes = (now - record.last_regen_at) / 60_000;
        if minutes <= 0 {
            return Ok(0);
        }

        let current = record.state();
        let gain = (minutes as f64 * rate_per_minute).floor() as i64;
        let next = current.with_delta(ResourceTarget::Energy, gain);
        let anchor = record.last_regen_at + minutes * 60_000;
        self.store
            .put(Collection::GameState, &GameStateRecord::new(&next, now, anchor))?;

        Ok(next.energy - current.energy)
    }
}
