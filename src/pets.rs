//! Pets
//!
//! One record per pet. At most one pet is active; only the active pet adds
//! reward bonuses.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::TimeSource;
use crate::equipment::Rarity;
use crate::error::{ActionResult, Rejection, StoreError};
use crate::notify::{NewNotification, NotificationKind, NotificationSink};
use crate::store::{Collection, Store};

const STARTING_MAX_EXPERIENCE: i64 = 100;
const MAX_EXPERIENCE_GROWTH: f64 = 1.5;
const STAT_GROWTH: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetType {
    Attack,
    Defense,
    Utility,
    Gold,
    Energy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub pet_type: PetType,
    pub rarity: Rarity,
    pub level: u32,
    pub experience: i64,
    pub max_experience: i64,
    pub stats: BTreeMap<String, i64>,
    pub active: bool,
    pub captured_at: i64,
}

impl Pet {
    /// Add experience, levelling up as many times as it covers.
    ///
    /// Returns the number of levels gained.
    pub fn gain_experience(&mut self, amount: i64) -> u32 {
        self.experience += amount.max(0);
        let mut gained = 0;
        while self.experience >= self.max_experience && self.max_experience > 0 {
            self.experience -= self.max_experience;
            self.level += 1;
            gained += 1;
            self.max_experience = (self.max_experience as f64 * MAX_EXPERIENCE_GROWTH).floor() as i64;
            for value in self.stats.values_mut() {
                *value = (*value as f64 * STAT_GROWTH).floor() as i64;
            }
        }
        gained
    }
}

/// Blueprint of a pet to capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetTemplate {
    pub name: String,
    pub pet_type: PetType,
    pub rarity: Rarity,
    pub stats: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedOutcome {
    pub pet: Pet,
    pub levels_gained: u32,
}

#[derive(Clone)]
pub struct PetKennel {
    store: Store,
    notifier: Arc<dyn NotificationSink>,
    time: Arc<dyn TimeSource>,
}

impl PetKennel {
    pub fn new(store: Store, notifier: Arc<dyn NotificationSink>, time: Arc<dyn TimeSource>) -> Self {
        Self {
            store,
            notifier,
            time,
        }
    }

    /// All pets, rarest first, then highest level
    pub fn list(&self) -> Result<Vec<Pet>, StoreError> {
        let mut pets: Vec<Pet> = self.store.get_all(Collection::Pets)?;
        pets.sort_by(|a, b| b.rarity.cmp(&a.rarity).then_with(|| b.level.cmp(&a.level)));
        Ok(pets)
    }

    pub fn get(&self, id: &str) -> Result<Option<Pet>, StoreError> {
        self.store.get(Collection::Pets, id)
    }

    fn require(&self, id: &str) -> ActionResult<Pet> {
        Ok(self.get(id)?.ok_or_else(|| Rejection::not_found("Pet", id))?)
    }

    pub fn active_pet(&self) -> Result<Option<Pet>, StoreError> {
        Ok(self.list()?.into_iter().find(|p| p.active))
    }

    pub fn capture(&self, template: PetTemplate) -> Result<Pet, StoreError> {
        let now = self.time.now_ms();
        let pet = Pet {
            id: format!("{}-{}", now, uuid::Uuid::new_v4().simple()),
            name: template.name,
            pet_type: template.pet_type,
            rarity: template.rarity,
            level: 1,
            experience: 0,
            max_experience: STARTING_MAX_EXPERIENCE,
            stats: template.stats,
            active: false,
            captured_at: now,
        };
        self.store.put(Collection::Pets, &pet)?;
        info!("Captured {}", pet.name);

        self.notifier.create_notification(
            NewNotification::new(
                NotificationKind::System,
                "New pet captured",
                format!("You captured a {} pet: {}!", pet.rarity.as_str(), pet.name),
            )
            .with_data(serde_json::json!({ "petId": pet.id })),
        );
        Ok(pet)
    }

    /// Make one pet active and every other pet inactive
    pub fn activate(&self, id: &str) -> ActionResult<Pet> {
        let target = self.require(id)?;
        let pets = self.list()?;
        self.store.batch(|tx| {
            for mut pet in pets {
                let active = pet.id == target.id;
                if pet.active != active {
                    pet.active = active;
                    tx.put(Collection::Pets, &pet)?;
                }
            }
            Ok(())
        })?;
        Ok(Pet {
            active: true,
            ..target
        })
    }

    pub fn feed(&self, id: &str, experience: i64) -> ActionResult<FeedOutcome> {
        let mut pet = self.require(id)?;
        let levels_gained = pet.gain_experience(experience);
        self.store.put(Collection::Pets, &pet)?;

        if levels_gained > 0 {
            self.notifier.create_notification(
                NewNotification::new(
                    NotificationKind::System,
                    "Pet level up",
                    format!("{} reached level {}", pet.name, pet.level),
                )
                .with_icon("star"),
            );
        }
        Ok(FeedOutcome { pet, levels_gained })
    }

    pub fn rename(&self, id: &str, name: &str) -> ActionResult<Pet> {
        let mut pet = self.require(id)?;
        pet.name = name.to_string();
        self.store.put(Collection::Pets, &pet)?;
        Ok(pet)
    }
}
