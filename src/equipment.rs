//! Equipment inventory
//!
//! Items are stored one record per item in the `equipment` collection, the
//! slot assignments in `equipment/equipped`. At most one item per slot.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::TimeSource;
use crate::error::{ActionResult, Rejection, StoreError};
use crate::ledger::{Ledger, ResourceState, ResourceTarget};
use crate::store::snapshot::{EquippedRecord, keys};
use crate::store::{Collection, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        }
    }

    /// Sell price multiplier
    pub fn value_multiplier(&self) -> i64 {
        match self {
            Rarity::Common => 1,
            Rarity::Uncommon => 2,
            Rarity::Rare => 5,
            Rarity::Epic => 10,
            Rarity::Legendary => 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentType {
    Weapon,
    Helmet,
    Armor,
    Shield,
    Accessory,
    Material,
}

impl EquipmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentType::Weapon => "weapon",
            EquipmentType::Helmet => "helmet",
            EquipmentType::Armor => "armor",
            EquipmentType::Shield => "shield",
            EquipmentType::Accessory => "accessory",
            EquipmentType::Material => "material",
        }
    }

    /// Whether items of this type occupy a slot
    pub fn is_slot(&self) -> bool {
        !matches!(self, EquipmentType::Material)
    }
}

impl FromStr for EquipmentType {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weapon" => Ok(EquipmentType::Weapon),
            "helmet" => Ok(EquipmentType::Helmet),
            "armor" => Ok(EquipmentType::Armor),
            "shield" => Ok(EquipmentType::Shield),
            "accessory" => Ok(EquipmentType::Accessory),
            "material" => Ok(EquipmentType::Material),
            _ => Err(Rejection::not_found("Equipment type", s)),
        }
    }
}

/// Base enhancement percentage of a material without a value
const DEFAULT_MATERIAL_PERCENT: i64 = 5;
/// Floor of the stat-derived sell price
const MIN_STAT_PRICE: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub equipment_type: EquipmentType,
    pub rarity: Rarity,
    pub stats: BTreeMap<String, i64>,
    #[serde(default)]
    pub value: Option<i64>,
    /// Accumulated enhancement percentage
    #[serde(default)]
    pub enhancement: i64,
    pub acquired_at: i64,
}

impl Equipment {
    /// Gold paid when selling
    pub fn sell_price(&self) -> i64 {
        let base = self.value.unwrap_or_else(|| {
            let total: i64 = self.stats.values().sum();
            (total * 5).max(MIN_STAT_PRICE)
        });
        base * self.rarity.value_multiplier()
    }

    /// Percentage added when used as enhancement material
    pub fn enhancement_value(&self) -> i64 {
        self.value.unwrap_or(DEFAULT_MATERIAL_PERCENT)
    }
}

/// Item about to enter the inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEquipment {
    /// Generated when absent
    pub id: Option<String>,
    pub name: String,
    pub equipment_type: EquipmentType,
    pub rarity: Rarity,
    pub stats: BTreeMap<String, i64>,
    pub value: Option<i64>,
}

/// Sum of the combat stats of every equipped item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentStats {
    pub attack: i64,
    pub defense: i64,
    pub health: i64,
    pub speed: i64,
    pub critical: i64,
}

impl EquipmentStats {
    fn add(&mut self, stats: &BTreeMap<String, i64>) {
        for (name, value) in stats {
            match name.as_str() {
                "attack" => self.attack += value,
                "defense" => self.defense += value,
                "health" => self.health += value,
                "speed" => self.speed += value,
                "critical" => self.critical += value,
                _ => {}
            }
        }
    }
}

#[derive(Clone)]
pub struct Armory {
    store: Store,
    ledger: Ledger,
    time: Arc<dyn TimeSource>,
}

impl Armory {
    pub fn new(store: Store, ledger: Ledger, time: Arc<dyn TimeSource>) -> Self {
        Self { store, ledger, time }
    }

    /// Every item, ordered by id
    pub fn list(&self) -> Result<Vec<Equipment>, StoreError> {
        self.store
            .get_all_values(Collection::Equipment)?
            .into_iter()
            .filter(|v| v.get("id").and_then(|id| id.as_str()) != Some(keys::EQUIPPED))
            .map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .collect()
    }

    pub fn by_type(&self, equipment_type: EquipmentType) -> Result<Vec<Equipment>, StoreError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|e| e.equipment_type == equipment_type)
            .collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<Equipment>, StoreError> {
        if id == keys::EQUIPPED {
            return Ok(None);
        }
        self.store.get(Collection::Equipment, id)
    }

    fn require(&self, id: &str) -> ActionResult<Equipment> {
        Ok(self.get(id)?.ok_or_else(|| Rejection::not_found("Item", id))?)
    }

    /// Slot type to equipped item id
    pub fn equipped_slots(&self) -> Result<BTreeMap<EquipmentType, String>, StoreError> {
        Ok(self
            .store
            .get::<EquippedRecord>(Collection::Equipment, keys::EQUIPPED)?
            .map(|r| r.slots)
            .unwrap_or_default())
    }

    pub fn equipped(&self) -> Result<Vec<Equipment>, StoreError> {
        let mut items = Vec::new();
        for id in self.equipped_slots()?.values() {
            if let Some(item) = self.get(id)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    pub fn add(&self, new: NewEquipment) -> Result<Equipment, StoreError> {
        let item = self.prepare(new);
        self.store.put(Collection::Equipment, &item)?;
        debug!("Added {} to inventory", item.name);
        Ok(item)
    }

    /// Build the stored item without writing it
    pub(crate) fn prepare(&self, new: NewEquipment) -> Equipment {
        let now = self.time.now_ms();
        Equipment {
            id: new
                .id
                .unwrap_or_else(|| format!("{}-{}", now, uuid::Uuid::new_v4().simple())),
            name: new.name,
            equipment_type: new.equipment_type,
            rarity: new.rarity,
            stats: new.stats,
            value: new.value,
            enhancement: 0,
            acquired_at: now,
        }
    }

    /// Put an item in its slot, replacing the previous occupant
    pub fn equip(&self, id: &str) -> ActionResult<Option<Equipment>> {
        let item = self.require(id)?;
        if !item.equipment_type.is_slot() {
            return Err(Rejection::NotEquippable(item.name).into());
        }
        let mut slots = self.equipped_slots()?;
        let previous = slots.insert(item.equipment_type, item.id.clone());
        self.store
            .put(Collection::Equipment, &EquippedRecord::new(slots))?;

        let replaced = match previous {
            Some(prev) if prev != item.id => self.get(&prev)?,
            _ => None,
        };
        info!("Equipped {}", item.name);
        Ok(replaced)
    }

    pub fn unequip(&self, slot: EquipmentType) -> ActionResult<Equipment> {
        let mut slots = self.equipped_slots()?;
        let id = slots
            .remove(&slot)
            .ok_or_else(|| Rejection::SlotEmpty(slot.as_str().to_string()))?;
        self.store
            .put(Collection::Equipment, &EquippedRecord::new(slots))?;
        self.require(&id)
    }

    /// Sell an unequipped item for gold
    pub fn sell(&self, id: &str) -> ActionResult<(i64, ResourceState)> {
        let item = self.require(id)?;
        if self.equipped_slots()?.values().any(|e| *e == item.id) {
            return Err(Rejection::ItemEquipped.into());
        }

        let price = item.sell_price();
        let state = self.ledger.require()?;
        let resources = self
            .ledger
            .try_save(&state.with_delta(ResourceTarget::Gold, price))?;
        self.store.delete(Collection::Equipment, &item.id)?;

        info!("Sold {} for {} gold", item.name, price);
        Ok((price, resources))
    }

    /// Consume materials to raise an item's stats.
    ///
    /// Each material adds its value (or 5) percent; every stat becomes
    /// `floor(stat * (1 + percent / 100))`.
    pub fn enhance(&self, id: &str, material_ids: &[String]) -> ActionResult<Equipment> {
        let mut item = self.require(id)?;
        if !item.equipment_type.is_slot() {
            return Err(Rejection::NotEquippable(item.name).into());
        }

        let mut materials = Vec::with_capacity(material_ids.len());
        for material_id in material_ids {
            if *material_id == item.id || materials.iter().any(|m: &Equipment| m.id == *material_id) {
                return Err(Rejection::InvalidMaterial(material_id.clone()).into());
            }
            let material = self.require(material_id)?;
            if material.equipment_type != EquipmentType::Material {
                return Err(Rejection::InvalidMaterial(material.name).into());
            }
            materials.push(material);
        }

        let percent: i64 = materials.iter().map(Equipment::enhancement_value).sum();
        let factor = 1.0 + percent as f64 / 100.0;
        for value in item.stats.values_mut() {
            *value = (*value as f64 * factor).floor() as i64;
        }
        item.enhancement += percent;

        self.store.batch(|tx| {
            for material in &materials {
                tx.delete(Collection::Equipment, &material.id)?;
            }
            tx.put(Collection::Equipment, &item)?;
            Ok(())
        })?;

        info!("Enhanced {} by {}%", item.name, percent);
        Ok(item)
    }

    pub fn equipped_stats(&self) -> Result<EquipmentStats, StoreError> {
        let mut total = EquipmentStats::default();
        for item in self.equipped()? {
            total.add(&item.stats);
        }
        Ok(total)
    }
}
