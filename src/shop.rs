//! Shop: instant resources, timed boosts and permanent upgrades
//!
//! Stock counters and active boosts live in `shop/shopState`, permanent
//! effects in `shop/permanentEffects` (at most one per originating item).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::TimeSource;
use crate::error::{ActionResult, Rejection, StoreError};
use crate::ledger::{Ledger, ResourceState, ResourceTarget};
use crate::modifiers::ResourceKind;
use crate::store::snapshot::{ItemStockRecord, PermanentEffectsRecord, ShopStateRecord, keys};
use crate::store::{Collection, Store};
use crate::tasks::{EXPLORE_TASK_ID, GATHER_TASK_ID};

/// Stock value meaning "never sells out"
pub const UNLIMITED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostType {
    Gold,
    Experience,
    EnergyRegen,
    TaskSpeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effectType", rename_all = "snake_case")]
pub enum PermanentEffectKind {
    TaskBoost {
        #[serde(rename = "taskId")]
        task_id: u32,
        #[serde(rename = "resourceType")]
        resource: ResourceKind,
    },
    EnergySave,
}

/// Un-expiring modifier keyed by the item that granted it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermanentEffect {
    pub id: String,
    pub kind: PermanentEffectKind,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveBoost {
    pub id: String,
    #[serde(rename = "type")]
    pub boost_type: BoostType,
    pub value: f64,
    pub start_time: i64,
    pub end_time: i64,
}

impl ActiveBoost {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.end_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemEffect {
    Resource { target: ResourceTarget, value: i64 },
    Boost { boost: BoostType, value: f64, duration_ms: i64 },
    Permanent { kind: PermanentEffectKind, value: f64 },
}

#[derive(Debug, PartialEq)]
pub struct ShopItem {
    pub id: &'static str,
    pub name: &'static str,
    pub price: i64,
    pub effect: ItemEffect,
    pub min_level: u32,
    /// Total purchasable units, [`UNLIMITED`] for no cap
    pub stock: i32,
}

impl ShopItem {
    pub fn get(id: &str) -> Option<&'static ShopItem> {
        SHOP_ITEMS.iter().find(|i| i.id == id)
    }
}

const TEN_MINUTES: i64 = 600_000;

pub static SHOP_ITEMS: &[ShopItem] = &[
    ShopItem {
        id: "energy_potion",
        name: "Energy Potion",
        price: 50,
        effect: ItemEffect::Resource { target: ResourceTarget::Energy, value: 30 },
        min_level: 1,
        stock: UNLIMITED,
    },
    ShopItem {
        id: "energy_potion_max",
        name: "Grand Energy Potion",
        price: 200,
        effect: ItemEffect::Resource { target: ResourceTarget::Energy, value: 100 },
        min_level: 50,
        stock: UNLIMITED,
    },
    ShopItem {
        id: "exp_scroll",
        name: "Experience Scroll",
        price: 100,
        effect: ItemEffect::Resource { target: ResourceTarget::Experience, value: 50 },
        min_level: 1,
        stock: UNLIMITED,
    },
    ShopItem {
        id: "gold_boost",
        name: "Gold Charm",
        price: 200,
        effect: ItemEffect::Boost { boost: BoostType::Gold, value: 0.2, duration_ms: TEN_MINUTES },
        min_level: 1,
        stock: UNLIMITED,
    },
    ShopItem {
        id: "energy_regen",
        name: "Regeneration Tonic",
        price: 300,
        effect: ItemEffect::Boost { boost: BoostType::EnergyRegen, value: 0.5, duration_ms: TEN_MINUTES },
        min_level: 1,
        stock: UNLIMITED,
    },
    ShopItem {
        id: "energy_regen_max",
        name: "Grand Regeneration Tonic",
        price: 3000,
        effect: ItemEffect::Boost { boost: BoostType::EnergyRegen, value: 5.0, duration_ms: TEN_MINUTES },
        min_level: 50,
        stock: UNLIMITED,
    },
    ShopItem {
        id: "task_speed",
        name: "Haste Potion",
        price: 250,
        effect: ItemEffect::Boost { boost: BoostType::TaskSpeed, value: 0.3, duration_ms: TEN_MINUTES },
        min_level: 1,
        stock: UNLIMITED,
    },
    ShopItem {
        id: "task_speed_max",
        name: "Grand Haste Potion",
        price: 2500,
        effect: ItemEffect::Boost { boost: BoostType::TaskSpeed, value: 2.0, duration_ms: TEN_MINUTES },
        min_level: 50,
        stock: UNLIMITED,
    },
    ShopItem {
        id: "premium_pickaxe",
        name: "Premium Pickaxe",
        price: 500,
        effect: ItemEffect::Permanent {
            kind: PermanentEffectKind::TaskBoost { task_id: GATHER_TASK_ID, resource: ResourceKind::Gold },
            value: 0.15,
        },
        min_level: 1,
        stock: 1,
    },
    ShopItem {
        id: "explorer_map",
        name: "Explorer's Map",
        price: 500,
        effect: ItemEffect::Permanent {
            kind: PermanentEffectKind::TaskBoost { task_id: EXPLORE_TASK_ID, resource: ResourceKind::Experience },
            value: 0.15,
        },
        min_level: 5,
        stock: 1,
    },
    ShopItem {
        id: "energy_saver",
        name: "Energy Saver",
        price: 800,
        effect: ItemEffect::Permanent { kind: PermanentEffectKind::EnergySave, value: 0.1 },
        min_level: 10,
        stock: 1,
    },
    ShopItem {
        id: "energy_saver_max",
        name: "Perpetual Engine",
        price: 999_999,
        effect: ItemEffect::Permanent { kind: PermanentEffectKind::EnergySave, value: 1.0 },
        min_level: 50,
        stock: 1,
    },
];

/// Catalog item together with how many were bought
#[derive(Debug, Clone, PartialEq)]
pub struct ShopListing {
    pub item: &'static ShopItem,
    pub purchased: u32,
}

impl ShopListing {
    pub fn is_sold_out(&self) -> bool {
        self.item.stock != UNLIMITED && i64::from(self.purchased) >= i64::from(self.item.stock)
    }
}

/// What a purchase did
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseEffect {
    Resource { target: ResourceTarget, value: i64 },
    Boost(ActiveBoost),
    Permanent(PermanentEffect),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Purchase {
    pub item_id: &'static str,
    pub effect: PurchaseEffect,
    pub resources: ResourceState,
    pub purchased: u32,
}

/// Drop boosts with `end_time <= now`. Returns whether anything was removed.
pub fn sweep_expired(boosts: &mut Vec<ActiveBoost>, now: i64) -> bool {
    let before = boosts.len();
    boosts.retain(|b| !b.is_expired(now));
    boosts.len() != before
}

#[derive(Clone)]
pub struct Shop {
    store: Store,
    ledger: Ledger,
    time: Arc<dyn TimeSource>,
}

impl Shop {
    pub fn new(store: Store, ledger: Ledger, time: Arc<dyn TimeSource>) -> Self {
        Self { store, ledger, time }
    }

    fn state(&self) -> Result<ShopStateRecord, StoreError> {
        Ok(self
            .store
            .get(Collection::Shop, keys::SHOP_STATE)?
            .unwrap_or_else(ShopStateRecord::empty))
    }

    pub fn listings(&self) -> Result<Vec<ShopListing>, StoreError> {
        let state = self.state()?;
        Ok(SHOP_ITEMS
            .iter()
            .map(|item| ShopListing {
                item,
                purchased: state.purchased(item.id),
            })
            .collect())
    }

    /// Listings the player can currently buy
    pub fn available(&self, level: u32) -> Result<Vec<ShopListing>, StoreError> {
        Ok(self
            .listings()?
            .into_iter()
            .filter(|l| l.item.min_level <= level && !l.is_sold_out())
            .collect())
    }

    /// Remove expired boosts and persist the sweep. Returns whether anything expired.
    pub fn update_boosts(&self) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        let now = self.time.now_ms();
        if !sweep_expired(&mut state.active_boosts, now) {
            return Ok(false);
        }
        state.last_updated = now;
        self.store.put(Collection::Shop, &state)?;
        debug!("Expired shop boosts removed");
        Ok(true)
    }

    /// Unexpired boosts, after sweeping
    pub fn active_boosts(&self) -> Result<Vec<ActiveBoost>, StoreError> {
        self.update_boosts()?;
        Ok(self.state()?.active_boosts)
    }

    pub fn permanent_effects(&self) -> Result<Vec<PermanentEffect>, StoreError> {
        Ok(self
            .store
            .get::<PermanentEffectsRecord>(Collection::Shop, keys::PERMANENT_EFFECTS)?
            .map(|r| r.effects)
            .unwrap_or_default())
    }

    pub fn purchase(&self, item_id: &str) -> ActionResult<Purchase> {
        let item = ShopItem::get(item_id).ok_or_else(|| Rejection::not_found("Item", item_id))?;
        let now = self.time.now_ms();
        let mut state = self.state()?;
        sweep_expired(&mut state.active_boosts, now);

        let listing = ShopListing {
            item,
            purchased: state.purchased(item.id),
        };
        if listing.is_sold_out() {
            return Err(Rejection::SoldOut(item.name.to_string()).into());
        }

        let resources = self.ledger.require()?;
        if resources.level < item.min_level {
            return Err(Rejection::LevelTooLow {
                required: item.min_level,
            }
            .into());
        }
        if resources.gold < item.price {
            return Err(Rejection::InsufficientGold {
                need: item.price,
                have: resources.gold,
            }
            .into());
        }

        // Price and instant effects land in one ledger write
        let mut next = ResourceState {
            gold: resources.gold - item.price,
            ..resources
        };
        let effect = match item.effect {
            ItemEffect::Resource { target, value } => {
                next = next.with_delta(target, value);
                PurchaseEffect::Resource { target, value }
            }
            ItemEffect::Boost { boost, value, duration_ms } => PurchaseEffect::Boost(ActiveBoost {
                id: format!("{}_{}", item.id, now),
                boost_type: boost,
                value,
                start_time: now,
                end_time: now + duration_ms,
            }),
            ItemEffect::Permanent { kind, value } => PurchaseEffect::Permanent(PermanentEffect {
                id: item.id.to_string(),
                kind,
                value,
            }),
        };
        let resources = self.ledger.try_save(&next)?;

        let purchased = listing.purchased + 1;
        match state.items.iter_mut().find(|i| i.id == item.id) {
            Some(stock) => stock.purchased = purchased,
            None => state.items.push(ItemStockRecord {
                id: item.id.to_string(),
                purchased,
            }),
        }
        if let PurchaseEffect::Boost(boost) = &effect {
            state.active_boosts.push(boost.clone());
        }
        state.last_updated = now;

        let mut permanent = self.permanent_effects()?;
        self.store.batch(|tx| {
            if let PurchaseEffect::Permanent(new) = &effect {
                permanent.retain(|p| p.id != new.id);
                permanent.push(new.clone());
                tx.put(Collection::Shop, &PermanentEffectsRecord::new(permanent))?;
            }
            tx.put(Collection::Shop, &state)?;
            Ok(())
        })?;

        info!("Bought {} for {} gold", item.name, item.price);
        Ok(Purchase {
            item_id: item.id,
            effect,
            resources,
            purchased,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ManualTime;
    use crate::store::LATEST_VERSION;

    fn shop(state: ResourceState) -> (Shop, Ledger, Arc<ManualTime>) {
        let store = Store::open_in_memory(LATEST_VERSION).unwrap();
        let time = Arc::new(ManualTime::new(1_000));
        let ledger = Ledger::new(store.clone(), time.clone());
        ledger.init_if_missing(state).unwrap();
        (Shop::new(store, ledger.clone(), time.clone()), ledger, time)
    }

    fn player(gold: i64, energy: i64, level: u32) -> ResourceState {
        ResourceState {
            gold,
            experience: 0,
            energy,
            level,
        }
    }

    #[test]
    fn energy_potion_spends_all_gold() {
        let (shop, ledger, _) = shop(player(50, 50, 1));
        let purchase = shop.purchase("energy_potion").unwrap();
        assert_eq!(purchase.purchased, 1);

        let after = ledger.load().unwrap();
        assert_eq!((after.gold, after.energy), (0, 80));
        let listing = shop
            .listings()
            .unwrap()
            .into_iter()
            .find(|l| l.item.id == "energy_potion")
            .unwrap();
        assert_eq!(listing.purchased, 1);
    }

    #[test]
    fn potion_energy_is_capped() {
        let (shop, ledger, _) = shop(player(50, 90, 1));
        shop.purchase("energy_potion").unwrap();
        assert_eq!(ledger.load().unwrap().energy, 101);
    }

    #[test]
    fn limited_items_sell_out() {
        let (shop, ledger, _) = shop(player(2_000, 0, 1));
        shop.purchase("premium_pickaxe").unwrap();
        let err = shop.purchase("premium_pickaxe").unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::SoldOut(_))));
        assert_eq!(ledger.load().unwrap().gold, 1_500);

        let effects = shop.permanent_effects().unwrap();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].id, "premium_pickaxe");
    }

    #[test]
    fn level_and_gold_are_checked() {
        let (shop, ledger, _) = shop(player(5_000, 0, 1));
        let err = shop.purchase("energy_saver").unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::LevelTooLow { required: 10 }));

        ledger.save(&player(10, 0, 1));
        let err = shop.purchase("exp_scroll").unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&Rejection::InsufficientGold { need: 100, have: 10 })
        );
        assert!(shop.purchase("nothing").is_err());
    }

    #[test]
    fn boosts_stack_and_expire() {
        let (shop, _, time) = shop(player(1_000, 0, 1));
        shop.purchase("gold_boost").unwrap();
        time.advance(1_000);
        shop.purchase("gold_boost").unwrap();

        let boosts = shop.active_boosts().unwrap();
        assert_eq!(boosts.len(), 2);
        assert_eq!(boosts[0].id, "gold_boost_1000");

        // First boost ends exactly now, second one second later
        time.set(1_000 + TEN_MINUTES);
        assert_eq!(shop.active_boosts().unwrap().len(), 1);
        time.advance(1_000);
        assert!(shop.active_boosts().unwrap().is_empty());
        assert!(!shop.update_boosts().unwrap());
    }

    #[test]
    fn available_hides_sold_out_and_high_level_items() {
        let (shop, _, _) = shop(player(1_000, 0, 1));
        shop.purchase("premium_pickaxe").unwrap();
        let ids: Vec<&str> = shop.available(1).unwrap().iter().map(|l| l.item.id).collect();
        assert!(ids.contains(&"energy_potion"));
        assert!(!ids.contains(&"premium_pickaxe"));
        assert!(!ids.contains(&"energy_saver"));
    }
}
