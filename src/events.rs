//! Random events
//!
//! Events are drawn from a weighted catalog filtered by level. Resource
//! events pay out when applied; task speed and reward multiplier events
//! stay active until a task start or claim consumes them.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::TimeSource;
use crate::error::{ActionResult, Rejection, StoreError};
use crate::ledger::{Ledger, ResourceState, ResourceTarget};
use crate::notify::{NewNotification, NotificationKind, NotificationSink};
use crate::store::snapshot::{EventListRecord, keys};
use crate::store::{Collection, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPolarity {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEffect {
    Resource { resource: ResourceTarget, value: i64 },
    TaskSpeed { value: f64 },
    RewardMultiplier { value: f64 },
}

/// Effect kinds that wait for a task to consume them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEffectKind {
    TaskSpeed,
    RewardMultiplier,
}

impl EventEffect {
    fn is_kind(&self, kind: TaskEffectKind) -> bool {
        matches!(
            (self, kind),
            (EventEffect::TaskSpeed { .. }, TaskEffectKind::TaskSpeed)
                | (EventEffect::RewardMultiplier { .. }, TaskEffectKind::RewardMultiplier)
        )
    }
}

#[derive(Debug, PartialEq)]
pub struct GameEvent {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub polarity: EventPolarity,
    pub effect: EventEffect,
    pub weight: u32,
    pub min_level: u32,
}

impl GameEvent {
    pub fn get(id: &str) -> Option<&'static GameEvent> {
        EVENTS.iter().find(|e| e.id == id)
    }
}

pub static EVENTS: &[GameEvent] = &[
    GameEvent {
        id: "gold_rush",
        name: "Gold Rush",
        description: "A vein of gold turns up",
        polarity: EventPolarity::Positive,
        effect: EventEffect::Resource { resource: ResourceTarget::Gold, value: 50 },
        weight: 10,
        min_level: 1,
    },
    GameEvent {
        id: "energy_boost",
        name: "Second Wind",
        description: "You feel refreshed",
        polarity: EventPolarity::Positive,
        effect: EventEffect::Resource { resource: ResourceTarget::Energy, value: 20 },
        weight: 10,
        min_level: 1,
    },
    GameEvent {
        id: "exp_bonus",
        name: "Insight",
        description: "A lesson learned the easy way",
        polarity: EventPolarity::Positive,
        effect: EventEffect::Resource { resource: ResourceTarget::Experience, value: 30 },
        weight: 10,
        min_level: 1,
    },
    GameEvent {
        id: "task_speedup",
        name: "Tailwind",
        description: "The next task runs faster",
        polarity: EventPolarity::Positive,
        effect: EventEffect::TaskSpeed { value: 0.5 },
        weight: 8,
        min_level: 2,
    },
    GameEvent {
        id: "double_reward",
        name: "Lucky Star",
        description: "The next claim pays double",
        polarity: EventPolarity::Positive,
        effect: EventEffect::RewardMultiplier { value: 2.0 },
        weight: 5,
        min_level: 3,
    },
    GameEvent {
        id: "energy_drain",
        name: "Fatigue",
        description: "You lose some energy",
        polarity: EventPolarity::Negative,
        effect: EventEffect::Resource { resource: ResourceTarget::Energy, value: -10 },
        weight: 8,
        min_level: 2,
    },
    GameEvent {
        id: "gold_loss",
        name: "Pickpocket",
        description: "Some gold goes missing",
        polarity: EventPolarity::Negative,
        effect: EventEffect::Resource { resource: ResourceTarget::Gold, value: -20 },
        weight: 8,
        min_level: 2,
    },
    GameEvent {
        id: "task_slowdown",
        name: "Headwind",
        description: "The next task runs slower",
        polarity: EventPolarity::Negative,
        effect: EventEffect::TaskSpeed { value: -0.3 },
        weight: 6,
        min_level: 3,
    },
];

/// A triggered event instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEvent {
    /// Catalog id
    pub id: String,
    pub name: String,
    pub polarity: EventPolarity,
    pub effect: EventEffect,
    pub timestamp: i64,
}

impl ActiveEvent {
    fn from_catalog(event: &GameEvent, timestamp: i64) -> Self {
        Self {
            id: event.id.to_string(),
            name: event.name.to_string(),
            polarity: event.polarity,
            effect: event.effect,
            timestamp,
        }
    }
}

/// Result of applying an active event
#[derive(Debug, Clone, PartialEq)]
pub enum AppliedEvent {
    /// Resource effect paid out and removed from the active list
    Resource {
        event: ActiveEvent,
        resources: ResourceState,
    },
    /// Task effect left active until a task consumes it
    Armed(ActiveEvent),
}

/// Weighted draw: `r ~ U(0, total)`, subtract weights in order until `r <= 0`
pub fn select_weighted<'a, R: Rng + ?Sized>(
    candidates: &[&'a GameEvent],
    rng: &mut R,
) -> Option<&'a GameEvent> {
    let total: u32 = candidates.iter().map(|e| e.weight).sum();
    if total == 0 {
        return None;
    }
    let mut r = rng.r#gen::<f64>() * f64::from(total);
    for event in candidates {
        r -= f64::from(event.weight);
        if r <= 0.0 {
            return Some(*event);
        }
    }
    None
}

/// Catalog events available at `level`
pub fn eligible(level: u32) -> Vec<&'static GameEvent> {
    EVENTS.iter().filter(|e| e.min_level <= level).collect()
}

#[derive(Clone)]
pub struct EventManager {
    store: Store,
    ledger: Ledger,
    notifier: Arc<dyn NotificationSink>,
    time: Arc<dyn TimeSource>,
    history_limit: usize,
}

impl EventManager {
    pub fn new(
        store: Store,
        ledger: Ledger,
        notifier: Arc<dyn NotificationSink>,
        time: Arc<dyn TimeSource>,
        history_limit: usize,
    ) -> Self {
        Self {
            store,
            ledger,
            notifier,
            time,
            history_limit,
        }
    }

    fn list(&self, key: &str) -> Result<Vec<ActiveEvent>, StoreError> {
        Ok(self
            .store
            .get::<EventListRecord>(Collection::Events, key)?
            .map(|r| r.events)
            .unwrap_or_default())
    }

    /// Active events, oldest first
    pub fn active_events(&self) -> Result<Vec<ActiveEvent>, StoreError> {
        self.list(keys::ACTIVE_EVENTS)
    }

    /// Triggered events, oldest first
    pub fn history(&self) -> Result<Vec<ActiveEvent>, StoreError> {
        self.list(keys::EVENT_HISTORY)
    }

    pub(crate) fn replace_active(&self, events: Vec<ActiveEvent>) -> Result<(), StoreError> {
        let now = self.time.now_ms();
        self.store.put(
            Collection::Events,
            &EventListRecord::new(keys::ACTIVE_EVENTS, events, now),
        )?;
        Ok(())
    }

    /// Draw an event for the player's level and make it active
    pub fn trigger_random_event<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> ActionResult<Option<ActiveEvent>> {
        let state = self.ledger.require()?;
        let Some(chosen) = select_weighted(&eligible(state.level), rng) else {
            return Ok(None);
        };

        let now = self.time.now_ms();
        let event = ActiveEvent::from_catalog(chosen, now);

        let mut active = self.active_events()?;
        active.push(event.clone());
        let mut history = self.history()?;
        history.push(event.clone());
        if history.len() > self.history_limit {
            let excess = history.len() - self.history_limit;
            history.drain(..excess);
        }

        self.store.batch(|tx| {
            tx.put(
                Collection::Events,
                &EventListRecord::new(keys::ACTIVE_EVENTS, active, now),
            )?;
            tx.put(
                Collection::Events,
                &EventListRecord::new(keys::EVENT_HISTORY, history, now),
            )?;
            Ok(())
        })?;

        info!("Event triggered: {}", chosen.name);
        self.notifier.create_notification(
            NewNotification::new(NotificationKind::Event, chosen.name, chosen.description)
                .with_data(serde_json::json!({ "eventId": chosen.id })),
        );
        Ok(Some(event))
    }

    /// Apply the first active event with catalog id `event_id`
    pub fn apply_event_effect(&self, event_id: &str) -> ActionResult<AppliedEvent> {
        let mut active = self.active_events()?;
        let index = active
            .iter()
            .position(|e| e.id == event_id)
            .ok_or_else(|| Rejection::not_found("Active event", event_id))?;

        let EventEffect::Resource { resource, value } = active[index].effect else {
            return Ok(AppliedEvent::Armed(active[index].clone()));
        };

        let state = self.ledger.require()?;
        let resources = self.ledger.try_save(&state.with_delta(resource, value))?;
        let event = active.remove(index);
        self.replace_active(active)?;

        debug!("Applied event {}: {} {:+}", event.id, resource.as_str(), value);
        Ok(AppliedEvent::Resource { event, resources })
    }

    /// Remove and return the oldest active event of `kind`
    pub fn consume_task_effect(&self, kind: TaskEffectKind) -> Result<Option<ActiveEvent>, StoreError> {
        let Some((event, remaining)) = self.take_task_effect(kind)? else {
            return Ok(None);
        };
        self.store.put(Collection::Events, &remaining)?;
        debug!("Consumed event {}", event.id);
        Ok(Some(event))
    }

    /// The oldest active event of `kind` and the active list without it.
    /// Nothing is written.
    pub(crate) fn take_task_effect(
        &self,
        kind: TaskEffectKind,
    ) -> Result<Option<(ActiveEvent, EventListRecord)>, StoreError> {
        let mut active = self.active_events()?;
        let Some(index) = active.iter().position(|e| e.effect.is_kind(kind)) else {
            return Ok(None);
        };
        let event = active.remove(index);
        let remaining = EventListRecord::new(keys::ACTIVE_EVENTS, active, self.time.now_ms());
        Ok(Some((event, remaining)))
    }

    pub fn clear_active(&self) -> Result<(), StoreError> {
        self.replace_active(Vec::new())
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

    fn manager(level: u32, history_limit: usize) -> (EventManager, Ledger, Arc<MemoryNotifier>) {
        let store = Store::open_in_memory(LATEST_VERSION).unwrap();
        let time = Arc::new(ManualTime::new(0));
        let ledger = Ledger::new(store.clone(), time.clone());
        ledger
            .init_if_missing(ResourceState {
                level,
                energy: 50,
                gold: 100,
                ..ResourceState::new_player()
            })
            .unwrap();
        let notifier = Arc::new(MemoryNotifier::new());
        let manager = EventManager::new(store, ledger.clone(), notifier.clone(), time, history_limit);
        (manager, ledger, notifier)
    }

    #[test]
    fn weighted_selection_matches_weights() {
        let candidates = eligible(1);
        assert_eq!(candidates.len(), 3);
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts = [0u32; 3];
        let draws = 30_000;
        for _ in 0..draws {
            let chosen = select_weighted(&candidates, &mut rng).unwrap();
            let i = candidates.iter().position(|c| c.id == chosen.id).unwrap();
            counts[i] += 1;
        }
        for count in counts {
            let share = f64::from(count) / f64::from(draws);
            assert!((share - 1.0 / 3.0).abs() < 0.02, "share {share}");
        }
    }

    #[test]
    fn weighted_selection_respects_uneven_weights() {
        let candidates: Vec<&GameEvent> = ["gold_rush", "double_reward"]
            .iter()
            .map(|id| GameEvent::get(id).unwrap())
            .collect();
        let mut rng = StdRng::seed_from_u64(11);
        let draws = 30_000;
        let gold = (0..draws)
            .filter(|_| select_weighted(&candidates, &mut rng).unwrap().id == "gold_rush")
            .count();
        let share = gold as f64 / f64::from(draws);
        assert!((share - 10.0 / 15.0).abs() < 0.02, "share {share}");
        assert!(select_weighted(&[], &mut rng).is_none());
    }

    #[test]
    fn level_filters_catalog() {
        assert!(eligible(1).iter().all(|e| e.min_level == 1));
        assert_eq!(eligible(3).len(), EVENTS.len());
    }

    #[test]
    fn trigger_records_active_history_and_notifies() {
        let (manager, _, notifier) = manager(1, 50);
        let mut rng = StdRng::seed_from_u64(1);
        let event = manager.trigger_random_event(&mut rng).unwrap().unwrap();

        assert_eq!(manager.active_events().unwrap(), vec![event.clone()]);
        assert_eq!(manager.history().unwrap(), vec![event]);
        let notes = notifier.drain();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Event);
    }

    #[test]
    fn history_is_bounded() {
        let (manager, _, _) = manager(3, 5);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..8 {
            manager.trigger_random_event(&mut rng).unwrap();
        }
        assert_eq!(manager.history().unwrap().len(), 5);
        assert_eq!(manager.active_events().unwrap().len(), 8);
    }

    fn arm(manager: &EventManager, ids: &[&str]) {
        let events = ids
            .iter()
            .enumerate()
            .map(|(i, id)| ActiveEvent::from_catalog(GameEvent::get(id).unwrap(), i as i64))
            .collect();
        manager.replace_active(events).unwrap();
    }

    #[test]
    fn resource_event_pays_once_and_is_removed() {
        let (manager, ledger, _) = manager(2, 50);
        arm(&manager, &["gold_rush", "energy_drain"]);

        let applied = manager.apply_event_effect("gold_rush").unwrap();
        assert!(matches!(applied, AppliedEvent::Resource { .. }));
        assert_eq!(ledger.load().unwrap().gold, 150);

        manager.apply_event_effect("energy_drain").unwrap();
        assert_eq!(ledger.load().unwrap().energy, 40);

        assert!(manager.apply_event_effect("gold_rush").is_err());
        assert!(manager.active_events().unwrap().is_empty());
    }

    #[test]
    fn task_effects_stay_until_consumed_oldest_first() {
        let (manager, _, _) = manager(3, 50);
        arm(&manager, &["double_reward", "task_speedup", "double_reward"]);

        let applied = manager.apply_event_effect("double_reward").unwrap();
        assert!(matches!(applied, AppliedEvent::Armed(_)));
        assert_eq!(manager.active_events().unwrap().len(), 3);

        let first = manager
            .consume_task_effect(TaskEffectKind::RewardMultiplier)
            .unwrap()
            .unwrap();
        assert_eq!(first.timestamp, 0);
        let speed = manager.consume_task_effect(TaskEffectKind::TaskSpeed).unwrap();
        assert!(speed.is_some());
        assert!(manager.consume_task_effect(TaskEffectKind::TaskSpeed).unwrap().is_none());

        let left = manager.active_events().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].timestamp, 2);
    }
}
