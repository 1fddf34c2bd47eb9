//! Shared collaborators handed to every engine component
//!
//! Nothing in the engine reaches for globals: the store, the time source,
//! the notification sink and the progress clock all come from here.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::clock::ProgressClock;
use crate::config::GameplaySettings;
use crate::ledger::Ledger;
use crate::notify::NotificationSink;
use crate::store::Store;

/// Source of "now" in Unix milliseconds
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct WallTime;

impl TimeSource for WallTime {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven time, for tests and simulations
#[derive(Debug, Default)]
pub struct ManualTime {
    now: AtomicI64,
}

impl ManualTime {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Everything a component may need, built once per game session
#[derive(Clone)]
pub struct GameContext {
    pub store: Store,
    pub ledger: Ledger,
    pub notifier: Arc<dyn NotificationSink>,
    pub time: Arc<dyn TimeSource>,
    pub clock: Arc<dyn ProgressClock>,
    pub gameplay: GameplaySettings,
}

impl GameContext {
    pub fn new(
        store: Store,
        notifier: Arc<dyn NotificationSink>,
        time: Arc<dyn TimeSource>,
        clock: Arc<dyn ProgressClock>,
        gameplay: GameplaySettings,
    ) -> Self {
        let ledger = Ledger::new(store.clone(), time.clone());
        Self {
            store,
            ledger,
            notifier,
            time,
            clock,
            gameplay,
        }
    }
}
