//! Shared test utilities for engine integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use idlecraft::clock::NoopProgressClock;
use idlecraft::config::GameplaySettings;
use idlecraft::context::{GameContext, ManualTime};
use idlecraft::notify::MemoryNotifier;
use idlecraft::store::{LATEST_VERSION, Store};
use idlecraft::{Game, ResourceState};

/// 2024-05-01T10:00:00Z
pub const START_MS: i64 = 1_714_557_600_000;

pub struct TestGame {
    pub game: Game,
    pub time: Arc<ManualTime>,
    pub notifier: Arc<MemoryNotifier>,
    /// Keeps the on-disk save alive for the test
    pub dir: Option<TempDir>,
}

fn build(store: Store, dir: Option<TempDir>) -> TestGame {
    let time = Arc::new(ManualTime::new(START_MS));
    let notifier = Arc::new(MemoryNotifier::new());
    let ctx = GameContext::new(
        store,
        notifier.clone(),
        time.clone(),
        Arc::new(NoopProgressClock::new()),
        GameplaySettings::default(),
    );
    let game = Game::new(ctx);
    game.ensure_started().expect("Failed to create player");
    TestGame {
        game,
        time,
        notifier,
        dir,
    }
}

/// Fresh game on an in-memory save
pub fn memory_game() -> TestGame {
    build(
        Store::open_in_memory(LATEST_VERSION).expect("Failed to open store"),
        None,
    )
}

/// Fresh game on a save file inside a temp dir
pub fn disk_game() -> TestGame {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = Store::open(&dir.path().join("save.db"), LATEST_VERSION).expect("Failed to open store");
    build(store, Some(dir))
}

/// Overwrite the player's resources
pub fn set_resources(game: &Game, gold: i64, energy: i64, level: u32) {
    let state = game.ledger().load().expect("No game state");
    assert!(game.ledger().save(&ResourceState {
        gold,
        energy,
        level,
        ..state
    }));
}

pub fn resources(game: &Game) -> ResourceState {
    game.ledger().load().expect("No game state")
}

pub fn open_store(path: &Path, version: u32) -> Store {
    Store::open(path, version).expect("Failed to open store")
}
