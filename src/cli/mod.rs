//! CLI command implementations

pub mod economy;
pub mod explore;
pub mod inbox;
pub mod init;
pub mod progress;
pub mod save;
pub mod status;
pub mod task;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use idlecraft::clock::{NoopProgressClock, ProgressClock};
use idlecraft::config::Config;
use idlecraft::context::{GameContext, TimeSource, WallTime};
use idlecraft::notify::{FanoutNotifier, NotificationSink, StoreNotifier, TracingNotifier};
use idlecraft::store::{LATEST_VERSION, Store};
use idlecraft::triggers::TriggerReport;
use idlecraft::{Game, ResourceState};

/// Open the save named by `config` without touching game state
pub fn open_game(config: &Config, clock: Arc<dyn ProgressClock>) -> Result<Game> {
    let path = config.database_path();
    let store = Store::open(&path, LATEST_VERSION)
        .with_context(|| format!("Failed to open save: {}", path.display()))?;
    let time: Arc<dyn TimeSource> = Arc::new(WallTime);
    let sinks: Vec<Arc<dyn NotificationSink>> = vec![
        Arc::new(TracingNotifier),
        Arc::new(StoreNotifier::new(
            store.clone(),
            time.clone(),
            config.gameplay.notification_limit,
        )),
    ];
    let notifier = Arc::new(FanoutNotifier::new(sinks));
    let ctx = GameContext::new(store, notifier, time, clock, config.gameplay.clone());
    Ok(Game::new(ctx))
}

/// Open the save, create the player if needed and apply passive regen
pub fn start_session(config: &Config, clock: Arc<dyn ProgressClock>) -> Result<Game> {
    let game = open_game(config, clock)?;
    game.ensure_started()?;
    let gained = game.regenerate_energy()?;
    if gained > 0 {
        debug!(gained, "Energy regenerated");
    }
    Ok(game)
}

/// Session for commands that never start a progress clock
pub fn headless_session(config: &Config) -> Result<Game> {
    start_session(config, Arc::new(NoopProgressClock::new()))
}

pub fn print_resources(state: &ResourceState) {
    println!(
        "Level {} | Gold {} | Exp {} | Energy {}/{}",
        state.level,
        state.gold,
        state.experience,
        state.energy,
        state.max_energy()
    );
}

pub fn print_report(report: &TriggerReport) {
    for achievement in &report.achievements {
        println!("  Achievement unlocked: {}", achievement.name);
    }
    for task in &report.daily_tasks {
        println!("  Daily task done: {}", task.name);
    }
}
