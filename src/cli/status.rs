//! Status command implementation

use anyhow::Result;

use idlecraft::Game;
use idlecraft::exploration::{ExplorationArea, ExplorationStatus};
use idlecraft::store::snapshot::NotificationRecord;
use idlecraft::store::Collection;
use idlecraft::tasks::TimedTask;

/// Show resources and everything currently running
pub async fn status_command(game: &Game) -> Result<()> {
    let Some(state) = game.ledger().load() else {
        println!("No game state yet. Run `idlecraft init`.");
        return Ok(());
    };
    super::print_resources(&state);
    let now = game.context().time.now_ms();

    if let Some(task) = game.tasks.active()? {
        let name = TimedTask::get(task.task_id).map_or("Unknown task", |t| t.name);
        if task.is_complete(now) {
            println!("Task: {} is done, claim it", name);
        } else {
            println!(
                "Task: {} {}% ({}s left)",
                name,
                task.progress_percent(now),
                task.remaining_ms(now) / 1000
            );
        }
    }

    if let Some(run) = game.exploration.state()? {
        let name = ExplorationArea::get(run.area_id).map_or("Unknown area", |a| a.name);
        match run.status {
            ExplorationStatus::Exploring => println!(
                "Exploring: {} {}%",
                name,
                game.exploration.progress_percent()?
            ),
            ExplorationStatus::Completed => println!("Exploration of {} ready to claim", name),
            ExplorationStatus::Claimed => {}
        }
    }

    let events = game.events.active_events()?;
    if !events.is_empty() {
        println!("Active events:");
        for event in events {
            println!("  {} ({})", event.name, event.id);
        }
    }

    let boosts = game.shop.active_boosts()?;
    for boost in boosts {
        println!(
            "Boost {:?} +{:.0}% for {}s",
            boost.boost_type,
            boost.value * 100.0,
            (boost.end_time - now).max(0) / 1000
        );
    }

    let notifications: Vec<NotificationRecord> = game.store().get_all(Collection::Notifications)?;
    let unread = notifications.iter().filter(|n| !n.read).count();
    if unread > 0 {
        println!("{} unread notifications", unread);
    }
    Ok(())
}
