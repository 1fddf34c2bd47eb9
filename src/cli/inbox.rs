//! Notifications command implementation

use anyhow::Result;

use idlecraft::Game;
use idlecraft::notify::StoreNotifier;

/// Print stored notifications, newest first, and mark them read
pub async fn notifications_command(game: &Game, all: bool) -> Result<()> {
    let ctx = game.context();
    let inbox = StoreNotifier::new(
        ctx.store.clone(),
        ctx.time.clone(),
        ctx.gameplay.notification_limit,
    );

    let mut shown = 0;
    for record in inbox.list()? {
        if record.read && !all {
            continue;
        }
        println!(
            "  [{}] {}: {}",
            record.kind.as_str(),
            record.title,
            record.message
        );
        if !record.read {
            inbox.mark_read(&record.id)?;
        }
        shown += 1;
    }
    if shown == 0 {
        println!("No new notifications.");
    }
    Ok(())
}
