//! Timed task commands

use std::io::Write;

use anyhow::Result;
use tokio::sync::mpsc::UnboundedReceiver;

use idlecraft::Game;
use idlecraft::clock::ClockEvent;
use idlecraft::tasks::TIMED_TASKS;

pub async fn list_command(game: &Game) -> Result<()> {
    let sources = game.rewards.sources()?;
    for task in TIMED_TASKS {
        println!(
            "  {} {:<20} lvl {:>2}  energy {:>3}  {:>5.1}s  +{} gold +{} exp",
            task.id,
            task.name,
            task.min_level,
            sources.effective_energy_cost(task.energy_cost),
            sources.effective_duration(task.duration_ms, None) as f64 / 1000.0,
            task.reward.gold,
            task.reward.experience
        );
    }
    Ok(())
}

/// Start a task. With `progress` the command waits for the clock to reach
/// 100% and claims the reward.
pub async fn start_command(
    game: &Game,
    task_id: u32,
    progress: Option<UnboundedReceiver<ClockEvent>>,
) -> Result<()> {
    let started = game.tasks.start(task_id)?;
    println!(
        "Started task {} ({:.1}s, -{} energy)",
        task_id,
        started.task.duration as f64 / 1000.0,
        started.task.energy_spent
    );
    super::print_report(&started.report);

    let Some(mut events) = progress else {
        return Ok(());
    };
    while let Some(event) = events.recv().await {
        match event {
            ClockEvent::Progress { percent, .. } => {
                print!("\r  {:>3}%", percent);
                std::io::stdout().flush()?;
                if percent >= 100 {
                    println!();
                    break;
                }
            }
            ClockEvent::Cancelled => {
                println!("\n  Cancelled");
                return Ok(());
            }
        }
    }
    claim_command(game).await
}

pub async fn claim_command(game: &Game) -> Result<()> {
    let claim = game.tasks.claim()?;
    let grant = &claim.grant;
    match grant.multiplier {
        Some(m) => println!(
            "Claimed +{} gold +{} exp (x{})",
            grant.reward.gold, grant.reward.experience, m
        ),
        None => println!(
            "Claimed +{} gold +{} exp",
            grant.reward.gold, grant.reward.experience
        ),
    }
    super::print_resources(&grant.resources);
    super::print_report(&claim.report);
    Ok(())
}

pub async fn cancel_command(game: &Game) -> Result<()> {
    if game.tasks.cancel()? {
        println!("Task cancelled, energy is not refunded");
    } else {
        println!("No task running");
    }
    Ok(())
}
