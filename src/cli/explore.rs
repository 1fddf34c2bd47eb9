//! Exploration commands

use anyhow::Result;

use idlecraft::Game;
use idlecraft::exploration::SubEventOutcome;

pub async fn list_command(game: &Game) -> Result<()> {
    let level = game.ledger().require()?.level;
    for status in game.exploration.areas()? {
        let area = status.area;
        let lock = match (status.unlocked, area.min_level <= level) {
            (true, true) => "open",
            (true, false) => "level",
            (false, _) => "locked",
        };
        println!(
            "  {} {:<18} [{:<6}] lvl {:>2}  energy {:>2}  {:>4.1}s  gold {}-{}  exp {}-{}",
            area.id,
            area.name,
            lock,
            area.min_level,
            area.energy_cost,
            area.duration_ms as f64 / 1000.0,
            area.gold.min,
            area.gold.max,
            area.experience.min,
            area.experience.max
        );
    }
    Ok(())
}

pub async fn start_command(game: &Game, area_id: u32) -> Result<()> {
    let state = game.start_exploration(area_id)?;
    println!(
        "Exploring area {} for {:.1}s",
        state.area_id,
        state.duration as f64 / 1000.0
    );
    Ok(())
}

pub async fn unlock_command(game: &Game, area_id: u32) -> Result<()> {
    let area = game.exploration.unlock_area(area_id)?;
    println!("Unlocked {}", area.name);
    Ok(())
}

pub async fn complete_command(game: &Game) -> Result<()> {
    let state = game.exploration.complete(&mut rand::thread_rng())?;
    let rewards = state.rewards.unwrap_or_default();
    println!("Found {} gold and {} exp", rewards.gold, rewards.experience);
    for event in &state.events {
        let outcome = match event.outcome {
            Some(SubEventOutcome::Victory) => " (victory)",
            Some(SubEventOutcome::Defeat) => " (defeat)",
            Some(SubEventOutcome::Solved) => " (solved)",
            Some(SubEventOutcome::Failed) => " (failed)",
            None => "",
        };
        println!("  {}{}: {}", event.kind.as_str(), outcome, event.description);
    }
    for item in &state.items {
        println!("  Item: {}", item.name);
    }
    Ok(())
}

pub async fn claim_command(game: &Game) -> Result<()> {
    let claim = game.exploration.claim()?;
    println!(
        "Claimed +{} gold +{} exp, {} items",
        claim.grant.reward.gold,
        claim.grant.reward.experience,
        claim.items.len()
    );
    super::print_resources(&claim.grant.resources);
    super::print_report(&claim.report);
    Ok(())
}

pub async fn history_command(game: &Game) -> Result<()> {
    let history = game.exploration.history()?;
    if history.is_empty() {
        println!("No expeditions yet.");
    }
    for entry in history.iter().rev() {
        println!(
            "  {} +{} gold +{} exp, {} events, {} items",
            entry.area_name,
            entry.rewards.gold,
            entry.rewards.experience,
            entry.events.len(),
            entry.items.len()
        );
    }
    Ok(())
}
