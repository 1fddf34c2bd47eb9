//! Event, daily task, achievement and pet commands

use std::collections::BTreeMap;

use anyhow::{Result, bail};

use idlecraft::Game;
use idlecraft::equipment::Rarity;
use idlecraft::events::AppliedEvent;
use idlecraft::pets::{PetTemplate, PetType};

const STARTER_STAT: i64 = 5;

pub async fn event_list_command(game: &Game) -> Result<()> {
    let active = game.events.active_events()?;
    if active.is_empty() {
        println!("No active events.");
    }
    for event in active {
        println!("  {:<14} {}", event.id, event.name);
    }
    Ok(())
}

pub async fn event_trigger_command(game: &Game) -> Result<()> {
    match game.events.trigger_random_event(&mut rand::thread_rng())? {
        Some(event) => println!("Event: {} ({})", event.name, event.id),
        None => println!("Nothing happened."),
    }
    Ok(())
}

pub async fn event_apply_command(game: &Game, event_id: &str) -> Result<()> {
    match game.events.apply_event_effect(event_id)? {
        AppliedEvent::Resource { event, resources } => {
            println!("Applied {}", event.name);
            super::print_resources(&resources);
        }
        AppliedEvent::Armed(event) => {
            println!("{} stays active until the next task uses it", event.name)
        }
    }
    Ok(())
}

pub async fn daily_list_command(game: &Game) -> Result<()> {
    let tasks = game.daily().tasks()?;
    if tasks.is_empty() {
        println!("No daily tasks. Run `idlecraft daily refresh`.");
    }
    for task in tasks {
        let state = if task.claimed {
            "claimed"
        } else if task.completed {
            "done"
        } else {
            "open"
        };
        println!(
            "  {:<36} {:<7} {}/{}  {}  (+{} gold +{} exp)",
            task.id,
            state,
            task.progress,
            task.target,
            task.name,
            task.reward.gold,
            task.reward.experience
        );
    }
    Ok(())
}

pub async fn daily_refresh_command(game: &Game, force: bool) -> Result<()> {
    let mut rng = rand::thread_rng();
    let refreshed = if force {
        Some(game.daily().force_refresh(&mut rng)?)
    } else {
        game.daily().refresh(&mut rng)?
    };
    match refreshed {
        Some(tasks) => println!("{} new daily tasks", tasks.len()),
        None => println!("Daily tasks are still current"),
    }
    daily_list_command(game).await
}

pub async fn daily_claim_command(game: &Game, task_id: &str) -> Result<()> {
    let claim = game.triggers.claim_daily(task_id)?;
    println!(
        "Claimed {}: +{} gold +{} exp",
        claim.task.name, claim.task.reward.gold, claim.task.reward.experience
    );
    super::print_resources(&claim.resources);
    super::print_report(&claim.report);
    Ok(())
}

pub async fn achievement_list_command(game: &Game) -> Result<()> {
    let stats = game.triggers.statistics()?;
    let level = game.ledger().require()?.level;
    for achievement in game.triggers.achievements()? {
        let def = achievement.definition;
        let (current, target) = def.requirement.progress(&stats, level);
        let state = match (achievement.completed, achievement.reward_claimed) {
            (true, true) => "claimed".to_string(),
            (true, false) => "claimable".to_string(),
            _ => format!("{}/{}", current.min(target), target),
        };
        println!("  {:<14} {:<10} {}: {}", def.id.as_str(), state, def.name, def.description);
    }
    Ok(())
}

pub async fn achievement_claim_command(game: &Game, id: &str) -> Result<()> {
    let claim = game.triggers.claim_achievement(id)?;
    println!(
        "Claimed {}: +{} gold +{} exp",
        claim.achievement.name, claim.reward.gold, claim.reward.experience
    );
    super::print_resources(&claim.resources);
    Ok(())
}

pub async fn pet_list_command(game: &Game) -> Result<()> {
    let pets = game.pets.list()?;
    if pets.is_empty() {
        println!("No pets yet.");
    }
    for pet in pets {
        println!(
            " {} {:<28} {:<12} {:?} lvl {} ({}/{})",
            if pet.active { "*" } else { " " },
            pet.id,
            pet.name,
            pet.rarity,
            pet.level,
            pet.experience,
            pet.max_experience
        );
    }
    Ok(())
}

/// Capture a common pet whose single stat matches its kind
pub async fn pet_capture_command(game: &Game, name: &str, kind: &str) -> Result<()> {
    let (pet_type, stat) = match kind {
        "attack" => (PetType::Attack, "attack"),
        "defense" => (PetType::Defense, "defense"),
        "utility" => (PetType::Utility, "experience"),
        "gold" => (PetType::Gold, "gold"),
        "energy" => (PetType::Energy, "energy"),
        other => bail!("Unknown pet kind '{}'", other),
    };
    let pet = game.pets.capture(PetTemplate {
        name: name.to_string(),
        pet_type,
        rarity: Rarity::Common,
        stats: BTreeMap::from([(stat.to_string(), STARTER_STAT)]),
    })?;
    println!("Captured {} ({})", pet.name, pet.id);
    Ok(())
}

pub async fn pet_feed_command(game: &Game, pet_id: &str, experience: i64) -> Result<()> {
    let outcome = game.pets.feed(pet_id, experience)?;
    if outcome.levels_gained > 0 {
        println!("{} grew to level {}", outcome.pet.name, outcome.pet.level);
    } else {
        println!(
            "{}: {}/{} exp",
            outcome.pet.name, outcome.pet.experience, outcome.pet.max_experience
        );
    }
    Ok(())
}

pub async fn pet_activate_command(game: &Game, pet_id: &str) -> Result<()> {
    let pet = game.pets.activate(pet_id)?;
    println!("{} is now your active pet", pet.name);
    Ok(())
}
