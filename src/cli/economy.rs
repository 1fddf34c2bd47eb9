//! Shop, skill and gear commands

use anyhow::{Result, bail};

use idlecraft::Game;
use idlecraft::equipment::EquipmentType;
use idlecraft::shop::{PurchaseEffect, UNLIMITED};

pub async fn shop_list_command(game: &Game) -> Result<()> {
    let level = game.ledger().require()?.level;
    for listing in game.shop.available(level)? {
        let item = listing.item;
        let stock = if item.stock == UNLIMITED {
            "unlimited".to_string()
        } else if listing.is_sold_out() {
            "sold out".to_string()
        } else {
            format!("{} left", i64::from(item.stock) - i64::from(listing.purchased))
        };
        println!("  {:<20} {:>5} gold  {:<10} {}", item.id, item.price, stock, item.name);
    }
    Ok(())
}

pub async fn shop_buy_command(game: &Game, item_id: &str) -> Result<()> {
    let purchase = game.shop.purchase(item_id)?;
    match &purchase.effect {
        PurchaseEffect::Resource { target, value } => {
            println!("Bought {}: +{} {}", purchase.item_id, value, target.as_str())
        }
        PurchaseEffect::Boost(boost) => println!(
            "Bought {}: {:?} boost +{:.0}% for {}s",
            purchase.item_id,
            boost.boost_type,
            boost.value * 100.0,
            (boost.end_time - boost.start_time) / 1000
        ),
        PurchaseEffect::Permanent(effect) => println!(
            "Bought {}: permanent +{:.0}%",
            effect.id,
            effect.value * 100.0
        ),
    }
    super::print_resources(&purchase.resources);
    Ok(())
}

pub async fn skill_list_command(game: &Game) -> Result<()> {
    for skill in game.skills.list()? {
        let def = skill.definition;
        let next = if skill.is_maxed() {
            "maxed".to_string()
        } else {
            format!("next {} gold", skill.upgrade_cost())
        };
        println!(
            "  {:<16} {}/{}  {:<14} {}",
            def.id, skill.current_level, def.max_level, next, def.description
        );
    }
    Ok(())
}

pub async fn skill_upgrade_command(game: &Game, skill_id: &str) -> Result<()> {
    let upgrade = game.skills.upgrade(skill_id)?;
    println!(
        "{} is now level {} (-{} gold)",
        upgrade.skill.definition.name, upgrade.skill.current_level, upgrade.cost
    );
    super::print_resources(&upgrade.resources);
    Ok(())
}

pub async fn gear_list_command(game: &Game) -> Result<()> {
    let equipped = game.armory.equipped_slots()?;
    for item in game.armory.list()? {
        let marker = if equipped.get(&item.equipment_type) == Some(&item.id) {
            "*"
        } else {
            " "
        };
        let stats: Vec<String> = item.stats.iter().map(|(k, v)| format!("{k} {v}")).collect();
        println!(
            " {} {:<28} {:<9} {:?} {} (+{}%)",
            marker,
            item.id,
            item.equipment_type.as_str(),
            item.rarity,
            stats.join(", "),
            item.enhancement
        );
    }
    let totals = game.armory.equipped_stats()?;
    println!(
        "Equipped: attack {} defense {} health {} speed {} critical {}",
        totals.attack, totals.defense, totals.health, totals.speed, totals.critical
    );
    Ok(())
}

pub async fn gear_equip_command(game: &Game, item_id: &str) -> Result<()> {
    if let Some(previous) = game.armory.equip(item_id)? {
        println!("Equipped {}, replaced {}", item_id, previous.name);
    } else {
        println!("Equipped {}", item_id);
    }
    Ok(())
}

pub async fn gear_unequip_command(game: &Game, slot: &str) -> Result<()> {
    let Some(slot) = slot.parse::<EquipmentType>().ok().filter(EquipmentType::is_slot) else {
        bail!("Unknown slot '{}'", slot);
    };
    let item = game.armory.unequip(slot)?;
    println!("Unequipped {}", item.name);
    Ok(())
}

pub async fn gear_sell_command(game: &Game, item_id: &str) -> Result<()> {
    let (price, resources) = game.armory.sell(item_id)?;
    println!("Sold {} for {} gold", item_id, price);
    super::print_resources(&resources);
    Ok(())
}

pub async fn gear_enhance_command(game: &Game, item_id: &str, materials: &[String]) -> Result<()> {
    let item = game.armory.enhance(item_id, materials)?;
    println!("{} is now +{}%", item.name, item.enhancement);
    Ok(())
}
