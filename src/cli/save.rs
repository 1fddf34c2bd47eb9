//! Export, import and reset commands

use std::path::Path;

use anyhow::{Context, Result, bail};

use idlecraft::Game;

pub async fn export_command(game: &Game, file: &Path) -> Result<()> {
    let Some(doc) = game.export()? else {
        bail!("Nothing to export yet");
    };
    let json = serde_json::to_string_pretty(&doc).context("Failed to serialize save")?;
    std::fs::write(file, json)
        .with_context(|| format!("Failed to write export: {}", file.display()))?;
    println!("Exported save (version {}) to {}", doc.version, file.display());
    Ok(())
}

pub async fn import_command(game: &Game, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read import: {}", file.display()))?;
    let count = game.import(&json)?;
    println!("Imported {} records", count);
    Ok(())
}

pub async fn reset_command(game: &Game, yes: bool) -> Result<()> {
    if !yes {
        bail!("Reset deletes the whole save. Re-run with --yes to confirm.");
    }
    game.reset()?;
    println!("Save reset");
    Ok(())
}
