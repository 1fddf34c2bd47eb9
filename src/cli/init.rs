//! Init command implementation

use std::path::Path;

use anyhow::{Result, bail};
use tracing::info;

use idlecraft::config::Config;

/// Write the default config file and create the save
pub async fn init_command(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::global_config_path);

    if path.exists() && !force {
        bail!(
            "Config already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    let config = Config::default();
    config.save_to_file(&path)?;
    info!("Wrote {}", path.display());

    let game = super::headless_session(&config)?;
    println!("Created {}", path.display());
    println!("Save database: {}", config.database_path().display());
    if let Some(state) = game.ledger().load() {
        super::print_resources(&state);
    }
    Ok(())
}
