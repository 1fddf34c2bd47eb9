//! Configuration loading and management

mod io;
mod settings;

pub use settings::{GameplaySettings, StoreSettings};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub gameplay: GameplaySettings,
}

impl Config {
    /// Save database path, falling back to `~/.idlecraft/save.db`
    pub fn database_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| Self::global_config_dir().join("save.db"))
    }
}
