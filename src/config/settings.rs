//! Settings configuration types

use serde::{Deserialize, Serialize};

/// Save database location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Path of the SQLite save file; `~/.idlecraft/save.db` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<std::path::PathBuf>,
}

/// Tunables of the game loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameplaySettings {
    /// Daily tasks generated per refresh
    #[serde(default = "default_daily_task_count")]
    pub daily_task_count: usize,

    /// Triggered events kept in the history
    #[serde(default = "default_history_limit")]
    pub event_history_limit: usize,

    /// Finished expeditions kept in the history
    #[serde(default = "default_history_limit")]
    pub exploration_history_limit: usize,

    /// Stored notifications, older ones are pruned
    #[serde(default = "default_history_limit")]
    pub notification_limit: usize,
}

fn default_daily_task_count() -> usize {
    3
}

fn default_history_limit() -> usize {
    50
}

impl Default for GameplaySettings {
    fn default() -> Self {
        Self {
            daily_task_count: default_daily_task_count(),
            event_history_limit: default_history_limit(),
            exploration_history_limit: default_history_limit(),
            notification_limit: default_history_limit(),
        }
    }
}
