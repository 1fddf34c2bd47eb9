//! Error types shared by the engine
//!
//! Two families of failure are kept apart on purpose:
//! - [`Rejection`]: the request was invalid (not enough gold, already claimed, ...)
//! - [`StoreError`]: the request was fine but the change could not be persisted
//!
//! Engine operations return [`ActionResult`], which wraps both.

use thiserror::Error;

/// Failure while talking to the save database
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record for collection '{collection}' has no usable 'id' field")]
    MissingKey { collection: &'static str },

    #[error("Save uses schema version {stored}, this build only knows {requested}")]
    VersionTooNew { stored: u32, requested: u32 },

    #[error("Save database lock poisoned")]
    LockPoisoned,
}

/// A precondition of a player action was not met
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("{what} '{id}' does not exist")]
    NotFound { what: &'static str, id: String },

    #[error("No game state exists yet")]
    NoGameState,

    #[error("Not enough gold: need {need}, have {have}")]
    InsufficientGold { need: i64, have: i64 },

    #[error("Not enough energy: need {need}, have {have}")]
    InsufficientEnergy { need: i64, have: i64 },

    #[error("Requires level {required}")]
    LevelTooLow { required: u32 },

    #[error("{0} is sold out")]
    SoldOut(String),

    #[error("{0} is already at max level")]
    MaxLevel(String),

    #[error("Reward already claimed")]
    AlreadyClaimed,

    #[error("Not completed yet")]
    NotCompleted,

    #[error("Still running, {remaining_ms} ms left")]
    StillRunning { remaining_ms: i64 },

    #[error("Nothing to claim")]
    NothingToClaim,

    #[error("No exploration in progress")]
    NotExploring,

    #[error("An exploration is already underway or waiting to be claimed")]
    ExplorationBusy,

    #[error("Area '{0}' is still locked")]
    AreaLocked(String),

    #[error("Equipped items cannot be sold, unequip first")]
    ItemEquipped,

    #[error("Nothing equipped in the {0} slot")]
    SlotEmpty(String),

    #[error("'{0}' cannot be equipped")]
    NotEquippable(String),

    #[error("'{0}' is not a usable enhancement material")]
    InvalidMaterial(String),

    #[error("Invalid save document: {0}")]
    InvalidImport(String),
}

impl Rejection {
    pub(crate) fn not_found(what: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }
}

/// Error returned by every engine operation
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("Change not persisted: {0}")]
    Storage(#[from] StoreError),
}

impl ActionError {
    /// The rejection, if the request itself was invalid
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(r) => Some(r),
            Self::Storage(_) => None,
        }
    }
}

pub type ActionResult<T> = Result<T, ActionError>;
