//! idlecraft - progression and persistence engine for an idle game
//!
//! The engine owns the player's resources and everything that moves them:
//! timed tasks, exploration, a shop with boosts, skills, pets, equipment,
//! random events, daily tasks and achievements. State lives in a versioned
//! SQLite save with additive migrations and a JSON export format.
//!
//! ## Layout
//!
//! - [`store`]: the save database, migrations, record types and export
//! - [`ledger`]: the single writer of gold, experience, energy and level
//! - [`modifiers`]: how skills, boosts, events and pets shape costs and rewards
//! - [`tasks`] / [`exploration`]: the timed activities that earn rewards
//! - [`triggers`]: statistics, achievements and daily tasks
//! - [`game`]: a facade wiring everything to one [`context::GameContext`]

pub mod clock;
pub mod config;
pub mod context;
pub mod equipment;
pub mod error;
pub mod events;
pub mod exploration;
pub mod game;
pub mod ledger;
pub mod modifiers;
pub mod notify;
pub mod pets;
pub mod rewards;
pub mod shop;
pub mod skills;
pub mod store;
pub mod tasks;
pub mod time_bucket;
pub mod triggers;

pub use error::{ActionError, ActionResult, Rejection, StoreError};
pub use game::Game;
pub use ledger::ResourceState;
pub use modifiers::Reward;
