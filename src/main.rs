use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use idlecraft::clock::TokioProgressClock;
use idlecraft::config::Config;

mod cli;

#[derive(Parser)]
#[command(name = "idlecraft")]
#[command(about = "Idle game progression engine: tasks, exploration, shop and more")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.idlecraft/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file and create the save
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show resources, running task and exploration
    Status,

    /// Timed tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Area exploration
    Explore {
        #[command(subcommand)]
        action: ExploreAction,
    },

    /// Buy items
    Shop {
        #[command(subcommand)]
        action: ShopAction,
    },

    /// Skill upgrades
    Skill {
        #[command(subcommand)]
        action: SkillAction,
    },

    /// Equipment inventory
    Gear {
        #[command(subcommand)]
        action: GearAction,
    },

    /// Random events
    Event {
        #[command(subcommand)]
        action: EventAction,
    },

    /// Daily tasks
    Daily {
        #[command(subcommand)]
        action: DailyAction,
    },

    /// Achievements
    Achievement {
        #[command(subcommand)]
        action: AchievementAction,
    },

    /// Pets
    Pet {
        #[command(subcommand)]
        action: PetAction,
    },

    /// Show unread notifications
    Notifications {
        /// Include ones already read
        #[arg(long)]
        all: bool,
    },

    /// Write the save as JSON
    Export { file: PathBuf },

    /// Merge a JSON save into the current one
    Import { file: PathBuf },

    /// Delete all progress
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    List,
    Start {
        task_id: u32,
        /// Show progress and claim when done
        #[arg(long)]
        watch: bool,
    },
    Claim,
    Cancel,
}

#[derive(Subcommand)]
enum ExploreAction {
    List,
    Start { area_id: u32 },
    Unlock { area_id: u32 },
    Complete,
    Claim,
    History,
}

#[derive(Subcommand)]
enum ShopAction {
    List,
    Buy { item_id: String },
}

#[derive(Subcommand)]
enum SkillAction {
    List,
    Upgrade { skill_id: String },
}

#[derive(Subcommand)]
enum GearAction {
    List,
    Equip { item_id: String },
    Unequip { slot: String },
    Sell { item_id: String },
    Enhance {
        item_id: String,
        #[arg(required = true)]
        materials: Vec<String>,
    },
}

#[derive(Subcommand)]
enum EventAction {
    List,
    Trigger,
    Apply { event_id: String },
}

#[derive(Subcommand)]
enum DailyAction {
    List,
    Refresh {
        /// Regenerate even within the same hour
        #[arg(long)]
        force: bool,
    },
    Claim { task_id: String },
}

#[derive(Subcommand)]
enum AchievementAction {
    List,
    Claim { id: String },
}

#[derive(Subcommand)]
enum PetAction {
    List,
    Capture {
        name: String,
        /// attack, defense, utility, gold or energy
        #[arg(long, default_value = "gold")]
        kind: String,
    },
    Feed { pet_id: String, experience: i64 },
    Activate { pet_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    if let Commands::Init { force } = cli.command {
        return cli::init::init_command(cli.config.as_deref(), force).await;
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Task {
            action: TaskAction::Start { task_id, watch: true },
        } => {
            let (clock, events) = TokioProgressClock::new();
            let game = cli::start_session(&config, Arc::new(clock))?;
            cli::task::start_command(&game, task_id, Some(events)).await?;
        }
        Commands::Reset { yes } => {
            let game = cli::open_game(&config, Arc::new(idlecraft::clock::NoopProgressClock::new()))?;
            cli::save::reset_command(&game, yes).await?;
        }
        command => {
            let game = cli::headless_session(&config)?;
            run(&game, command).await?;
        }
    }

    Ok(())
}

async fn run(game: &idlecraft::Game, command: Commands) -> Result<()> {
    match command {
        Commands::Status => cli::status::status_command(game).await,
        Commands::Task { action } => match action {
            TaskAction::List => cli::task::list_command(game).await,
            TaskAction::Start { task_id, .. } => cli::task::start_command(game, task_id, None).await,
            TaskAction::Claim => cli::task::claim_command(game).await,
            TaskAction::Cancel => cli::task::cancel_command(game).await,
        },
        Commands::Explore { action } => match action {
            ExploreAction::List => cli::explore::list_command(game).await,
            ExploreAction::Start { area_id } => cli::explore::start_command(game, area_id).await,
            ExploreAction::Unlock { area_id } => cli::explore::unlock_command(game, area_id).await,
            ExploreAction::Complete => cli::explore::complete_command(game).await,
            ExploreAction::Claim => cli::explore::claim_command(game).await,
            ExploreAction::History => cli::explore::history_command(game).await,
        },
        Commands::Shop { action } => match action {
            ShopAction::List => cli::economy::shop_list_command(game).await,
            ShopAction::Buy { item_id } => cli::economy::shop_buy_command(game, &item_id).await,
        },
        Commands::Skill { action } => match action {
            SkillAction::List => cli::economy::skill_list_command(game).await,
            SkillAction::Upgrade { skill_id } => {
                cli::economy::skill_upgrade_command(game, &skill_id).await
            }
        },
        Commands::Gear { action } => match action {
            GearAction::List => cli::economy::gear_list_command(game).await,
            GearAction::Equip { item_id } => cli::economy::gear_equip_command(game, &item_id).await,
            GearAction::Unequip { slot } => cli::economy::gear_unequip_command(game, &slot).await,
            GearAction::Sell { item_id } => cli::economy::gear_sell_command(game, &item_id).await,
            GearAction::Enhance { item_id, materials } => {
                cli::economy::gear_enhance_command(game, &item_id, &materials).await
            }
        },
        Commands::Event { action } => match action {
            EventAction::List => cli::progress::event_list_command(game).await,
            EventAction::Trigger => cli::progress::event_trigger_command(game).await,
            EventAction::Apply { event_id } => {
                cli::progress::event_apply_command(game, &event_id).await
            }
        },
        Commands::Daily { action } => match action {
            DailyAction::List => cli::progress::daily_list_command(game).await,
            DailyAction::Refresh { force } => cli::progress::daily_refresh_command(game, force).await,
            DailyAction::Claim { task_id } => cli::progress::daily_claim_command(game, &task_id).await,
        },
        Commands::Achievement { action } => match action {
            AchievementAction::List => cli::progress::achievement_list_command(game).await,
            AchievementAction::Claim { id } => {
                cli::progress::achievement_claim_command(game, &id).await
            }
        },
        Commands::Pet { action } => match action {
            PetAction::List => cli::progress::pet_list_command(game).await,
            PetAction::Capture { name, kind } => {
                cli::progress::pet_capture_command(game, &name, &kind).await
            }
            PetAction::Feed { pet_id, experience } => {
                cli::progress::pet_feed_command(game, &pet_id, experience).await
            }
            PetAction::Activate { pet_id } => cli::progress::pet_activate_command(game, &pet_id).await,
        },
        Commands::Notifications { all } => cli::inbox::notifications_command(game, all).await,
        Commands::Export { file } => cli::save::export_command(game, &file).await,
        Commands::Import { file } => cli::save::import_command(game, &file).await,
        Commands::Init { .. } | Commands::Reset { .. } => Ok(()),
    }
}
