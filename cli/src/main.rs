mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    AppTracker, ChartKind, GoalArgs, cmd_backup, cmd_chart, cmd_dashboard, cmd_delete,
    cmd_entries, cmd_export, cmd_goal_clear, cmd_goal_set, cmd_goal_show, cmd_import, cmd_log,
    cmd_reset, cmd_restore, cmd_unit, cmd_update,
};
use crate::config::Config;
use deficit_core::export::ExportFormat;
use deficit_core::models::UpdateEntry;
use deficit_core::store::SqliteStore;
use deficit_core::tracker::{LoadSource, Tracker};

#[derive(Parser)]
#[command(
    name = "deficit",
    version,
    about = "A local-first weight-loss tracker",
    long_about = "Track daily calories in and out against a weight-loss goal.\n\
                  Data lives in a local SQLite file with a backup snapshot."
)]
struct Cli {
    /// Log storage activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the weight-loss goal
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Show or change the weight unit (converts stored weights)
    Unit {
        /// New unit: lbs or kg (omit to show the current one)
        unit: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a day; merges into an existing entry for the same date
    Log {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Calories eaten
        #[arg(long = "in", value_name = "KCAL")]
        calories_in: Option<f64>,
        /// Calories burned
        #[arg(long = "out", value_name = "KCAL")]
        calories_out: Option<f64>,
        /// Body weight in the current unit
        #[arg(short, long)]
        weight: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change fields of an existing entry
    Update {
        /// Entry date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: String,
        /// Calories eaten
        #[arg(long = "in", value_name = "KCAL")]
        calories_in: Option<f64>,
        /// Calories burned
        #[arg(long = "out", value_name = "KCAL")]
        calories_out: Option<f64>,
        /// Body weight in the current unit
        #[arg(short, long, conflicts_with = "clear_weight")]
        weight: Option<f64>,
        /// Remove the recorded weight
        #[arg(long)]
        clear_weight: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the entry for a date
    Delete {
        /// Entry date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List entries with net calories and deficit
    Entries {
        /// Only the last N days (default: all)
        #[arg(short, long)]
        days: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Progress toward the goal and adherence
    Dashboard {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a progress series as a table
    Chart {
        #[arg(value_enum)]
        kind: ChartKind,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export entries and goal to CSV or JSON
    Export {
        /// csv or json
        #[arg(short, long, default_value = "csv")]
        format: String,
        /// Output path, `-` for stdout (default: fat-loss-data-<date>.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import entries from a CSV or JSON file
    Import {
        /// Path to the .csv or .json file
        file: PathBuf,
        /// Apply without asking
        #[arg(short, long)]
        yes: bool,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a full backup snapshot (default: stdout)
    Backup {
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace all data with a backup snapshot
    Restore {
        file: PathBuf,
        /// Restore without asking
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all data
    Reset {
        /// Reset without asking
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Set the goal, replacing any existing one
    Set {
        /// Starting weight
        #[arg(long)]
        start_weight: f64,
        /// Target weight
        #[arg(long)]
        target_weight: f64,
        /// Planned daily calorie deficit
        #[arg(long)]
        deficit: f64,
        /// Start date (default: today)
        #[arg(long)]
        start_date: Option<String>,
        /// Target date (default: projected from weight and deficit)
        #[arg(long)]
        target_date: Option<String>,
        /// Unit of the weights: lbs or kg (default: current unit)
        #[arg(short, long)]
        unit: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the current goal
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the goal
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn open_tracker() -> Result<AppTracker> {
    let config = Config::load()?;
    debug!(data_dir = %config.data_dir.display(), db = %config.db_path.display(), "opening database");
    let store = SqliteStore::open(&config.db_path)?;
    let tracker = Tracker::load(store);
    if tracker.load_source() == LoadSource::Backup {
        eprintln!("Primary data was missing or unreadable; restored from backup.");
    }
    Ok(tracker)
}

fn run(cli: Cli) -> Result<()> {
    let mut tracker = open_tracker()?;
    let t = &mut tracker;

    match cli.command {
        Commands::Goal { command } => match command {
            GoalCommands::Set {
                start_weight,
                target_weight,
                deficit,
                start_date,
                target_date,
                unit,
                json,
            } => cmd_goal_set(
                t,
                GoalArgs {
                    start_weight,
                    target_weight,
                    deficit,
                    start_date,
                    target_date,
                    unit,
                },
                json,
            ),
            GoalCommands::Show { json } => cmd_goal_show(t, json),
            GoalCommands::Clear { json } => cmd_goal_clear(t, json),
        },
        Commands::Unit { unit, json } => cmd_unit(t, unit.as_deref(), json),
        Commands::Log {
            date,
            calories_in,
            calories_out,
            weight,
            json,
        } => cmd_log(t, date, calories_in, calories_out, weight, json),
        Commands::Update {
            date,
            calories_in,
            calories_out,
            weight,
            clear_weight,
            json,
        } => {
            let update = UpdateEntry {
                calories_in,
                calories_out,
                weight: if clear_weight { Some(None) } else { weight.map(Some) },
            };
            cmd_update(t, &date, &update, json)
        }
        Commands::Delete { date, json } => cmd_delete(t, &date, json),
        Commands::Entries { days, json } => cmd_entries(t, days, json),
        Commands::Dashboard { json } => cmd_dashboard(t, json),
        Commands::Chart { kind, json } => cmd_chart(t, kind, json),
        Commands::Export {
            format,
            output,
            json,
        } => cmd_export(t, format.parse::<ExportFormat>()?, output, json),
        Commands::Import {
            file,
            yes,
            dry_run,
            json,
        } => cmd_import(t, &file, yes, dry_run, json),
        Commands::Backup { output, json } => cmd_backup(t, output, json),
        Commands::Restore { file, yes, json } => cmd_restore(t, &file, yes, json),
        Commands::Reset { yes, json } => cmd_reset(t, yes, json),
    }
}
