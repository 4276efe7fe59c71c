mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use doze_core::{
    config::{settings_path, Settings},
    sensor::create_sensor,
    GestureConfig, SharedGestureConfig,
};
use std::{path::PathBuf, sync::Arc};

#[derive(Parser)]
#[command(name = "doze")]
#[command(about = "Proximity gestures for ambient display pulses", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Settings file (defaults to doze.toml in the local data directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSON-lines proximity trace and report the pulses it fires
    Replay {
        /// Trace file with screen, proximity and accuracy events
        trace: PathBuf,
        /// Enable the handwave gesture for this run
        #[arg(long)]
        handwave: bool,
        /// Enable the pocket gesture for this run
        #[arg(long)]
        pocket: bool,
        /// Behave as if the device had no proximity sensor
        #[arg(long)]
        no_sensor: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show all settings
    List,
    /// Show one setting
    Get {
        /// Setting key, e.g. gestures.handwave
        key: String,
    },
    /// Change one setting
    Set {
        /// Setting key, e.g. gestures.pocket
        key: String,
        /// New value
        value: String,
    },
    /// Print the settings file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();

    let settings_file = match cli.settings {
        Some(path) => path,
        None => settings_path()?,
    };

    match cli.command {
        Commands::Replay {
            trace,
            handwave,
            pocket,
            no_sensor,
        } => {
            let settings = Settings::load_from(&settings_file)?;
            let stored = settings.gesture_config();
            let config = GestureConfig::new(
                stored.handwave_enabled || handwave,
                stored.pocket_enabled || pocket,
            );
            let sensor = if no_sensor {
                None
            } else {
                create_sensor(settings.sensor_preference())
                    .map_err(|e| log::warn!("{e}"))
                    .ok()
            };
            commands::replay::handle_replay(
                &trace,
                Arc::new(SharedGestureConfig::new(config)),
                sensor,
            )
            .await
        }
        Commands::Config { action } => match action {
            ConfigAction::List => commands::config::handle_config_list(&settings_file),
            ConfigAction::Get { key } => commands::config::handle_config_get(&settings_file, &key),
            ConfigAction::Set { key, value } => {
                commands::config::handle_config_set(&settings_file, &key, &value)
            }
            ConfigAction::Path => {
                println!("{}", settings_file.display());
                Ok(())
            }
        },
    }
}
