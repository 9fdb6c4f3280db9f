//! Command-line runner for the Gamelens extraction engine.
//!
//! Reads a game configuration and a JSON Lines event file, splits the
//! events into analysis units, runs each unit through a
//! [`UnitProcessor`], and prints one JSON object per unit on stdout.
//!
//! # Run Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load the game configuration
//! 3. Read and group events
//! 4. Process each unit and write its output

mod error;
mod units;

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use gamelens_core::config::GameConfig;
use gamelens_core::loader::GeneratorLoader;
use gamelens_core::processor::UnitProcessor;
use gamelens_types::ExtractionMode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// How events are grouped into units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum UnitMode {
    /// One unit per session.
    Session,
    /// One unit per player.
    Player,
    /// All events as one unit.
    Population,
}

impl From<UnitMode> for ExtractionMode {
    fn from(mode: UnitMode) -> Self {
        match mode {
            UnitMode::Session => Self::Session,
            UnitMode::Player => Self::Player,
            UnitMode::Population => Self::Population,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "gamelens-engine")]
#[command(about = "Extract features from game telemetry events")]
#[command(version)]
struct Cli {
    /// Game configuration file (YAML, or JSON with a `.json` extension)
    #[arg(long)]
    config: PathBuf,

    /// Events file, one JSON event per line
    #[arg(long)]
    events: PathBuf,

    /// Extraction mode
    #[arg(long, value_enum, default_value_t = UnitMode::Session)]
    mode: UnitMode,

    /// Only extract these features (plus their direct dependencies)
    #[arg(long = "feature", value_name = "NAME")]
    features: Vec<String>,

    /// Also run the configured detectors
    #[arg(long)]
    detectors: bool,
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration or events cannot be read, or if
/// any unit fails to load or harvest.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_target(true)
        .init();

    let cli = Cli::parse();
    info!("gamelens-engine starting");
    run(&cli)?;
    Ok(())
}

fn run(cli: &Cli) -> Result<(), EngineError> {
    let mode = ExtractionMode::from(cli.mode);

    let config = GameConfig::from_file(&cli.config)?;
    info!(
        game = %config.game_id,
        extractors = config.extractors.len(),
        detectors = config.detectors.len(),
        "Configuration loaded"
    );

    let events = units::read_events(&cli.events)?;
    let event_count = events.len();
    let units = units::group_units(events, mode);
    info!(events = event_count, units = units.len(), %mode, "Events grouped");

    let overrides = (!cli.features.is_empty()).then_some(cli.features.as_slice());
    let loader = GeneratorLoader::builtin_only(mode);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for unit in &units {
        let mut processor = UnitProcessor::new(
            &config,
            &loader,
            mode,
            overrides,
            unit.player_id.as_deref(),
            unit.session_id.as_deref(),
        )?;
        if cli.detectors {
            processor = processor.with_detectors(&config, &loader)?;
        }
        processor.process_events(&unit.events);
        let output = processor.finish()?;
        serde_json::to_writer(&mut out, &output)?;
        writeln!(out)?;
    }
    out.flush()?;

    info!(units = units.len(), "gamelens-engine finished");
    Ok(())
}
