use beatgrid::messaging::channels::TriggerConsumer;
use beatgrid::project::{load_config, load_pattern_file, save_config, save_pattern_file};
use beatgrid::{
    AudioGate, EngineConfig, InstrumentBank, InstrumentRegistry, PatternFile, PlaybackEngine,
    PlaybackPosition, SequencerPlayer, Tempo, create_trigger_channel,
};
use clap::{Parser, Subcommand};
use ringbuf::traits::Consumer;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

// How often the trigger buffer is drained
const DRAIN_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Parser)]
#[command(name = "beatgrid")]
#[command(about = "Step sequencer playback engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a pattern and log every trigger sent to the audio backend
    Play {
        /// Pattern file (JSON), the demo pattern when omitted
        #[arg(short, long)]
        pattern: Option<PathBuf>,

        /// Engine configuration (RON)
        #[arg(short, long, default_value = "beatgrid.ron")]
        config: PathBuf,

        /// Instrument bank (JSON), the built-in drum kit when omitted
        #[arg(short, long)]
        instruments: Option<PathBuf>,

        /// Tempo override in BPM
        #[arg(short, long)]
        bpm: Option<f64>,

        /// How long to play, in seconds
        #[arg(short, long, default_value = "8.0", value_parser = parse_seconds)]
        seconds: f64,
    },
    /// Write the demo pattern to a file
    Demo {
        #[arg(default_value = "pattern.json")]
        output: PathBuf,
    },
    /// Write the default engine configuration to a file
    Config {
        #[arg(default_value = "beatgrid.ron")]
        output: PathBuf,
    },
}

/// Playback length: a finite, non-negative number of seconds
fn parse_seconds(value: &str) -> Result<f64, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("`{}` is not a number", value))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("expected a finite, non-negative duration, got {}", value));
    }
    Ok(seconds)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            pattern,
            config,
            instruments,
            bpm,
            seconds,
        } => play(pattern, config, instruments, bpm, seconds).await?,
        Commands::Demo { output } => {
            save_pattern_file(&PatternFile::demo(), &output)?;
            info!("Demo pattern written to {:?}", output);
        }
        Commands::Config { output } => {
            save_config(&EngineConfig::default(), &output)?;
            info!("Default configuration written to {:?}", output);
        }
    }

    Ok(())
}

async fn play(
    pattern_path: Option<PathBuf>,
    config_path: PathBuf,
    instruments_path: Option<PathBuf>,
    bpm: Option<f64>,
    seconds: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(&config_path)?;
    if let Some(bpm) = bpm {
        config.bpm = bpm;
    }

    let bank = match instruments_path {
        Some(path) => InstrumentBank::load_from_file(path)?,
        None => InstrumentBank::builtin(),
    };
    let pattern = match pattern_path {
        Some(path) => load_pattern_file(path)?,
        None => PatternFile::demo(),
    };

    let (trigger_tx, mut trigger_rx) = create_trigger_channel(config.trigger_channel_capacity);
    let registry = InstrumentRegistry::from_bank(&bank, Arc::new(Mutex::new(trigger_tx)));
    let gate = AudioGate::new();
    let player = SequencerPlayer::new(&config, registry, gate.clone())?;

    let (handle, engine) = PlaybackEngine::spawn(player, config.engine_tick());
    handle.load_pattern(pattern.blocks, pattern.cells).await?;
    handle
        .on_position_change(Box::new(|position: Option<PlaybackPosition>| match position {
            Some(position) => debug!("Position: {}", position),
            None => info!("Playback position cleared"),
        }))
        .await?;

    let start = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.play().await })
    };
    // No interactive output device here: the output is ready right away
    gate.unlock();
    start.await??;
    info!("Playing at {} for {:.1}s", Tempo::new(config.bpm)?, seconds);

    let deadline = Instant::now() + Duration::from_secs_f64(seconds);
    let mut drain = tokio::time::interval(DRAIN_INTERVAL);
    while Instant::now() < deadline {
        drain.tick().await;
        log_triggers(&mut trigger_rx);
    }

    handle.stop().await?;
    log_triggers(&mut trigger_rx);
    handle.shutdown().await?;
    engine.await?;
    Ok(())
}

fn log_triggers(rx: &mut TriggerConsumer) {
    while let Some(trigger) = rx.try_pop() {
        info!(
            "{:>8.3}s  {:<8} {:<4} {:.3}s {:+.1} dB",
            trigger.at, trigger.instrument_id, trigger.note, trigger.duration, trigger.gain_db
        );
    }
}
