mod practice;
mod settings;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use pianola_audio::TonePlayer;
use pianola_domain::pitch_name;
use pianola_services::DirectoryScoreSource;
use pianola_tutor::{MidiManager, PracticeMode, ScoringEngine, SessionLog, StepBuilder};

#[derive(Parser, Debug)]
#[command(author, version, about = "Practice piano scores against a MIDI keyboard", long_about = None)]
struct Cli {
    /// Practice config file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List MIDI inputs and audio outputs
    Devices,
    /// Print the chord steps a score is practiced in
    Steps {
        score: PathBuf,
        /// Only keep these tracks
        #[arg(long = "track")]
        tracks: Vec<u32>,
    },
    /// Run a live practice session
    Practice(practice::PracticeArgs),
    /// Summarize a saved session log
    Report { log: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ModeArg {
    #[default]
    Discrete,
    Continuous,
    Flowing,
}

impl From<ModeArg> for PracticeMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Discrete => PracticeMode::Discrete,
            ModeArg::Continuous => PracticeMode::Continuous,
            ModeArg::Flowing => PracticeMode::Flowing,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = settings::load_config(cli.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Command::Devices => list_devices(),
        Command::Steps { score, tracks } => {
            let score = runtime.block_on(DirectoryScoreSource::load_path(&score))?;
            let available = score.tracks();
            let score = score.filter_tracks(&tracks);
            let steps = StepBuilder::new(config.chord_tolerance_secs()).build(&score.notes);
            println!("{} ({} steps, tracks {:?})", score.title, steps.len(), available);
            for step in &steps {
                let sustained: Vec<String> =
                    step.sustained_pitches().map(|p| pitch_name(*p)).collect();
                let own: Vec<String> = step.own_pitches.iter().map(|p| pitch_name(*p)).collect();
                print!("#{:<4} {:>8.3}s  {:<20}", step.index, step.time, own.join(" "));
                if !sustained.is_empty() {
                    print!(" hold {}", sustained.join(" "));
                }
                println!();
            }
            Ok(())
        }
        Command::Practice(args) => runtime.block_on(practice::run(args, config)),
        Command::Report { log } => {
            let source = std::fs::read_to_string(&log)
                .with_context(|| format!("read session log {}", log.display()))?;
            let log = SessionLog::from_json(&source).context("parse session log")?;
            let report = ScoringEngine::new(config.windows).report(log.entries());
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn list_devices() -> Result<()> {
    println!("MIDI inputs:");
    for device in MidiManager::list_inputs()? {
        println!("  {}", device.name);
    }
    println!("Audio outputs:");
    for name in TonePlayer::list_outputs()? {
        println!("  {name}");
    }
    Ok(())
}
