use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use time::OffsetDateTime;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use pianola_audio::{AudioPlayer, NullPlayer, TonePlayer, ToneSettings};
use pianola_domain::{pitch_name, PracticeConfig, Score, ScoreCodec, ScoreFormat, SerdeCodec};
use pianola_services::{DirectoryScoreSource, FeedbackClient, FeedbackRequest};
use pianola_tutor::{
    MidiInputHub, MidiManager, PracticeEngine, PracticeSessionState, SessionAnalytics,
    SessionStatus,
};

use crate::ModeArg;

const TICK: Duration = Duration::from_millis(16);

#[derive(Args, Debug)]
pub struct PracticeArgs {
    /// Score file (JSON or YAML)
    score: PathBuf,
    #[arg(short, long, value_enum, default_value_t)]
    mode: ModeArg,
    /// MIDI input name; defaults to the first connected input
    #[arg(short, long)]
    device: Option<String>,
    /// Playback speed multiplier
    #[arg(long)]
    speed: Option<f64>,
    /// Only practice these tracks
    #[arg(long = "track")]
    tracks: Vec<u32>,
    /// Do not sound reference cues
    #[arg(long)]
    mute: bool,
    /// Summarizer endpoint that receives the finished session log
    #[arg(long)]
    feedback_endpoint: Option<String>,
    /// Write the session log as JSON
    #[arg(long)]
    log_out: Option<PathBuf>,
    /// Fold the result into the score file's practice statistics
    #[arg(long)]
    save_stats: bool,
}

pub async fn run(args: PracticeArgs, mut config: PracticeConfig) -> Result<()> {
    if let Some(speed) = args.speed {
        config = config.with_playback_speed(speed);
    }
    config.validate()?;

    let mut score = DirectoryScoreSource::load_path(&args.score)
        .await?
        .filter_tracks(&args.tracks);
    let mode = args.mode.into();

    let player: Box<dyn AudioPlayer> = if args.mute {
        Box::new(NullPlayer)
    } else {
        match TonePlayer::open(&ToneSettings::default()) {
            Ok(player) => Box::new(player),
            Err(err) => {
                warn!("audio output unavailable, practicing silently: {err:#}");
                Box::new(NullPlayer)
            }
        }
    };
    let mut engine = PracticeEngine::new(config, player);
    engine.load_score(&score);
    engine.set_mode(mode);

    let mut hub = MidiInputHub::new();
    let device = match args.device.clone() {
        Some(name) => Some(name),
        None => MidiManager::list_inputs()?.into_iter().next().map(|d| d.name),
    };
    if let Some(name) = device.as_deref() {
        match hub.set_active_device(name) {
            Ok(()) => engine.set_active_device(Some(name.to_string())),
            Err(err) => engine.record_device_error(format!("{err:#}")),
        }
    }
    if let Some(err) = engine.error() {
        return Err(anyhow!("{err}"));
    }

    engine.start(Instant::now())?;
    println!(
        "{} | {} | {} notes | keys: s+Enter skip, p+Enter pause, Ctrl-C stop",
        score.title,
        engine.mode(),
        score.notes.len()
    );

    let completed = drive(&mut engine, &mut hub).await?;
    hub.disconnect();

    let report = engine.report();
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = &args.log_out {
        let json = engine.log().to_json()?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("write session log {}", path.display()))?;
        info!(path = %path.display(), "session log written");
    }

    if !completed {
        return Ok(());
    }

    if args.save_stats {
        save_statistics(&args.score, &mut score, SessionAnalytics::new(report.clone())).await?;
    }

    if let Some(endpoint) = args.feedback_endpoint {
        let request = FeedbackRequest {
            score_id: score.id.clone(),
            mode,
            report,
            log: engine.log().clone(),
        };
        match FeedbackClient::new(endpoint).summarize(&request).await {
            Ok(text) => println!("\n{text}"),
            Err(err) => warn!("feedback unavailable: {err:#}"),
        }
    }
    Ok(())
}

/// Runs the session loop. Returns whether the piece was completed.
async fn drive<P: AudioPlayer>(engine: &mut PracticeEngine<P>, hub: &mut MidiInputHub) -> Result<bool> {
    let mut interval = tokio::time::interval(TICK);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stdin_open = true;
    let mut shown = Shown::default();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                for message in hub.drain() {
                    engine.handle_message(&message);
                }
                let now = Instant::now();
                engine.tick(now);
                let state = engine.state(now);
                shown.render(&state);
                if state.status == SessionStatus::Complete {
                    return Ok(true);
                }
            }
            line = commands.next_line(), if stdin_open => {
                let now = Instant::now();
                let result = match line?.as_deref().map(str::trim) {
                    Some("s") => engine.skip_step(now),
                    Some("p") => engine.toggle_pause(now).map(|_| ()),
                    Some(_) => Ok(()),
                    None => {
                        stdin_open = false;
                        Ok(())
                    }
                };
                if let Err(err) = result {
                    println!("  ! {err}");
                }
            }
            signal = &mut ctrl_c => {
                signal.context("listen for Ctrl-C")?;
                engine.reset();
                println!("\nstopped");
                return Ok(false);
            }
        }
    }
}

async fn save_statistics(path: &Path, score: &mut Score, analytics: SessionAnalytics) -> Result<()> {
    // Re-read so a track filter never drops notes from the saved file.
    let mut stored = DirectoryScoreSource::load_path(path).await?;
    analytics.update_statistics(&mut stored.stats, OffsetDateTime::now_utc());
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ScoreFormat::from_extension)
        .unwrap_or(ScoreFormat::Json);
    let bytes = SerdeCodec.export(&stored, format)?;
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("write score {}", path.display()))?;
    score.stats = stored.stats;
    println!(
        "sessions {} | average accuracy {:.0}% | streak {}",
        score.stats.sessions,
        score.stats.average_accuracy * 100.0,
        score.stats.current_streak
    );
    Ok(())
}

/// Last printed view, so the terminal only changes when the state does.
#[derive(Default)]
struct Shown {
    status: Option<SessionStatus>,
    step: Option<usize>,
    wrong: Option<u8>,
    resolved: usize,
    skip: bool,
}

impl Shown {
    fn render(&mut self, state: &PracticeSessionState) {
        let resolved = state.notes_matched + state.notes_missed;
        let changed = self.status != Some(state.status)
            || self.step != state.current_step
            || self.wrong != state.last_wrong_pitch
            || self.resolved != resolved
            || self.skip != state.skip_available;
        if !changed {
            return;
        }
        self.status = Some(state.status);
        self.step = state.current_step;
        self.wrong = state.last_wrong_pitch;
        self.resolved = resolved;
        self.skip = state.skip_available;

        let names = |pitches: &[u8]| pitches.iter().map(|p| pitch_name(*p)).collect::<Vec<_>>().join(" ");
        let mut line = format!("[{:?}] {:>7.2}s", state.status, state.practice_clock);
        if let Some(step) = state.current_step {
            line.push_str(&format!("  step {}/{}", step + 1, state.total_steps));
        }
        if state.mode.is_stepwise() {
            line.push_str(&format!(
                "  play {}  held {}",
                names(&state.expected_pitches),
                names(&state.held_pitches)
            ));
        } else {
            line.push_str(&format!("  hit {} miss {}", state.notes_matched, state.notes_missed));
        }
        if let Some(wrong) = state.last_wrong_pitch {
            line.push_str(&format!("  wrong {}", pitch_name(wrong)));
        }
        if !state.rearticulation_pending.is_empty() {
            line.push_str(&format!("  re-strike {}", names(&state.rearticulation_pending)));
        }
        if state.skip_available {
            line.push_str("  (s to skip)");
        }
        println!("{line}");
    }
}
