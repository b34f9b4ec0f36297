//! Control surface over the two practice state machines.
//!
//! Every mutation goes through `&mut PracticeEngine`: device input, ticks and
//! timers are all handled on the caller's loop, one at a time, against the
//! same held-key set and session log.

use std::time::Instant;

use tracing::{info, instrument, warn};

use pianola_audio::AudioPlayer;
use pianola_domain::{NoteEvent, PracticeConfig, Pitch, Score};

use crate::error::PracticeError;
use crate::flowing::FlowingMachine;
use crate::input::{InputKind, InputTracker, RawMidiMessage};
use crate::log::SessionLog;
use crate::schedule::{Effects, HandlerCtx, ScheduledEvent, Scheduler};
use crate::scoring::{PerformanceReport, ScoringEngine};
use crate::session::{PracticeMode, PracticeSessionState, SessionStatus};
use crate::stepwise::StepwiseMachine;
use crate::steps::{PracticeStep, StepBuilder};

enum ActiveSession {
    Stepwise(StepwiseMachine),
    Flowing(FlowingMachine),
}

impl ActiveSession {
    fn status(&self) -> SessionStatus {
        match self {
            ActiveSession::Stepwise(machine) => machine.status(),
            ActiveSession::Flowing(machine) => machine.status(),
        }
    }
}

pub struct PracticeEngine<P: AudioPlayer> {
    config: PracticeConfig,
    mode: PracticeMode,
    notes: Vec<NoteEvent>,
    input: InputTracker,
    session: Option<ActiveSession>,
    log: SessionLog,
    scheduler: Scheduler,
    player: P,
    active_device: Option<String>,
    error: Option<PracticeError>,
}

impl<P: AudioPlayer> PracticeEngine<P> {
    pub fn new(config: PracticeConfig, player: P) -> Self {
        Self {
            config,
            mode: PracticeMode::default(),
            notes: Vec::new(),
            input: InputTracker::new(),
            session: None,
            log: SessionLog::default(),
            scheduler: Scheduler::default(),
            player,
            active_device: None,
            error: None,
        }
    }

    pub fn mode(&self) -> PracticeMode {
        self.mode
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    /// The session log. Safe to read mid-session; kept after `reset` until
    /// the next `start`.
    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub fn error(&self) -> Option<&PracticeError> {
        self.error.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.session
            .as_ref()
            .map_or(SessionStatus::Idle, ActiveSession::status)
    }

    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    /// Takes a snapshot of the score's notes. Any running session is reset.
    pub fn load_score(&mut self, score: &Score) {
        self.load_notes(score.notes.clone());
    }

    pub fn load_notes(&mut self, notes: Vec<NoteEvent>) {
        if self.session.is_some() {
            self.reset();
        }
        info!(notes = notes.len(), "loaded score");
        self.notes = notes;
    }

    /// Steps the loaded score would be practiced in.
    pub fn preview_steps(&self) -> Vec<PracticeStep> {
        StepBuilder::new(self.config.chord_tolerance_secs()).build(&self.notes)
    }

    /// Selects the device whose messages will be fed in. Held keys from the
    /// previous device are forgotten, so a running session ends with them.
    pub fn set_active_device(&mut self, device: Option<String>) {
        if self.session.is_some() {
            self.reset();
        }
        self.input.clear();
        if device.is_some() && matches!(self.error, Some(PracticeError::DeviceAccess(_))) {
            self.error = None;
        }
        info!(?device, "active input device changed");
        self.active_device = device;
    }

    pub fn record_device_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(%message, "input device unavailable");
        self.error = Some(PracticeError::DeviceAccess(message));
    }

    /// Switching mode ends any running session.
    pub fn set_mode(&mut self, mode: PracticeMode) {
        if self.session.is_some() {
            self.reset();
        }
        info!(%mode, "practice mode set");
        self.mode = mode;
    }

    #[instrument(skip(self, at))]
    pub fn start(&mut self, at: Instant) -> Result<(), PracticeError> {
        if self.notes.is_empty() {
            return self.fail(PracticeError::EmptyScore);
        }
        if self.active_device.is_none() {
            return self.fail(PracticeError::NoDevice);
        }
        self.reset();
        self.error = None;
        self.log.begin(at);

        let mut fx = Effects::default();
        let session = match self.mode {
            PracticeMode::Discrete | PracticeMode::Continuous => {
                let steps = self.preview_steps();
                let continuous = self.mode == PracticeMode::Continuous;
                let mut machine = StepwiseMachine::new(steps, continuous, &self.config, at);
                let mut ctx = HandlerCtx {
                    held: self.input.held(),
                    log: &mut self.log,
                    fx: &mut fx,
                };
                machine.begin(at, &mut ctx);
                info!(steps = machine.steps().len(), "practice session started");
                ActiveSession::Stepwise(machine)
            }
            PracticeMode::Flowing => {
                ActiveSession::Flowing(FlowingMachine::new(self.notes.clone(), &self.config, at))
            }
        };
        self.session = Some(session);
        self.apply(fx, at);
        Ok(())
    }

    /// Ends the session and cancels every pending timer. The engine can
    /// start again right away.
    pub fn reset(&mut self) {
        if self.session.take().is_some() {
            info!("practice session reset");
        }
        self.scheduler.clear();
        self.player.stop();
    }

    pub fn skip_step(&mut self, at: Instant) -> Result<(), PracticeError> {
        if !self.is_active() {
            return self.fail(PracticeError::NoSession);
        }
        if !self.mode.is_stepwise() {
            return self.fail(PracticeError::WrongMode {
                operation: "skip",
                mode: self.mode,
            });
        }
        self.dispatch(at, |session, ctx| {
            if let ActiveSession::Stepwise(machine) = session {
                machine.skip(at, ctx);
            }
        });
        Ok(())
    }

    pub fn toggle_pause(&mut self, at: Instant) -> Result<SessionStatus, PracticeError> {
        let error = match self.session.as_mut() {
            Some(ActiveSession::Flowing(machine)) if machine.status().is_active() => {
                return Ok(machine.toggle_pause(at));
            }
            Some(ActiveSession::Stepwise(_)) => PracticeError::WrongMode {
                operation: "pause",
                mode: self.mode,
            },
            _ => PracticeError::NoSession,
        };
        self.fail(error)
    }

    /// Feeds one device message. The held-key set is updated even without a
    /// session.
    pub fn handle_message(&mut self, message: &RawMidiMessage) {
        let Some(event) = self.input.process(message) else {
            return;
        };
        let at = event.at;
        self.dispatch(at, |session, ctx| match (session, event.kind) {
            (ActiveSession::Stepwise(machine), InputKind::Press { .. }) => {
                machine.note_on(event.pitch, at, ctx)
            }
            (ActiveSession::Stepwise(machine), InputKind::Release) => {
                machine.note_off(event.pitch, at, ctx)
            }
            (ActiveSession::Flowing(machine), InputKind::Press { velocity }) => {
                machine.note_on(event.pitch, velocity, at, ctx)
            }
            (ActiveSession::Flowing(_), InputKind::Release) => {}
        });
    }

    pub fn note_on(&mut self, pitch: Pitch, velocity: u8, at: Instant) {
        self.handle_message(&RawMidiMessage::note_on(pitch, velocity, at));
    }

    pub fn note_off(&mut self, pitch: Pitch, at: Instant) {
        self.handle_message(&RawMidiMessage::note_off(pitch, at));
    }

    /// Fires due timers, then advances whichever clock is running.
    pub fn tick(&mut self, at: Instant) {
        for event in self.scheduler.take_due(at) {
            match event {
                ScheduledEvent::ClearWrong { generation } => {
                    self.dispatch(at, |session, ctx| match session {
                        ActiveSession::Stepwise(machine) => machine.clear_wrong(generation, at, ctx),
                        ActiveSession::Flowing(machine) => machine.clear_wrong(generation),
                    });
                }
            }
        }
        self.dispatch(at, |session, ctx| match session {
            ActiveSession::Stepwise(machine) => machine.tick(at, ctx),
            ActiveSession::Flowing(machine) => machine.tick(at, ctx),
        });
    }

    pub fn report(&self) -> PerformanceReport {
        ScoringEngine::new(self.config.windows).report(self.log.entries())
    }

    pub fn state(&self, at: Instant) -> PracticeSessionState {
        let mut state = PracticeSessionState::idle(self.mode);
        state.held_pitches = self.input.held().to_vec();
        state.active_device = self.active_device.clone();
        state.error = self.error.as_ref().map(ToString::to_string);
        match self.session.as_ref() {
            Some(ActiveSession::Stepwise(machine)) => {
                state.status = machine.status();
                state.practice_clock = machine.clock_time(at);
                state.current_step = machine.current_index();
                state.total_steps = machine.steps().len();
                state.expected_pitches = machine.required().into_iter().collect();
                state.satisfied_pitches = machine.satisfied().iter().copied().collect();
                state.rearticulation_pending =
                    machine.rearticulation_pending().iter().copied().collect();
                state.last_wrong_pitch = machine.last_wrong();
                state.skip_available = machine.skip_available(at);
            }
            Some(ActiveSession::Flowing(machine)) => {
                state.status = machine.status();
                state.practice_clock = machine.clock_time(at);
                state.expected_pitches = machine.upcoming(at);
                state.last_wrong_pitch = machine.last_wrong();
                state.notes_matched = machine.matched();
                state.notes_missed = machine.missed();
            }
            None => {}
        }
        state
    }

    fn fail<T>(&mut self, error: PracticeError) -> Result<T, PracticeError> {
        warn!(%error, "practice control rejected");
        self.error = Some(error.clone());
        Err(error)
    }

    /// Runs a handler against the active session, then applies the effects
    /// it requested.
    fn dispatch<F>(&mut self, at: Instant, handler: F)
    where
        F: FnOnce(&mut ActiveSession, &mut HandlerCtx<'_>),
    {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let before = session.status();
        let mut fx = Effects::default();
        let mut ctx = HandlerCtx {
            held: self.input.held(),
            log: &mut self.log,
            fx: &mut fx,
        };
        handler(session, &mut ctx);
        let after = session.status();
        self.apply(fx, at);
        if after == SessionStatus::Complete && before != SessionStatus::Complete {
            let report = self.report();
            info!(
                accuracy = report.accuracy,
                judged = report.judged,
                "practice session complete"
            );
        }
    }

    fn apply(&mut self, fx: Effects, at: Instant) {
        for cue in fx.cues {
            self.player.start(cue);
        }
        for (delay, event) in fx.timers {
            self.scheduler.schedule(at + delay, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pianola_audio::RecordingPlayer;
    use std::time::Duration;

    fn engine(notes: Vec<NoteEvent>, mode: PracticeMode) -> PracticeEngine<RecordingPlayer> {
        let mut engine = PracticeEngine::new(PracticeConfig::default(), RecordingPlayer::default());
        engine.load_notes(notes);
        engine.set_active_device(Some("virtual".into()));
        engine.set_mode(mode);
        engine
    }

    #[test]
    fn empty_score_is_rejected() {
        let mut engine = engine(Vec::new(), PracticeMode::Discrete);
        let result = engine.start(Instant::now());
        assert_eq!(result, Err(PracticeError::EmptyScore));
        assert_eq!(engine.status(), SessionStatus::Idle);
        assert_eq!(
            engine.state(Instant::now()).error.as_deref(),
            Some("the score has no notes to practice")
        );
    }

    #[test]
    fn start_requires_a_device() {
        let mut engine = engine(vec![NoteEvent::new(60, 0.0, 0.5, 0.8, 0)], PracticeMode::Discrete);
        engine.set_active_device(None);
        assert_eq!(engine.start(Instant::now()), Err(PracticeError::NoDevice));
        assert!(!engine.is_active());
    }

    #[test]
    fn controls_check_mode_and_session() {
        let t0 = Instant::now();
        let mut engine = engine(vec![NoteEvent::new(60, 0.0, 0.5, 0.8, 0)], PracticeMode::Discrete);
        assert_eq!(engine.skip_step(t0), Err(PracticeError::NoSession));
        engine.start(t0).unwrap();
        assert!(engine.error().is_none());
        assert!(matches!(
            engine.toggle_pause(t0),
            Err(PracticeError::WrongMode { operation: "pause", .. })
        ));
        engine.set_mode(PracticeMode::Flowing);
        assert_eq!(engine.status(), SessionStatus::Idle);
        engine.start(t0).unwrap();
        assert!(matches!(engine.skip_step(t0), Err(PracticeError::WrongMode { .. })));
        assert_eq!(engine.toggle_pause(t0), Ok(SessionStatus::Paused));
    }

    #[test]
    fn reset_cancels_pending_timers() {
        let t0 = Instant::now();
        let mut engine = engine(
            vec![NoteEvent::new(60, 0.0, 0.5, 0.8, 0), NoteEvent::new(62, 1.0, 0.5, 0.8, 0)],
            PracticeMode::Discrete,
        );
        engine.start(t0).unwrap();
        engine.note_on(61, 100, t0);
        assert_eq!(engine.state(t0).last_wrong_pitch, Some(61));
        engine.reset();
        assert_eq!(engine.player().stops, 2);
        engine.start(t0).unwrap();
        engine.tick(t0 + Duration::from_secs(1));
        assert_eq!(engine.status(), SessionStatus::Playing);
        assert!(engine.log().is_empty());
    }

    #[test]
    fn wrong_highlight_clears_after_display_window() {
        let t0 = Instant::now();
        let mut engine = engine(
            vec![NoteEvent::new(60, 0.0, 0.5, 0.8, 0), NoteEvent::new(62, 1.0, 0.5, 0.8, 0)],
            PracticeMode::Discrete,
        );
        engine.start(t0).unwrap();
        engine.note_on(61, 100, t0);
        engine.tick(t0 + Duration::from_millis(799));
        assert_eq!(engine.status(), SessionStatus::Waiting);
        engine.tick(t0 + Duration::from_millis(800));
        let state = engine.state(t0 + Duration::from_millis(800));
        assert_eq!(state.status, SessionStatus::Playing);
        assert_eq!(state.last_wrong_pitch, None);
        assert_eq!(state.held_pitches, vec![61]);
    }

    #[test]
    fn input_without_session_only_tracks_keys() {
        let t0 = Instant::now();
        let mut engine = engine(vec![NoteEvent::new(60, 0.0, 0.5, 0.8, 0)], PracticeMode::Discrete);
        engine.note_on(60, 90, t0);
        assert_eq!(engine.state(t0).held_pitches, vec![60]);
        assert!(engine.log().is_empty());
        engine.set_active_device(Some("other".into()));
        assert!(engine.state(t0).held_pitches.is_empty());
    }

    #[test]
    fn switching_device_ends_a_sustained_session() {
        let t0 = Instant::now();
        let mut engine = engine(
            vec![
                NoteEvent::new(60, 0.0, 1.0, 0.8, 0),
                NoteEvent::new(62, 1.0, 1.0, 0.8, 0),
                NoteEvent::new(64, 2.0, 1.0, 0.8, 0),
            ],
            PracticeMode::Continuous,
        );
        engine.start(t0).unwrap();
        engine.note_on(60, 90, t0);
        assert_eq!(engine.status(), SessionStatus::Sustaining);

        engine.set_active_device(Some("second keyboard".into()));
        let state = engine.state(t0);
        assert_eq!(state.status, SessionStatus::Idle);
        assert!(state.held_pitches.is_empty());
        assert!(state.satisfied_pitches.is_empty());
        assert_eq!(engine.player().stops, 2);

        engine.tick(t0 + Duration::from_millis(1010));
        let state = engine.state(t0 + Duration::from_millis(1010));
        assert_eq!(state.status, SessionStatus::Idle);
        assert_eq!(state.current_step, None);
    }
}
