//! Step-by-step practice: discrete chords, or continuous chords held through
//! their duration.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use pianola_audio::NoteCue;
use pianola_domain::{PracticeConfig, Pitch};

use crate::clock::PracticeClock;
use crate::log::SessionLogEntry;
use crate::schedule::{HandlerCtx, WrongHighlight};
use crate::session::SessionStatus;
use crate::steps::PracticeStep;

pub struct StepwiseMachine {
    continuous: bool,
    steps: Vec<PracticeStep>,
    status: SessionStatus,
    current: usize,
    satisfied: BTreeSet<Pitch>,
    /// Held at step entry; must be released and struck again to count.
    rearticulation_pending: BTreeSet<Pitch>,
    cue_fired: bool,
    wrong: WrongHighlight,
    clock: PracticeClock,
    step_entered: Instant,
    wrong_display: Duration,
    skip_after: Duration,
    over_hold_factor: f64,
}

impl StepwiseMachine {
    /// `steps` must be non-empty.
    pub fn new(steps: Vec<PracticeStep>, continuous: bool, config: &PracticeConfig, at: Instant) -> Self {
        let first_time = steps.first().map_or(0.0, |step| step.time);
        Self {
            continuous,
            steps,
            status: SessionStatus::Playing,
            current: 0,
            satisfied: BTreeSet::new(),
            rearticulation_pending: BTreeSet::new(),
            cue_fired: false,
            wrong: WrongHighlight::default(),
            clock: PracticeClock::new(first_time, config.playback_speed),
            step_entered: at,
            wrong_display: Duration::from_millis(config.wrong_display_ms),
            skip_after: Duration::from_millis(config.skip_after_ms),
            over_hold_factor: config.over_hold_factor,
        }
    }

    /// Enters the first step. Keys already down must be struck again.
    pub fn begin(&mut self, at: Instant, ctx: &mut HandlerCtx<'_>) {
        self.enter_step(0, at, ctx);
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn steps(&self) -> &[PracticeStep] {
        &self.steps
    }

    pub fn current_index(&self) -> Option<usize> {
        (self.current < self.steps.len()).then_some(self.current)
    }

    pub fn clock_time(&self, at: Instant) -> f64 {
        self.clock.time_at(at)
    }

    /// Continuous mode requires sustained notes too; discrete only the
    /// pitches that start at the step.
    pub fn required(&self) -> BTreeSet<Pitch> {
        match self.steps.get(self.current) {
            Some(step) if self.continuous => step.required_pitches.clone(),
            Some(step) => step.own_pitches.clone(),
            None => BTreeSet::new(),
        }
    }

    pub fn satisfied(&self) -> &BTreeSet<Pitch> {
        &self.satisfied
    }

    pub fn rearticulation_pending(&self) -> &BTreeSet<Pitch> {
        &self.rearticulation_pending
    }

    pub fn last_wrong(&self) -> Option<Pitch> {
        self.wrong.pitch()
    }

    pub fn skip_available(&self, at: Instant) -> bool {
        matches!(self.status, SessionStatus::Playing | SessionStatus::Waiting)
            && at.saturating_duration_since(self.step_entered) >= self.skip_after
    }

    pub fn note_on(&mut self, pitch: Pitch, at: Instant, ctx: &mut HandlerCtx<'_>) {
        if self.status == SessionStatus::Complete {
            return;
        }
        let required = self.required();
        let correct = required.contains(&pitch);
        let timestamp = ctx.log.timestamp_ms(at);
        ctx.log.push(SessionLogEntry::step(
            self.current,
            required.into_iter().collect(),
            pitch,
            correct,
            timestamp,
        ));

        if correct {
            self.rearticulation_pending.remove(&pitch);
            self.satisfied.insert(pitch);
            debug!(step = self.current, pitch, "correct press");
            self.check_ready(at, ctx);
        } else {
            debug!(step = self.current, pitch, "wrong press");
            if self.clock.is_running() {
                self.clock.freeze(at);
            }
            self.status = SessionStatus::Waiting;
            self.wrong.raise(pitch, self.wrong_display, ctx.fx);
        }
    }

    pub fn note_off(&mut self, pitch: Pitch, at: Instant, ctx: &mut HandlerCtx<'_>) {
        if self.status == SessionStatus::Complete {
            return;
        }
        self.rearticulation_pending.remove(&pitch);
        if self.required().contains(&pitch) {
            self.satisfied.remove(&pitch);
            if self.status == SessionStatus::Sustaining {
                self.clock.freeze(at);
                self.status = SessionStatus::Playing;
                debug!(step = self.current, pitch, "released during sustain");
            }
        } else if self.status == SessionStatus::Waiting {
            self.check_ready(at, ctx);
        }
    }

    pub fn tick(&mut self, at: Instant, ctx: &mut HandlerCtx<'_>) {
        if self.status != SessionStatus::Sustaining {
            return;
        }
        let Some(step) = self.steps.get(self.current) else {
            return;
        };
        let (start, duration) = (step.time, step.max_duration);
        let now = self.clock.time_at(at);
        let next_time = self.steps.get(self.current + 1).map(|next| next.time);
        let span = next_time.map_or(duration, |next| next - start);
        let limit = duration.max(span) * self.over_hold_factor;

        if now - start > limit {
            self.reset_over_hold(at, ctx);
            return;
        }
        match next_time {
            Some(next) if now >= next => self.advance(at, ctx),
            None if now >= start + duration => self.complete(at),
            _ => {}
        }
    }

    pub fn clear_wrong(&mut self, generation: u64, at: Instant, ctx: &mut HandlerCtx<'_>) {
        if !self.wrong.clear(generation) {
            return;
        }
        if self.status == SessionStatus::Waiting {
            self.status = SessionStatus::Playing;
            self.check_ready(at, ctx);
        }
    }

    /// Plays the current step's reference audio and moves on without
    /// judging it.
    pub fn skip(&mut self, at: Instant, ctx: &mut HandlerCtx<'_>) {
        let Some(step) = self.steps.get(self.current) else {
            return;
        };
        info!(step = self.current, "skipping step");
        for note in &step.member_notes {
            ctx.fx.cue(NoteCue::from(note));
        }
        self.advance(at, ctx);
    }

    fn check_ready(&mut self, at: Instant, ctx: &mut HandlerCtx<'_>) {
        let ready = self.required().iter().all(|pitch| {
            self.satisfied.contains(pitch)
                && ctx.held.contains(*pitch)
                && !self.rearticulation_pending.contains(pitch)
        });
        if !ready {
            if self.status == SessionStatus::Sustaining {
                self.clock.freeze(at);
                self.status = SessionStatus::Playing;
            }
            return;
        }

        if !self.cue_fired {
            self.cue_fired = true;
            if let Some(step) = self.steps.get(self.current) {
                for note in &step.member_notes {
                    ctx.fx.cue(NoteCue::from(note));
                }
            }
        }
        if self.continuous {
            self.status = SessionStatus::Sustaining;
            self.clock.resume(at);
        } else {
            self.advance(at, ctx);
        }
    }

    fn advance(&mut self, at: Instant, ctx: &mut HandlerCtx<'_>) {
        let next = self.current + 1;
        if next >= self.steps.len() {
            self.complete(at);
            return;
        }
        self.status = SessionStatus::Playing;
        self.enter_step(next, at, ctx);
    }

    fn enter_step(&mut self, index: usize, at: Instant, ctx: &mut HandlerCtx<'_>) {
        self.current = index;
        self.cue_fired = false;
        self.step_entered = at;
        let Some(step) = self.steps.get(index) else {
            return;
        };
        self.clock.freeze(at);
        self.clock.seek(step.time, at);
        // Pitches starting here must be struck here, even when the same key
        // is still down from the previous chord.
        self.rearticulation_pending = step
            .own_pitches
            .iter()
            .copied()
            .filter(|pitch| ctx.held.contains(*pitch))
            .collect();
        self.satisfied = self
            .required()
            .into_iter()
            .filter(|pitch| ctx.held.contains(*pitch) && !self.rearticulation_pending.contains(pitch))
            .collect();
        debug!(
            step = index,
            time = step.time,
            pending = ?self.rearticulation_pending,
            "entered step"
        );
    }

    fn reset_over_hold(&mut self, at: Instant, ctx: &mut HandlerCtx<'_>) {
        let Some(step) = self.steps.get(self.current) else {
            return;
        };
        debug!(step = self.current, "held too long, restarting step");
        self.clock.freeze(at);
        self.clock.seek(step.time, at);
        self.satisfied.clear();
        self.rearticulation_pending = self
            .required()
            .into_iter()
            .filter(|pitch| ctx.held.contains(*pitch))
            .collect();
        self.status = SessionStatus::Playing;
        self.step_entered = at;
    }

    fn complete(&mut self, at: Instant) {
        self.clock.freeze(at);
        if let Some(last) = self.steps.last() {
            let end = if self.continuous {
                last.time + last.max_duration
            } else {
                last.time
            };
            self.clock.seek(end, at);
        }
        self.current = self.steps.len();
        self.status = SessionStatus::Complete;
        self.satisfied.clear();
        self.rearticulation_pending.clear();
        info!(steps = self.steps.len(), "stepwise session complete");
    }
}
