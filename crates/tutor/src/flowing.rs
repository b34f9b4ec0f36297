//! Free-running practice: the clock never waits, presses are matched against
//! the reference notes inside a time window.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use pianola_audio::NoteCue;
use pianola_domain::{score::sort_notes, NoteEvent, PracticeConfig, Pitch};

use crate::clock::PracticeClock;
use crate::log::SessionLogEntry;
use crate::schedule::{HandlerCtx, WrongHighlight};
use crate::scoring::ScoringEngine;
use crate::session::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteOutcome {
    Pending,
    Matched,
    Missed,
}

pub struct FlowingMachine {
    notes: Vec<NoteEvent>,
    outcomes: Vec<NoteOutcome>,
    /// Every note before this index has an outcome.
    scan_from: usize,
    clock: PracticeClock,
    status: SessionStatus,
    end_time: f64,
    window: f64,
    scoring: ScoringEngine,
    wrong: WrongHighlight,
    wrong_display: Duration,
    matched: usize,
    missed: usize,
}

impl FlowingMachine {
    /// Starts the clock `lead_in_secs` before the first note.
    pub fn new(mut notes: Vec<NoteEvent>, config: &PracticeConfig, at: Instant) -> Self {
        sort_notes(&mut notes);
        let first = notes.first().map_or(0.0, |note| note.start_time);
        let last_end = notes.iter().map(NoteEvent::end_time).fold(0.0, f64::max);
        let mut clock = PracticeClock::new((first - config.lead_in_secs).max(0.0), config.playback_speed);
        clock.resume(at);
        info!(notes = notes.len(), start = clock.time_at(at), "flowing session started");
        Self {
            outcomes: vec![NoteOutcome::Pending; notes.len()],
            notes,
            scan_from: 0,
            clock,
            status: SessionStatus::Flowing,
            end_time: last_end + config.tail_secs,
            window: config.windows.match_secs(),
            scoring: ScoringEngine::new(config.windows),
            wrong: WrongHighlight::default(),
            wrong_display: Duration::from_millis(config.wrong_display_ms),
            matched: 0,
            missed: 0,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn clock_time(&self, at: Instant) -> f64 {
        self.clock.time_at(at)
    }

    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    pub fn outcomes(&self) -> &[NoteOutcome] {
        &self.outcomes
    }

    pub fn matched(&self) -> usize {
        self.matched
    }

    pub fn missed(&self) -> usize {
        self.missed
    }

    pub fn last_wrong(&self) -> Option<Pitch> {
        self.wrong.pitch()
    }

    /// Unresolved pitches inside the match window around `at`.
    pub fn upcoming(&self, at: Instant) -> Vec<Pitch> {
        let now = self.clock.time_at(at);
        let mut pitches: Vec<Pitch> = self
            .candidates(now)
            .map(|(_, note)| note.pitch)
            .collect();
        pitches.sort_unstable();
        pitches.dedup();
        pitches
    }

    pub fn note_on(&mut self, pitch: Pitch, velocity: f32, at: Instant, ctx: &mut HandlerCtx<'_>) {
        if self.status != SessionStatus::Flowing {
            return;
        }
        let now = self.clock.time_at(at);
        let timestamp = ctx.log.timestamp_ms(at);
        let best = self
            .candidates(now)
            .filter(|(_, note)| note.pitch == pitch)
            .min_by(|(_, a), (_, b)| {
                (now - a.start_time)
                    .abs()
                    .total_cmp(&(now - b.start_time).abs())
            })
            .map(|(index, note)| (index, *note));

        match best {
            Some((index, note)) => {
                self.outcomes[index] = NoteOutcome::Matched;
                self.matched += 1;
                let offset_ms = (now - note.start_time) * 1000.0;
                let rating = self.scoring.rate(offset_ms);
                debug!(note = index, pitch, offset_ms, ?rating, "matched press");
                ctx.log
                    .push(SessionLogEntry::matched(index, pitch, offset_ms, rating, timestamp));
                ctx.fx.cue(NoteCue::new(pitch, note.duration, velocity));
            }
            None => {
                debug!(pitch, time = now, "extra press");
                let expected = self.upcoming(at);
                ctx.log.push(SessionLogEntry::extra(expected, pitch, timestamp));
                self.wrong.raise(pitch, self.wrong_display, ctx.fx);
            }
        }
    }

    pub fn tick(&mut self, at: Instant, ctx: &mut HandlerCtx<'_>) {
        if self.status != SessionStatus::Flowing {
            return;
        }
        let now = self.clock.time_at(at);
        let timestamp = ctx.log.timestamp_ms(at);
        self.advance_scan();
        for index in self.scan_from..self.notes.len() {
            let note = self.notes[index];
            if now - note.start_time < self.window {
                break;
            }
            if self.outcomes[index] == NoteOutcome::Pending {
                self.mark_missed(index, timestamp, ctx);
            }
        }
        self.advance_scan();

        if now >= self.end_time {
            self.finish(at, ctx);
        }
    }

    /// Flips between flowing and paused. Pausing freezes the clock so the
    /// pause never counts toward the piece.
    pub fn toggle_pause(&mut self, at: Instant) -> SessionStatus {
        match self.status {
            SessionStatus::Flowing => {
                self.clock.freeze(at);
                self.status = SessionStatus::Paused;
            }
            SessionStatus::Paused => {
                self.clock.resume(at);
                self.status = SessionStatus::Flowing;
            }
            _ => {}
        }
        debug!(status = ?self.status, "toggled pause");
        self.status
    }

    pub fn clear_wrong(&mut self, generation: u64) {
        self.wrong.clear(generation);
    }

    /// Ends the session, declaring every unresolved note missed.
    pub fn finish(&mut self, at: Instant, ctx: &mut HandlerCtx<'_>) {
        if self.status == SessionStatus::Complete {
            return;
        }
        let timestamp = ctx.log.timestamp_ms(at);
        for index in self.scan_from..self.notes.len() {
            if self.outcomes[index] == NoteOutcome::Pending {
                self.mark_missed(index, timestamp, ctx);
            }
        }
        self.scan_from = self.notes.len();
        self.clock.freeze(at);
        self.status = SessionStatus::Complete;
        info!(matched = self.matched, missed = self.missed, "flowing session complete");
    }

    /// Unresolved notes within the match window of `now`, in start order.
    fn candidates(&self, now: f64) -> impl Iterator<Item = (usize, &NoteEvent)> + '_ {
        let window = self.window;
        self.notes
            .iter()
            .enumerate()
            .skip(self.scan_from)
            .take_while(move |(_, note)| note.start_time - now <= window)
            .filter(move |(index, note)| {
                self.outcomes[*index] == NoteOutcome::Pending
                    && (now - note.start_time).abs() <= window
            })
    }

    fn mark_missed(&mut self, index: usize, timestamp: u64, ctx: &mut HandlerCtx<'_>) {
        let pitch = self.notes[index].pitch;
        self.outcomes[index] = NoteOutcome::Missed;
        self.missed += 1;
        debug!(note = index, pitch, "missed note");
        ctx.log.push(SessionLogEntry::missed(index, pitch, timestamp));
    }

    fn advance_scan(&mut self) {
        while self
            .outcomes
            .get(self.scan_from)
            .map_or(false, |outcome| *outcome != NoteOutcome::Pending)
        {
            self.scan_from += 1;
        }
    }
}
