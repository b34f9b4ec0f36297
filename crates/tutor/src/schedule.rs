use std::time::{Duration, Instant};

use pianola_audio::NoteCue;
use pianola_domain::Pitch;

use crate::input::HeldPitchSet;
use crate::log::SessionLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledEvent {
    /// Ends the wrong-note highlight raised by the press with this generation.
    ClearWrong { generation: u64 },
}

/// Delayed events fired from the tick loop. Nothing fires on its own.
#[derive(Debug, Default)]
pub struct Scheduler {
    pending: Vec<(Instant, ScheduledEvent)>,
}

impl Scheduler {
    pub fn schedule(&mut self, due: Instant, event: ScheduledEvent) {
        self.pending.push((due, event));
    }

    /// Removes and returns the events due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<ScheduledEvent> {
        let mut due: Vec<(Instant, ScheduledEvent)> = Vec::new();
        self.pending.retain(|entry| {
            if entry.0 <= now {
                due.push(*entry);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|entry| entry.0);
        due.into_iter().map(|(_, event)| event).collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Side effects requested by a state machine handler, applied by the engine
/// once the handler returns.
#[derive(Debug, Default)]
pub struct Effects {
    pub cues: Vec<NoteCue>,
    pub timers: Vec<(Duration, ScheduledEvent)>,
}

impl Effects {
    pub fn cue(&mut self, cue: NoteCue) {
        self.cues.push(cue);
    }

    pub fn after(&mut self, delay: Duration, event: ScheduledEvent) {
        self.timers.push((delay, event));
    }
}

/// Everything a state machine handler may read or append to besides its own
/// state. Built fresh by the engine for every input, tick or timer.
pub struct HandlerCtx<'a> {
    pub held: &'a HeldPitchSet,
    pub log: &'a mut SessionLog,
    pub fx: &'a mut Effects,
}

/// Most recent wrong press, shown until its display window elapses.
#[derive(Debug, Default, Clone, Copy)]
pub struct WrongHighlight {
    pitch: Option<Pitch>,
    generation: u64,
}

impl WrongHighlight {
    pub fn pitch(&self) -> Option<Pitch> {
        self.pitch
    }

    /// Shows `pitch` and asks for a clear after `display`. Older clears
    /// become stale.
    pub fn raise(&mut self, pitch: Pitch, display: Duration, fx: &mut Effects) {
        self.generation += 1;
        self.pitch = Some(pitch);
        fx.after(
            display,
            ScheduledEvent::ClearWrong {
                generation: self.generation,
            },
        );
    }

    /// Returns false when a newer wrong press superseded `generation`.
    pub fn clear(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.pitch = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_due_events_in_order() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::default();
        scheduler.schedule(t0 + Duration::from_millis(900), ScheduledEvent::ClearWrong { generation: 2 });
        scheduler.schedule(t0 + Duration::from_millis(800), ScheduledEvent::ClearWrong { generation: 1 });
        scheduler.schedule(t0 + Duration::from_secs(5), ScheduledEvent::ClearWrong { generation: 3 });
        assert!(scheduler.take_due(t0).is_empty());
        let due = scheduler.take_due(t0 + Duration::from_secs(1));
        assert_eq!(
            due,
            vec![
                ScheduledEvent::ClearWrong { generation: 1 },
                ScheduledEvent::ClearWrong { generation: 2 }
            ]
        );
        assert_eq!(scheduler.len(), 1);
        scheduler.clear();
        assert!(scheduler.is_empty());
    }

    #[test]
    fn stale_highlight_clears_are_ignored() {
        let mut fx = Effects::default();
        let mut highlight = WrongHighlight::default();
        highlight.raise(61, Duration::from_millis(800), &mut fx);
        highlight.raise(63, Duration::from_millis(800), &mut fx);
        assert_eq!(fx.timers.len(), 2);
        assert!(!highlight.clear(1));
        assert_eq!(highlight.pitch(), Some(63));
        assert!(highlight.clear(2));
        assert_eq!(highlight.pitch(), None);
    }
}
