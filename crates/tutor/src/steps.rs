//! Groups a flat note list into chord steps.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use pianola_domain::{score::sort_notes, NoteEvent, Pitch};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PracticeStep {
    pub index: usize,
    /// Start time of the step's first note, in seconds.
    pub time: f64,
    /// Pitches that begin at this step.
    pub own_pitches: BTreeSet<Pitch>,
    /// `own_pitches` plus pitches of earlier notes still sounding at `time`.
    pub required_pitches: BTreeSet<Pitch>,
    pub max_duration: f64,
    pub member_notes: Vec<NoteEvent>,
}

impl PracticeStep {
    fn open(index: usize, note: NoteEvent) -> Self {
        Self {
            index,
            time: note.start_time,
            own_pitches: BTreeSet::from([note.pitch]),
            required_pitches: BTreeSet::new(),
            max_duration: note.duration,
            member_notes: vec![note],
        }
    }

    fn push(&mut self, note: NoteEvent) {
        self.own_pitches.insert(note.pitch);
        self.max_duration = self.max_duration.max(note.duration);
        self.member_notes.push(note);
    }

    /// Pitches carried over from earlier steps.
    pub fn sustained_pitches(&self) -> impl Iterator<Item = &Pitch> {
        self.required_pitches.difference(&self.own_pitches)
    }
}

pub struct StepBuilder {
    tolerance: f64,
}

impl StepBuilder {
    pub fn new(tolerance_secs: f64) -> Self {
        Self {
            tolerance: tolerance_secs,
        }
    }

    pub fn build(&self, notes: &[NoteEvent]) -> Vec<PracticeStep> {
        let mut sorted = notes.to_vec();
        sort_notes(&mut sorted);

        let mut steps: Vec<PracticeStep> = Vec::new();
        for note in sorted {
            match steps.last_mut() {
                Some(step) if note.start_time - step.time <= self.tolerance => step.push(note),
                _ => steps.push(PracticeStep::open(steps.len(), note)),
            }
        }

        // Notes from earlier steps that still sound past a step's start
        // must be kept down through it in continuous mode.
        let mut sounding: Vec<NoteEvent> = Vec::new();
        for step in &mut steps {
            let cutoff = step.time + self.tolerance;
            sounding.retain(|note| note.sounds_past(cutoff));
            step.required_pitches = step.own_pitches.clone();
            step.required_pitches
                .extend(sounding.iter().map(|note| note.pitch));
            sounding.extend(step.member_notes.iter().copied());
        }
        steps
    }
}
