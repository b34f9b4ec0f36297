use std::time::{Duration, Instant};

use approx::assert_abs_diff_eq;
use pianola_audio::RecordingPlayer;
use pianola_domain::{NoteEvent, PracticeConfig, TimingWindows};
use pianola_tutor::{
    PracticeEngine, PracticeMode, Rating, ScoringEngine, SessionStatus, StepBuilder,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};

fn note(pitch: u8, start: f64, duration: f64) -> NoteEvent {
    NoteEvent::new(pitch, start, duration, 0.8, 0)
}

fn started(notes: Vec<NoteEvent>, mode: PracticeMode) -> (PracticeEngine<RecordingPlayer>, Instant) {
    let mut engine = PracticeEngine::new(PracticeConfig::default(), RecordingPlayer::default());
    engine.load_notes(notes);
    engine.set_active_device(Some("virtual keyboard".into()));
    engine.set_mode(mode);
    let t0 = Instant::now();
    engine.start(t0).unwrap();
    (engine, t0)
}

fn ms(t0: Instant, ms: u64) -> Instant {
    t0 + Duration::from_millis(ms)
}

/// Seeded so every run sees the same scores.
fn random_notes(rng: &mut SmallRng, count: usize) -> Vec<NoteEvent> {
    let mut start = 0.0;
    (0..count)
        .map(|_| {
            start += rng.gen_range(0..400) as f64 / 1000.0;
            let pitch = rng.gen_range(55..79u8);
            let duration = 0.1 + rng.gen_range(0..900) as f64 / 1000.0;
            note(pitch, start, duration)
        })
        .collect()
}

#[test]
fn step_building_is_deterministic_and_anchored() {
    let builder = StepBuilder::new(0.03);
    let notes = vec![
        note(72, 0.05, 0.5),
        note(67, 0.029, 0.5),
        note(60, 0.0, 1.0),
        note(64, 0.02, 0.5),
    ];
    let first = builder.build(&notes);
    assert_eq!(first, builder.build(&notes));

    assert_eq!(first.len(), 2);
    assert_eq!(first[0].own_pitches.iter().copied().collect::<Vec<_>>(), vec![60, 64, 67]);
    assert_eq!(first[1].time, 0.05);

    let mut rng = SmallRng::seed_from_u64(7);
    let notes = random_notes(&mut rng, 64);
    let steps = builder.build(&notes);
    assert_eq!(steps, builder.build(&notes));
    assert_eq!(steps.iter().map(|s| s.member_notes.len()).sum::<usize>(), notes.len());
    for (index, step) in steps.iter().enumerate() {
        assert_eq!(step.index, index);
        for member in &step.member_notes {
            assert!(member.start_time - step.time <= 0.03);
        }
        if let Some(next) = steps.get(index + 1) {
            assert!(next.time - step.time > 0.03);
        }
    }
}

#[test]
fn required_pitches_cover_own_and_sounding_notes() {
    let mut rng = SmallRng::seed_from_u64(42);
    let notes = random_notes(&mut rng, 80);
    let steps = StepBuilder::new(0.03).build(&notes);
    for step in &steps {
        assert!(step.required_pitches.is_superset(&step.own_pitches));
        for pitch in step.sustained_pitches() {
            let spans = notes.iter().any(|n| {
                n.pitch == *pitch && n.start_time < step.time && n.end_time() > step.time + 0.03
            });
            assert!(spans, "pitch {pitch} carried into step {} without a sounding note", step.index);
        }
    }
}

#[test]
fn every_flowing_note_is_resolved_exactly_once() {
    for seed in [1, 2, 3, 4, 5] {
        let mut rng = SmallRng::seed_from_u64(seed);
        let notes = random_notes(&mut rng, 24);
        let (mut engine, t0) = started(notes.clone(), PracticeMode::Flowing);

        // Presses near some notes plus a few strays, in time order.
        let mut presses: Vec<(u64, u8)> = Vec::new();
        for n in &notes {
            if rng.gen_range(0..3) > 0 {
                let jitter: i64 = rng.gen_range(-400..400);
                let at = (n.start_time * 1000.0) as i64 + jitter;
                presses.push((at.max(0) as u64, n.pitch));
            }
            if rng.gen_range(0..5) == 0 {
                presses.push(((n.start_time * 1000.0) as u64 + 100, 100));
            }
        }
        presses.sort_unstable();

        // The first note falls inside the lead-in, so the clock starts at zero.
        let end_ms = ((notes.iter().map(NoteEvent::end_time).fold(0.0, f64::max) + 1.0) * 1000.0)
            as u64
            + 100;
        let mut next = 0;
        let mut now = 0;
        while now <= end_ms {
            while next < presses.len() && presses[next].0 <= now {
                let (at, pitch) = presses[next];
                engine.note_on(pitch, 90, ms(t0, at));
                engine.note_off(pitch, ms(t0, at));
                next += 1;
            }
            engine.tick(ms(t0, now));
            now += 16;
        }

        assert_eq!(engine.status(), SessionStatus::Complete, "seed {seed}");
        let entries = engine.log().entries();
        for index in 0..notes.len() {
            let terminal = entries
                .iter()
                .filter(|e| e.index == Some(index) && e.is_terminal())
                .count();
            assert_eq!(terminal, 1, "note {index} with seed {seed}");
        }
        assert!(entries.iter().all(|e| e.index.map_or(true, |i| i < notes.len())));
        let state = engine.state(ms(t0, end_ms));
        assert_eq!(state.notes_matched + state.notes_missed, notes.len());
    }
}

#[test]
fn ratings_follow_the_timing_windows() {
    let scoring = ScoringEngine::new(TimingWindows::default());
    assert_eq!(scoring.rate(0.0), Rating::Perfect);
    assert_eq!(scoring.rate(-50.0), Rating::Perfect);
    assert_eq!(scoring.rate(50.0), Rating::Perfect);
    assert_eq!(scoring.rate(50.001), Rating::Great);
    assert_eq!(scoring.rate(-150.0), Rating::Great);
    assert_eq!(scoring.rate(151.0), Rating::Okay);
    assert_eq!(scoring.rate(300.0), Rating::Okay);
    assert_eq!(scoring.rate(-300.001), Rating::Poor);
    assert_eq!(scoring.rate(499.0), Rating::Poor);
}

#[test]
fn held_shared_pitch_must_be_struck_again() {
    for mode in [PracticeMode::Discrete, PracticeMode::Continuous] {
        let (mut engine, t0) = started(
            vec![note(60, 0.0, 0.5), note(64, 0.0, 0.5), note(64, 1.0, 0.5), note(67, 1.0, 0.5)],
            mode,
        );
        engine.note_on(60, 90, ms(t0, 0));
        engine.note_on(64, 90, ms(t0, 10));
        engine.tick(ms(t0, 1010));
        let state = engine.state(ms(t0, 1010));
        assert_eq!(state.current_step, Some(1), "{mode}");
        assert_eq!(state.rearticulation_pending, vec![64]);
        assert!(state.satisfied_pitches.is_empty());

        engine.note_on(67, 90, ms(t0, 1100));
        let state = engine.state(ms(t0, 1100));
        assert_eq!(state.current_step, Some(1), "{mode}");
        assert_eq!(state.status, SessionStatus::Playing);

        engine.note_off(64, ms(t0, 1200));
        engine.note_on(64, 90, ms(t0, 1300));
        let expected = if mode == PracticeMode::Discrete {
            SessionStatus::Complete
        } else {
            SessionStatus::Sustaining
        };
        assert_eq!(engine.status(), expected, "{mode}");
    }
}

#[test]
fn over_hold_restarts_only_the_current_step() {
    let (mut engine, t0) = started(
        vec![note(55, 0.0, 0.5), note(60, 0.5, 1.0), note(62, 1.5, 0.5)],
        PracticeMode::Continuous,
    );
    engine.note_on(55, 90, ms(t0, 0));
    engine.tick(ms(t0, 500));
    engine.note_on(60, 90, ms(t0, 600));
    assert_eq!(engine.status(), SessionStatus::Sustaining);
    let logged = engine.log().entries().to_vec();
    assert_eq!(logged.len(), 2);

    // One tick jumps past 1.5x the step's span.
    engine.tick(ms(t0, 2200));
    let state = engine.state(ms(t0, 2200));
    assert_eq!(state.status, SessionStatus::Playing);
    assert_eq!(state.current_step, Some(1));
    assert_abs_diff_eq!(state.practice_clock, 0.5, epsilon = 1e-9);
    assert!(state.satisfied_pitches.is_empty());
    assert_eq!(state.rearticulation_pending, vec![60]);
    assert_eq!(engine.log().entries(), logged.as_slice());

    engine.note_off(60, ms(t0, 2300));
    engine.note_on(60, 90, ms(t0, 2400));
    assert_eq!(engine.status(), SessionStatus::Sustaining);
    engine.tick(ms(t0, 3400));
    assert_eq!(engine.state(ms(t0, 3400)).current_step, Some(2));
}
