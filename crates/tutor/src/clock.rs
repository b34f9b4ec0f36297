use std::time::Instant;

/// Virtual score position. Runs at `speed` score-seconds per wall-clock
/// second while anchored, holds still otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PracticeClock {
    position: f64,
    anchor: Option<Instant>,
    speed: f64,
}

impl PracticeClock {
    pub fn new(position: f64, speed: f64) -> Self {
        Self {
            position,
            anchor: None,
            speed,
        }
    }

    pub fn is_running(&self) -> bool {
        self.anchor.is_some()
    }

    /// Score time as of `at`. Instants before the anchor read as the anchor.
    pub fn time_at(&self, at: Instant) -> f64 {
        match self.anchor {
            Some(anchor) => {
                self.position + at.saturating_duration_since(anchor).as_secs_f64() * self.speed
            }
            None => self.position,
        }
    }

    pub fn resume(&mut self, at: Instant) {
        if self.anchor.is_none() {
            self.anchor = Some(at);
        }
    }

    pub fn freeze(&mut self, at: Instant) {
        self.position = self.time_at(at);
        self.anchor = None;
    }

    /// Jumps to `position`, keeping the running state.
    pub fn seek(&mut self, position: f64, at: Instant) {
        self.position = position;
        if self.anchor.is_some() {
            self.anchor = Some(at);
        }
    }
}
