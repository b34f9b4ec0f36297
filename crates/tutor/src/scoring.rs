use serde::{Deserialize, Serialize};

use pianola_domain::TimingWindows;

use crate::log::SessionLogEntry;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Perfect,
    Great,
    Okay,
    Poor,
    Miss,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RatingCounts {
    pub perfect: usize,
    pub great: usize,
    pub okay: usize,
    pub poor: usize,
    pub miss: usize,
}

impl RatingCounts {
    fn add(&mut self, rating: Rating) {
        match rating {
            Rating::Perfect => self.perfect += 1,
            Rating::Great => self.great += 1,
            Rating::Okay => self.okay += 1,
            Rating::Poor => self.poor += 1,
            Rating::Miss => self.miss += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceReport {
    pub judged: usize,
    pub correct: usize,
    pub wrong: usize,
    /// Share of judged inputs that were correct, 0-1.
    pub accuracy: f32,
    pub early_hits: usize,
    pub late_hits: usize,
    pub ratings: RatingCounts,
    pub mean_abs_offset_ms: Option<f64>,
}

impl PerformanceReport {
    pub fn empty() -> Self {
        Self {
            judged: 0,
            correct: 0,
            wrong: 0,
            accuracy: 0.0,
            early_hits: 0,
            late_hits: 0,
            ratings: RatingCounts::default(),
            mean_abs_offset_ms: None,
        }
    }
}

pub struct ScoringEngine {
    windows: TimingWindows,
}

impl ScoringEngine {
    pub fn new(windows: TimingWindows) -> Self {
        Self { windows }
    }

    /// Rating for a matched press. Thresholds are inclusive upper bounds.
    pub fn rate(&self, offset_ms: f64) -> Rating {
        let magnitude = offset_ms.abs();
        if magnitude <= self.windows.perfect_ms {
            Rating::Perfect
        } else if magnitude <= self.windows.great_ms {
            Rating::Great
        } else if magnitude <= self.windows.okay_ms {
            Rating::Okay
        } else {
            Rating::Poor
        }
    }

    /// Presses within the perfect window count as neither early nor late.
    pub fn report(&self, entries: &[SessionLogEntry]) -> PerformanceReport {
        if entries.is_empty() {
            return PerformanceReport::empty();
        }
        let mut report = PerformanceReport::empty();
        let mut offset_sum = 0.0;
        let mut offsets = 0usize;
        for entry in entries {
            report.judged += 1;
            if entry.correct {
                report.correct += 1;
            } else {
                report.wrong += 1;
            }
            if let Some(rating) = entry.rating {
                report.ratings.add(rating);
            }
            if let Some(offset) = entry.timing_offset_ms {
                offset_sum += offset.abs();
                offsets += 1;
                if offset < -self.windows.perfect_ms {
                    report.early_hits += 1;
                } else if offset > self.windows.perfect_ms {
                    report.late_hits += 1;
                }
            }
        }
        report.accuracy = report.correct as f32 / report.judged as f32;
        report.mean_abs_offset_ms = (offsets > 0).then(|| offset_sum / offsets as f64);
        report
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(TimingWindows::default())
    }
}
