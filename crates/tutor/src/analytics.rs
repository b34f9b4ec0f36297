use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use pianola_domain::PracticeStatistics;

use crate::scoring::PerformanceReport;

/// Sessions at or above this accuracy extend the streak.
pub const STREAK_ACCURACY: f32 = 0.9;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionAnalytics {
    pub report: PerformanceReport,
}

impl SessionAnalytics {
    pub fn new(report: PerformanceReport) -> Self {
        Self { report }
    }

    pub fn update_statistics(&self, stats: &mut PracticeStatistics, finished_at: OffsetDateTime) {
        let sessions = stats.sessions as f32;
        stats.average_accuracy =
            (stats.average_accuracy * sessions + self.report.accuracy) / (sessions + 1.0);
        stats.sessions += 1;
        if self.report.accuracy >= STREAK_ACCURACY {
            stats.current_streak += 1;
            stats.highest_streak = stats.highest_streak.max(stats.current_streak);
        } else {
            stats.current_streak = 0;
        }
        stats.last_practiced = Some(finished_at);
    }
}
