use thiserror::Error;

use crate::session::PracticeMode;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PracticeError {
    #[error("the score has no notes to practice")]
    EmptyScore,
    #[error("no input device is selected")]
    NoDevice,
    #[error("no practice session is active")]
    NoSession,
    #[error("{operation} is not available in {mode} mode")]
    WrongMode {
        operation: &'static str,
        mode: PracticeMode,
    },
    #[error("input device unavailable: {0}")]
    DeviceAccess(String),
}
