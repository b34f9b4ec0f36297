//! Collaborators that live outside the practice engine: where scores come
//! from and where finished session logs go.

pub mod feedback;
pub mod library;

pub use feedback::{FeedbackClient, FeedbackRequest};
pub use library::{DirectoryScoreSource, ScoreSource};
