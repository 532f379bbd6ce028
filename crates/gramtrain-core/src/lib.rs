//! gramtrain-core: Scheduling, grading, scoring and ranking.
//!
//! This crate defines the data model, store traits and the decision logic
//! (session scheduler, Leitner grader, dashboard aggregator, leaderboard
//! ranker) that every gramtrain front end builds on.

pub mod catalog;
pub mod dashboard;
pub mod error;
pub mod grader;
pub mod leaderboard;
pub mod model;
pub mod queue;
pub mod scheduler;
pub mod traits;
pub mod trainer;

pub use error::{StoreError, TrainerError};
