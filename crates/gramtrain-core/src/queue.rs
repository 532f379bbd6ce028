//! In-memory queue for one practice session.
//!
//! Missed cards go to the back of the queue and come around again before the
//! session ends. Correct answers retire the card for the rest of the session.

use std::collections::VecDeque;

use serde::Serialize;

use crate::error::TrainerError;
use crate::model::{AnswerResult, SessionCard};

/// Counters for a running session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueProgress {
    /// Distinct cards the session started with.
    pub total: usize,
    /// Cards answered correctly and removed.
    pub retired: usize,
    /// Answers recorded, including repeats.
    pub attempts: usize,
    pub correct: usize,
    pub points: u32,
}

#[derive(Debug, Clone)]
pub struct PracticeQueue {
    queue: VecDeque<SessionCard>,
    progress: QueueProgress,
}

impl PracticeQueue {
    pub fn new(cards: Vec<SessionCard>) -> Self {
        Self {
            progress: QueueProgress {
                total: cards.len(),
                ..QueueProgress::default()
            },
            queue: cards.into(),
        }
    }

    /// The card to show next.
    pub fn current(&self) -> Option<&SessionCard> {
        self.queue.front()
    }

    /// Apply the grader's verdict for the current card.
    pub fn record(&mut self, result: &AnswerResult) -> Result<(), TrainerError> {
        let Some(front) = self.queue.front() else {
            return Err(TrainerError::InvalidInput("session already finished".into()));
        };
        if front.id != result.card_id {
            return Err(TrainerError::InvalidInput(format!(
                "expected an answer for {}, got {}",
                front.id, result.card_id
            )));
        }

        let Some(mut card) = self.queue.pop_front() else {
            return Err(TrainerError::InvalidInput("session already finished".into()));
        };
        self.progress.attempts += 1;
        self.progress.points += result.points_awarded;

        if result.requeue_in_session {
            card.current_box = Some(result.new_box);
            card.due_date = Some(result.due_date);
            self.queue.push_back(card);
        } else {
            self.progress.correct += 1;
            self.progress.retired += 1;
        }
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn is_finished(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn progress(&self) -> QueueProgress {
        self.progress
    }
}
