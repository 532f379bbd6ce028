//! Leitner answer grading and daily scoring.
//!
//! Boxes run from 1 to 4. A correct answer moves a card up one box, a miss
//! drops it back to box 1. Each box has a fixed review interval:
//!
//! | box | interval |
//! |-----|----------|
//! | 1   | 1 day    |
//! | 2   | 3 days   |
//! | 3   | 7 days   |
//! | 4   | 21 days  |
//!
//! Points are awarded for correct answers while the learner is below the
//! daily answer cap: 1 for a first exposure, 2 for a review.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TrainerError;
use crate::model::{AnswerResult, Card, CardState, ChoiceKey, DailyScore};

/// Box of a never-seen card, and the box every miss falls back to.
pub const MIN_BOX: u8 = 1;
/// Mastered box.
pub const MAX_BOX: u8 = 4;

/// Review interval in days for a box.
pub fn interval_days(box_level: u8) -> i64 {
    match box_level {
        0 | 1 => 1,
        2 => 3,
        3 => 7,
        _ => 21,
    }
}

/// Box after an answer, given the prior box (if any).
pub fn next_box(prior_box: Option<u8>, correct: bool) -> u8 {
    if correct {
        (prior_box.unwrap_or(MIN_BOX) + 1).min(MAX_BOX)
    } else {
        MIN_BOX
    }
}

/// Daily cap and point values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    /// Answers per day that can still earn points.
    #[serde(default = "default_daily_cap")]
    pub daily_cap: u32,
    /// Points for a correct answer on a never-seen card.
    #[serde(default = "default_first_exposure_points")]
    pub first_exposure_points: u32,
    /// Points for a correct answer on a card under review.
    #[serde(default = "default_review_points")]
    pub review_points: u32,
}

fn default_daily_cap() -> u32 {
    60
}
fn default_first_exposure_points() -> u32 {
    1
}
fn default_review_points() -> u32 {
    2
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            daily_cap: default_daily_cap(),
            first_exposure_points: default_first_exposure_points(),
            review_points: default_review_points(),
        }
    }
}

impl ScoringRules {
    /// Points for one answer given how many answers were already made today.
    pub fn points_for(&self, correct: bool, is_new_card: bool, answers_today: u32) -> u32 {
        if !correct || answers_today >= self.daily_cap {
            return 0;
        }
        if is_new_card {
            self.first_exposure_points
        } else {
            self.review_points
        }
    }
}

/// Everything one graded answer produces.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeOutcome {
    pub result: AnswerResult,
    /// State to upsert for (user, card).
    pub card_state: CardState,
    /// Today's score after the answer.
    pub daily_score: DailyScore,
    /// Points to add to today's stored score.
    pub points_delta: u32,
    /// The parsed choice, for the review log.
    pub choice: ChoiceKey,
}

/// Grade one submitted choice for `card`.
///
/// `today` is ignored if it belongs to a different UTC day than `now`.
pub fn grade_answer(
    card: &Card,
    submitted_choice: &str,
    prior: Option<&CardState>,
    today: Option<&DailyScore>,
    rules: &ScoringRules,
    now: DateTime<Utc>,
) -> Result<GradeOutcome, TrainerError> {
    let choice: ChoiceKey = submitted_choice
        .parse()
        .map_err(TrainerError::InvalidInput)?;
    if !card.choices.contains_key(&choice) {
        return Err(TrainerError::InvalidInput(format!(
            "card {} has no option {choice}",
            card.id
        )));
    }

    let today_date = now.date_naive();
    let today = today
        .filter(|s| s.date == today_date)
        .cloned()
        .unwrap_or_else(|| DailyScore::empty(today_date));

    let is_new_card = prior.is_none();
    let correct = choice == card.correct_choice;
    let new_box = next_box(prior.map(|p| p.box_level), correct);
    let due_date = now + Duration::days(interval_days(new_box));

    let card_state = CardState {
        card_id: card.id.clone(),
        box_level: new_box,
        due_date,
        correct_streak: if correct {
            prior.map_or(0, |p| p.correct_streak) + 1
        } else {
            0
        },
        total_attempts: prior.map_or(0, |p| p.total_attempts) + 1,
        last_seen_at: now,
        version: prior.map_or(0, |p| p.version) + 1,
    };

    let points_delta = rules.points_for(correct, is_new_card, today.answers_count);
    let daily_score = DailyScore {
        date: today_date,
        points: today.points + points_delta,
        answers_count: today.answers_count + 1,
    };

    let result = AnswerResult {
        card_id: card.id.clone(),
        is_new_card,
        correct,
        correct_choice: card.correct_choice,
        explanation: card.explanation.clone(),
        new_box,
        due_date,
        requeue_in_session: !correct,
        points_awarded: points_delta,
        daily_points: daily_score.points,
        answers_today: daily_score.answers_count,
    };

    Ok(GradeOutcome {
        result,
        card_state,
        daily_score,
        points_delta,
        choice,
    })
}
