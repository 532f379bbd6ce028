//! Core data model types for gramtrain.
//!
//! Cards are immutable reference data. `CardState` and `DailyScore` are the
//! per-learner progress records the store persists; everything else here is
//! computed on demand and handed to the serving layer as plain data.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One of the four option keys of a multiple-choice card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChoiceKey {
    A,
    B,
    C,
    D,
}

impl ChoiceKey {
    pub const ALL: [ChoiceKey; 4] = [ChoiceKey::A, ChoiceKey::B, ChoiceKey::C, ChoiceKey::D];
}

impl fmt::Display for ChoiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoiceKey::A => write!(f, "A"),
            ChoiceKey::B => write!(f, "B"),
            ChoiceKey::C => write!(f, "C"),
            ChoiceKey::D => write!(f, "D"),
        }
    }
}

impl FromStr for ChoiceKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(ChoiceKey::A),
            "B" => Ok(ChoiceKey::B),
            "C" => Ok(ChoiceKey::C),
            "D" => Ok(ChoiceKey::D),
            other => Err(format!("unknown choice: {other:?}")),
        }
    }
}

/// A single grammar question. Never mutated by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Stable identifier (`card_<24 hex>`).
    pub id: String,
    /// Unit the card belongs to.
    pub unit_id: String,
    /// Skill within the unit.
    pub subtopic: String,
    /// Question text.
    pub prompt: String,
    /// Option key → option text.
    pub choices: BTreeMap<ChoiceKey, String>,
    /// The key of the right option.
    pub correct_choice: ChoiceKey,
    /// Shown after the learner answers.
    pub explanation: String,
    /// 1 (easiest) and up.
    pub difficulty: u8,
}

/// Per-(user, card) Leitner state. Exists once the user has answered the card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardState {
    pub card_id: String,
    /// Leitner box, 1 through 4.
    #[serde(rename = "box")]
    pub box_level: u8,
    /// Instant after which the card is eligible for review.
    pub due_date: DateTime<Utc>,
    /// Consecutive correct answers; reset on any miss.
    pub correct_streak: u32,
    pub total_attempts: u32,
    pub last_seen_at: DateTime<Utc>,
    /// Bumped on every write; used for compare-and-swap upserts.
    #[serde(default)]
    pub version: u64,
}

impl CardState {
    /// A card is due once its scheduled instant has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_date <= now
    }

    /// Box 4 is the mastered box.
    pub fn is_mastered(&self) -> bool {
        self.box_level >= crate::grader::MAX_BOX
    }
}

/// Per-(user, UTC day) score counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyScore {
    pub date: NaiveDate,
    pub points: u32,
    pub answers_count: u32,
}

impl DailyScore {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            points: 0,
            answers_count: 0,
        }
    }
}

/// Why a card was picked for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardSource {
    Due,
    New,
    NearDue,
}

impl fmt::Display for CardSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardSource::Due => write!(f, "due"),
            CardSource::New => write!(f, "new"),
            CardSource::NearDue => write!(f, "near_due"),
        }
    }
}

/// A card as presented in a session. The correct choice is withheld; grading
/// happens on the trainer side only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCard {
    pub id: String,
    pub unit_id: String,
    pub subtopic: String,
    pub prompt: String,
    pub choices: BTreeMap<ChoiceKey, String>,
    pub difficulty: u8,
    pub source: CardSource,
    /// Box at selection time; `None` for new cards.
    pub current_box: Option<u8>,
    /// Due instant at selection time; `None` for new cards.
    pub due_date: Option<DateTime<Utc>>,
}

impl SessionCard {
    pub fn new(card: &Card, source: CardSource, state: Option<&CardState>) -> Self {
        Self {
            id: card.id.clone(),
            unit_id: card.unit_id.clone(),
            subtopic: card.subtopic.clone(),
            prompt: card.prompt.clone(),
            choices: card.choices.clone(),
            difficulty: card.difficulty,
            source,
            current_box: state.map(|s| s.box_level),
            due_date: state.map(|s| s.due_date),
        }
    }
}

/// Feedback for one graded answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub card_id: String,
    /// The card had no state before this answer.
    pub is_new_card: bool,
    pub correct: bool,
    pub correct_choice: ChoiceKey,
    pub explanation: String,
    pub new_box: u8,
    pub due_date: DateTime<Utc>,
    /// The card goes back to the end of the current session queue.
    pub requeue_in_session: bool,
    pub points_awarded: u32,
    /// Today's points after this answer.
    pub daily_points: u32,
    /// Today's answer count after this answer.
    pub answers_today: u32,
}

/// One answer in the review log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub user_id: String,
    pub card_id: String,
    pub reviewed_at: DateTime<Utc>,
    pub correct: bool,
    pub choice: ChoiceKey,
    pub response_ms: u64,
}

/// An authenticated learner as handed over by the identity layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Learner {
    pub user_id: String,
    pub room_id: String,
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn choice_key_display_and_parse() {
        assert_eq!(ChoiceKey::C.to_string(), "C");
        assert_eq!("b".parse::<ChoiceKey>().unwrap(), ChoiceKey::B);
        assert_eq!(" d ".parse::<ChoiceKey>().unwrap(), ChoiceKey::D);
        assert!("E".parse::<ChoiceKey>().is_err());
        assert!("".parse::<ChoiceKey>().is_err());
    }

    #[test]
    fn card_state_serializes_box_field() {
        let now = Utc::now();
        let state = CardState {
            card_id: "card_1".into(),
            box_level: 3,
            due_date: now,
            correct_streak: 2,
            total_attempts: 4,
            last_seen_at: now,
            version: 1,
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["box"], 3);
        assert!(json.get("box_level").is_none());
    }

    #[test]
    fn due_boundary_is_inclusive() {
        let now = Utc::now();
        let mut state = CardState {
            card_id: "card_1".into(),
            box_level: 1,
            due_date: now,
            correct_streak: 0,
            total_attempts: 1,
            last_seen_at: now,
            version: 1,
        };
        assert!(state.is_due(now));
        state.due_date = now + Duration::seconds(1);
        assert!(!state.is_due(now));
    }

    #[test]
    fn session_card_withholds_answer() {
        let card = Card {
            id: "card_1".into(),
            unit_id: "commas".into(),
            subtopic: "lists".into(),
            prompt: "Pick one".into(),
            choices: ChoiceKey::ALL
                .iter()
                .map(|k| (*k, format!("option {k}")))
                .collect(),
            correct_choice: ChoiceKey::B,
            explanation: "Because.".into(),
            difficulty: 1,
        };
        let session_card = SessionCard::new(&card, CardSource::New, None);
        let json = serde_json::to_value(&session_card).unwrap();
        assert!(json.get("correct_choice").is_none());
        assert_eq!(json["source"], "new");
        assert_eq!(json["choices"]["A"], "option A");
        assert!(json["current_box"].is_null());
    }
}
