//! Per-learner progress summary.
//!
//! Unit completion is judged by one of two mastery models, chosen once in
//! configuration:
//!
//! - **card count**: a unit is complete once `threshold` of its cards sit in
//!   the mastered box
//! - **subtopic coverage**: a subtopic is mastered once `min_per_subtopic` of
//!   its cards sit in the mastered box, and a unit is complete once
//!   `completion_fraction` of its subtopics are mastered

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::model::{CardState, DailyScore};

/// How unit completion is measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum MasteryModel {
    CardCount {
        #[serde(default = "default_threshold")]
        threshold: u32,
    },
    SubtopicCoverage {
        #[serde(default = "default_min_per_subtopic")]
        min_per_subtopic: u32,
        #[serde(default = "default_completion_fraction")]
        completion_fraction: f64,
    },
}

fn default_threshold() -> u32 {
    15
}
fn default_min_per_subtopic() -> u32 {
    3
}
fn default_completion_fraction() -> f64 {
    0.8
}

impl Default for MasteryModel {
    fn default() -> Self {
        MasteryModel::SubtopicCoverage {
            min_per_subtopic: default_min_per_subtopic(),
            completion_fraction: default_completion_fraction(),
        }
    }
}

impl MasteryModel {
    pub fn name(&self) -> &'static str {
        match self {
            MasteryModel::CardCount { .. } => "card_count",
            MasteryModel::SubtopicCoverage { .. } => "subtopic_coverage",
        }
    }
}

/// Mastery of one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitMastery {
    pub unit_id: String,
    pub total_cards: usize,
    pub seen_cards: usize,
    pub mastered_cards: usize,
    /// Progress toward completion, 0.0 to 1.0.
    pub mastery_ratio: f64,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtopics_total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtopics_mastered: Option<usize>,
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    /// Cards due for review right now, across all units.
    pub due_count: usize,
    pub daily_points: u32,
    pub answers_today: u32,
    pub mastery_model: String,
    /// Sorted by unit id.
    pub unit_mastery: Vec<UnitMastery>,
}

#[derive(Default)]
struct UnitTally<'a> {
    total: usize,
    seen: usize,
    mastered: usize,
    // subtopic → mastered cards in it
    subtopics: BTreeMap<&'a str, u32>,
}

/// Summarize a learner's progress.
pub fn compute_dashboard(
    catalog: &Catalog,
    states: &HashMap<String, CardState>,
    today: Option<&DailyScore>,
    model: &MasteryModel,
    now: DateTime<Utc>,
) -> DashboardData {
    let due_count = states.values().filter(|s| s.is_due(now)).count();

    let mut units: BTreeMap<&str, UnitTally> = BTreeMap::new();
    for card in catalog.cards() {
        let tally = units.entry(card.unit_id.as_str()).or_default();
        tally.total += 1;
        let mastered_here = tally.subtopics.entry(card.subtopic.as_str()).or_insert(0);
        if let Some(state) = states.get(&card.id) {
            tally.seen += 1;
            if state.is_mastered() {
                tally.mastered += 1;
                *mastered_here += 1;
            }
        }
    }

    let unit_mastery = units
        .into_iter()
        .map(|(unit_id, tally)| unit_row(unit_id, &tally, model))
        .collect();

    let today = today.filter(|s| s.date == now.date_naive());

    DashboardData {
        due_count,
        daily_points: today.map_or(0, |s| s.points),
        answers_today: today.map_or(0, |s| s.answers_count),
        mastery_model: model.name().to_string(),
        unit_mastery,
    }
}

fn unit_row(unit_id: &str, tally: &UnitTally<'_>, model: &MasteryModel) -> UnitMastery {
    let (mastery_ratio, completed, subtopics_total, subtopics_mastered) = match model {
        MasteryModel::CardCount { threshold } => {
            let mastered = tally.mastered as f64;
            if *threshold == 0 {
                (1.0, true, None, None)
            } else {
                let threshold = f64::from(*threshold);
                ((mastered / threshold).min(1.0), mastered >= threshold, None, None)
            }
        }
        MasteryModel::SubtopicCoverage {
            min_per_subtopic,
            completion_fraction,
        } => {
            let total = tally.subtopics.len();
            let mastered = tally
                .subtopics
                .values()
                .filter(|&&n| n >= *min_per_subtopic)
                .count();
            let ratio = if total == 0 {
                0.0
            } else {
                mastered as f64 / total as f64
            };
            let completed = total > 0 && ratio + f64::EPSILON >= *completion_fraction;
            (ratio, completed, Some(total), Some(mastered))
        }
    };

    UnitMastery {
        unit_id: unit_id.to_string(),
        total_cards: tally.total,
        seen_cards: tally.seen,
        mastered_cards: tally.mastered,
        mastery_ratio,
        completed,
        subtopics_total,
        subtopics_mastered,
    }
}
