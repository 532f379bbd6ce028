//! Room leaderboard ranking.
//!
//! Rows are ordered by points (descending), then mastered cards, then
//! streak, then display name (ascending, byte-wise). The order is total, so
//! identical inputs always rank identically.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::{CardState, DailyScore};

/// Which days count toward leaderboard points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardRange {
    #[default]
    Today,
    /// Today and the six days before it.
    Week,
    All,
}

impl LeaderboardRange {
    /// First day included in the range, or `None` for all time.
    pub fn start_date(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            LeaderboardRange::Today => Some(today),
            LeaderboardRange::Week => today.checked_sub_days(Days::new(6)),
            LeaderboardRange::All => None,
        }
    }

    pub fn contains(self, date: NaiveDate, today: NaiveDate) -> bool {
        date <= today && self.start_date(today).map_or(true, |start| date >= start)
    }
}

impl fmt::Display for LeaderboardRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaderboardRange::Today => write!(f, "today"),
            LeaderboardRange::Week => write!(f, "week"),
            LeaderboardRange::All => write!(f, "all"),
        }
    }
}

impl FromStr for LeaderboardRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" | "day" => Ok(LeaderboardRange::Today),
            "week" | "7d" => Ok(LeaderboardRange::Week),
            "all" | "all-time" | "alltime" => Ok(LeaderboardRange::All),
            other => Err(format!("unknown leaderboard range: {other}")),
        }
    }
}

/// One learner's inputs to the ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberProgress {
    pub display_name: String,
    pub daily_scores: Vec<DailyScore>,
    /// Cards in the mastered box, all time.
    pub mastered: usize,
}

impl MemberProgress {
    pub fn from_states<'a>(
        display_name: impl Into<String>,
        daily_scores: Vec<DailyScore>,
        states: impl IntoIterator<Item = &'a CardState>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            daily_scores,
            mastered: states.into_iter().filter(|s| s.is_mastered()).count(),
        }
    }
}

/// One ranked row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub display_name: String,
    pub points: u32,
    pub mastered: usize,
    pub streak: u32,
}

/// A ranked leaderboard for one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub range: LeaderboardRange,
    pub rows: Vec<LeaderboardRow>,
}

/// Consecutive days, walking back from `today`, that appear in `active_days`.
pub fn current_streak(active_days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut cursor = Some(today);
    while let Some(day) = cursor.filter(|d| active_days.contains(d)) {
        streak += 1;
        cursor = day.pred_opt();
    }
    streak
}

/// Rank the members of one room.
///
/// A day counts toward the streak when it earned at least one point.
pub fn rank_leaderboard(
    members: &[MemberProgress],
    range: LeaderboardRange,
    today: NaiveDate,
) -> Vec<LeaderboardRow> {
    let mut rows: Vec<LeaderboardRow> = members
        .iter()
        .map(|member| {
            let points = member
                .daily_scores
                .iter()
                .filter(|s| range.contains(s.date, today))
                .map(|s| s.points)
                .sum();
            let active_days: BTreeSet<NaiveDate> = member
                .daily_scores
                .iter()
                .filter(|s| s.points > 0)
                .map(|s| s.date)
                .collect();
            LeaderboardRow {
                display_name: member.display_name.clone(),
                points,
                mastered: member.mastered,
                streak: current_streak(&active_days, today),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| b.mastered.cmp(&a.mastered))
            .then_with(|| b.streak.cmp(&a.streak))
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
    rows
}
