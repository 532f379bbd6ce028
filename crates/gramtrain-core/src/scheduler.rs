//! Spaced-repetition session scheduler.
//!
//! A session is filled in three passes over the catalog:
//!
//! 1. **due**: cards whose review instant has passed, most overdue first
//! 2. **new**: never-seen cards, easiest first, at most `new_card_cap`
//! 3. **near-due**: cards scheduled in the future, soonest first, as filler
//!
//! Every pass honours the unit filter and skips cards already chosen.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::TrainerError;
use crate::model::{Card, CardSource, CardState, SessionCard};

/// Bounds applied to session sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLimits {
    /// Smallest size an untrusted caller can ask for.
    #[serde(rename = "min_session_size", default = "default_min_size")]
    pub min_size: usize,
    /// Largest size an untrusted caller can ask for.
    #[serde(rename = "max_session_size", default = "default_max_size")]
    pub max_size: usize,
    /// Most never-seen cards introduced in one session.
    #[serde(default = "default_new_card_cap")]
    pub new_card_cap: usize,
    /// Size of the onboarding warm-up session.
    #[serde(default = "default_warmup_size")]
    pub warmup_size: usize,
}

fn default_min_size() -> usize {
    10
}
fn default_max_size() -> usize {
    20
}
fn default_new_card_cap() -> usize {
    5
}
fn default_warmup_size() -> usize {
    5
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            min_size: default_min_size(),
            max_size: default_max_size(),
            new_card_cap: default_new_card_cap(),
            warmup_size: default_warmup_size(),
        }
    }
}

/// A validated session size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSize(usize);

impl SessionSize {
    /// Clamp a caller-supplied size into `[min_size, max_size]`.
    /// A missing size means the minimum.
    pub fn untrusted(raw: Option<i64>, limits: &SessionLimits) -> Self {
        let min = limits.min_size as i64;
        let max = limits.max_size.max(limits.min_size) as i64;
        Self(raw.unwrap_or(min).clamp(min, max) as usize)
    }

    /// An internally chosen size, used as is.
    pub fn exact(size: usize) -> Result<Self, TrainerError> {
        if size == 0 {
            return Err(TrainerError::InvalidInput(
                "session size must be at least 1".into(),
            ));
        }
        Ok(Self(size))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

/// How many cards each pass contributed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounts {
    pub due: usize,
    pub new: usize,
    pub near_due: usize,
}

/// The ordered queue for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub session_size: usize,
    pub unit_id: Option<String>,
    pub counts: SessionCounts,
    pub cards: Vec<SessionCard>,
}

impl SessionPlan {
    /// Nothing to practice.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Build the practice queue for one session.
///
/// Fails with `InvalidInput` if `unit_filter` names a unit the catalog does
/// not contain. A blank filter means no filter.
pub fn build_session(
    catalog: &Catalog,
    states: &HashMap<String, CardState>,
    size: SessionSize,
    unit_filter: Option<&str>,
    new_card_cap: usize,
    now: DateTime<Utc>,
) -> Result<SessionPlan, TrainerError> {
    let unit_filter = unit_filter.map(str::trim).filter(|u| !u.is_empty());
    if let Some(unit) = unit_filter {
        if !catalog.has_unit(unit) {
            return Err(TrainerError::InvalidInput(format!("unknown unit: {unit}")));
        }
    }

    let size = size.get();
    let eligible: Vec<&Card> = catalog
        .cards()
        .iter()
        .filter(|c| unit_filter.map_or(true, |u| c.unit_id == u))
        .collect();

    let mut chosen: HashSet<&str> = HashSet::new();
    let mut cards: Vec<SessionCard> = Vec::with_capacity(size);
    let mut counts = SessionCounts::default();

    // Pass 1: due
    let mut due: Vec<(&Card, &CardState)> = eligible
        .iter()
        .filter_map(|c| states.get(&c.id).map(|s| (*c, s)))
        .filter(|(_, s)| s.is_due(now))
        .collect();
    due.sort_by(|a, b| a.1.due_date.cmp(&b.1.due_date).then_with(|| a.0.id.cmp(&b.0.id)));
    for (card, state) in due.into_iter().take(size) {
        chosen.insert(card.id.as_str());
        cards.push(SessionCard::new(card, CardSource::Due, Some(state)));
        counts.due += 1;
    }

    // Pass 2: new
    let new_limit = new_card_cap.min(size - cards.len());
    if new_limit > 0 {
        let mut fresh: Vec<&Card> = eligible
            .iter()
            .copied()
            .filter(|c| !states.contains_key(&c.id) && !chosen.contains(c.id.as_str()))
            .collect();
        fresh.sort_by(|a, b| a.difficulty.cmp(&b.difficulty).then_with(|| a.id.cmp(&b.id)));
        for card in fresh.into_iter().take(new_limit) {
            chosen.insert(card.id.as_str());
            cards.push(SessionCard::new(card, CardSource::New, None));
            counts.new += 1;
        }
    }

    // Pass 3: near-due filler
    let remaining = size - cards.len();
    if remaining > 0 {
        let mut near: Vec<(&Card, &CardState)> = eligible
            .iter()
            .filter(|c| !chosen.contains(c.id.as_str()))
            .filter_map(|c| states.get(&c.id).map(|s| (*c, s)))
            .filter(|(_, s)| !s.is_due(now))
            .collect();
        near.sort_by(|a, b| a.1.due_date.cmp(&b.1.due_date).then_with(|| a.0.id.cmp(&b.0.id)));
        for (card, state) in near.into_iter().take(remaining) {
            cards.push(SessionCard::new(card, CardSource::NearDue, Some(state)));
            counts.near_due += 1;
        }
    }

    tracing::debug!(
        due = counts.due,
        new = counts.new,
        near_due = counts.near_due,
        size,
        "built session"
    );

    Ok(SessionPlan {
        session_size: size,
        unit_id: unit_filter.map(str::to_string),
        counts,
        cards,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChoiceKey;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    fn card(id: &str, unit: &str, difficulty: u8) -> Card {
        Card {
            id: id.into(),
            unit_id: unit.into(),
            subtopic: "general".into(),
            prompt: format!("prompt {id}"),
            choices: ChoiceKey::ALL.iter().map(|k| (*k, format!("{id}-{k}"))).collect(),
            correct_choice: ChoiceKey::A,
            explanation: String::new(),
            difficulty,
        }
    }

    fn state(id: &str, due_in_hours: i64) -> (String, CardState) {
        (
            id.to_string(),
            CardState {
                card_id: id.into(),
                box_level: 2,
                due_date: now() + Duration::hours(due_in_hours),
                correct_streak: 1,
                total_attempts: 1,
                last_seen_at: now() - Duration::days(2),
                version: 1,
            },
        )
    }

    fn sources(plan: &SessionPlan) -> Vec<CardSource> {
        plan.cards.iter().map(|c| c.source).collect()
    }

    fn limits() -> SessionLimits {
        SessionLimits::default()
    }

    #[test]
    fn untrusted_sizes_are_clamped() {
        assert_eq!(SessionSize::untrusted(Some(3), &limits()).get(), 10);
        assert_eq!(SessionSize::untrusted(Some(15), &limits()).get(), 15);
        assert_eq!(SessionSize::untrusted(Some(500), &limits()).get(), 20);
        assert_eq!(SessionSize::untrusted(Some(-4), &limits()).get(), 10);
        assert_eq!(SessionSize::untrusted(None, &limits()).get(), 10);
    }

    #[test]
    fn exact_size_bypasses_clamp() {
        assert_eq!(SessionSize::exact(5).unwrap().get(), 5);
        assert!(matches!(
            SessionSize::exact(0),
            Err(TrainerError::InvalidInput(_))
        ));
    }

    #[test]
    fn due_new_then_near_due() {
        // 3 due, 2 new, 20 near-due → 3 + 2 + 5
        let mut cards = Vec::new();
        let mut states = HashMap::new();
        for i in 0..3 {
            let id = format!("due{i}");
            cards.push(card(&id, "u1", 1));
            states.extend([state(&id, -(10 - i as i64))]);
        }
        for i in 0..2 {
            cards.push(card(&format!("new{i}"), "u1", 1));
        }
        for i in 0..20 {
            let id = format!("near{i:02}");
            cards.push(card(&id, "u1", 1));
            states.extend([state(&id, 1 + i as i64)]);
        }
        let catalog = Catalog::new(cards);

        let plan = build_session(
            &catalog,
            &states,
            SessionSize::untrusted(Some(10), &limits()),
            None,
            5,
            now(),
        )
        .unwrap();

        assert_eq!(plan.cards.len(), 10);
        assert_eq!(
            plan.counts,
            SessionCounts {
                due: 3,
                new: 2,
                near_due: 5
            }
        );
        let expected: Vec<CardSource> = [CardSource::Due; 3]
            .into_iter()
            .chain([CardSource::New; 2])
            .chain([CardSource::NearDue; 5])
            .collect();
        assert_eq!(sources(&plan), expected);

        // most overdue first, soonest near-due first
        assert_eq!(plan.cards[0].id, "due0");
        assert_eq!(plan.cards[5].id, "near00");
        assert_eq!(plan.cards[9].id, "near04");
        assert!(plan.cards[3].current_box.is_none());
        assert_eq!(plan.cards[0].current_box, Some(2));
    }

    #[test]
    fn new_cards_capped_and_easiest_first() {
        let cards: Vec<Card> = (0..12)
            .map(|i| card(&format!("c{i:02}"), "u1", 3 - (i % 3) as u8))
            .collect();
        let catalog = Catalog::new(cards);
        let plan = build_session(
            &catalog,
            &HashMap::new(),
            SessionSize::untrusted(Some(20), &limits()),
            None,
            5,
            now(),
        )
        .unwrap();

        assert_eq!(plan.cards.len(), 5);
        assert!(plan.cards.iter().all(|c| c.source == CardSource::New));
        let difficulties: Vec<u8> = plan.cards.iter().map(|c| c.difficulty).collect();
        assert_eq!(difficulties, vec![1, 1, 1, 1, 2]);
        assert_eq!(plan.cards[0].id, "c02");
        assert_eq!(plan.cards[1].id, "c05");
    }

    #[test]
    fn due_cards_fill_whole_session() {
        let mut cards = Vec::new();
        let mut states = HashMap::new();
        for i in 0..25 {
            let id = format!("d{i:02}");
            cards.push(card(&id, "u1", 1));
            states.extend([state(&id, -1)]);
        }
        cards.push(card("fresh", "u1", 1));
        let catalog = Catalog::new(cards);
        let plan = build_session(
            &catalog,
            &states,
            SessionSize::untrusted(Some(12), &limits()),
            None,
            5,
            now(),
        )
        .unwrap();
        assert_eq!(plan.cards.len(), 12);
        assert_eq!(plan.counts.new, 0);
        // identical due dates tie-break by id
        assert_eq!(plan.cards[0].id, "d00");
        assert_eq!(plan.cards[11].id, "d11");
    }

    #[test]
    fn unit_filter_is_respected() {
        let cards = vec![
            card("a1", "articles", 1),
            card("a2", "articles", 1),
            card("v1", "verbs", 1),
        ];
        let states: HashMap<String, CardState> = [state("v1", -5)].into_iter().collect();
        let catalog = Catalog::new(cards);
        let plan = build_session(
            &catalog,
            &states,
            SessionSize::untrusted(Some(10), &limits()),
            Some("articles"),
            5,
            now(),
        )
        .unwrap();
        assert_eq!(plan.cards.len(), 2);
        assert!(plan.cards.iter().all(|c| c.unit_id == "articles"));
        assert_eq!(plan.unit_id.as_deref(), Some("articles"));
    }

    #[test]
    fn unknown_unit_is_invalid_and_blank_unit_is_ignored() {
        let catalog = Catalog::new(vec![card("a1", "articles", 1)]);
        let err = build_session(
            &catalog,
            &HashMap::new(),
            SessionSize::untrusted(None, &limits()),
            Some("nope"),
            5,
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, TrainerError::InvalidInput(_)));

        let plan = build_session(
            &catalog,
            &HashMap::new(),
            SessionSize::untrusted(None, &limits()),
            Some("   "),
            5,
            now(),
        )
        .unwrap();
        assert_eq!(plan.cards.len(), 1);
        assert!(plan.unit_id.is_none());
    }

    #[test]
    fn empty_catalog_is_nothing_to_practice() {
        let plan = build_session(
            &Catalog::default(),
            &HashMap::new(),
            SessionSize::untrusted(None, &limits()),
            None,
            5,
            now(),
        )
        .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn no_duplicates_and_bounded_by_size() {
        let mut cards = Vec::new();
        let mut states = HashMap::new();
        for i in 0..40 {
            let id = format!("k{i:02}");
            cards.push(card(&id, if i % 2 == 0 { "u1" } else { "u2" }, (i % 3 + 1) as u8));
            match i % 3 {
                0 => states.extend([state(&id, -(i as i64))]),
                1 => states.extend([state(&id, i as i64)]),
                _ => {}
            }
        }
        let catalog = Catalog::new(cards);
        for requested in [1usize, 4, 7, 10, 20] {
            for unit in [None, Some("u1"), Some("u2")] {
                let plan = build_session(
                    &catalog,
                    &states,
                    SessionSize::exact(requested).unwrap(),
                    unit,
                    5,
                    now(),
                )
                .unwrap();
                assert!(plan.cards.len() <= requested);
                let ids: HashSet<&str> = plan.cards.iter().map(|c| c.id.as_str()).collect();
                assert_eq!(ids.len(), plan.cards.len());
                assert!(plan.counts.new <= 5);
                if let Some(u) = unit {
                    assert!(plan.cards.iter().all(|c| c.unit_id == u));
                }
            }
        }
    }
}
