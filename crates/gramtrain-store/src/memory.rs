//! In-memory progress store for tests and single-process demos.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use gramtrain_core::model::{CardState, DailyScore, Learner, Review};
use gramtrain_core::traits::{AnswerWrite, ProgressStore};
use gramtrain_core::StoreError;

use crate::error::RosterError;
use crate::roster::{
    display_name_key, normalize_display_name, normalize_room_code, room_code_hash, Roster,
};

#[derive(Default)]
struct Inner {
    // user → card → state
    states: HashMap<String, HashMap<String, CardState>>,
    scores: HashMap<(String, NaiveDate), DailyScore>,
    reviews: Vec<Review>,
    // room code hash → room id
    rooms: HashMap<String, String>,
    learners: Vec<Learner>,
}

impl Inner {
    fn check_version(
        &self,
        user_id: &str,
        card_id: &str,
        expected: Option<u64>,
    ) -> Result<(), StoreError> {
        let current = self
            .states
            .get(user_id)
            .and_then(|cards| cards.get(card_id))
            .map(|s| s.version);
        if current == expected {
            Ok(())
        } else {
            Err(StoreError::VersionConflict {
                user_id: user_id.to_string(),
                card_id: card_id.to_string(),
            })
        }
    }

    fn put_state(&mut self, user_id: &str, state: &CardState) {
        self.states
            .entry(user_id.to_string())
            .or_default()
            .insert(state.card_id.clone(), state.clone());
    }

    fn add_score(&mut self, user_id: &str, date: NaiveDate, points: u32, answers: u32) -> DailyScore {
        let score = self
            .scores
            .entry((user_id.to_string(), date))
            .or_insert_with(|| DailyScore::empty(date));
        score.points += points;
        score.answers_count += answers;
        score.clone()
    }
}

/// A `ProgressStore` and `Roster` held entirely in memory.
///
/// `commit_answer` applies its writes under one lock, so it is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    /// Every review recorded so far, oldest first.
    pub fn reviews(&self) -> Vec<Review> {
        self.lock().map(|inner| inner.reviews.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_card_states(&self, user_id: &str) -> Result<HashMap<String, CardState>, StoreError> {
        Ok(self.lock()?.states.get(user_id).cloned().unwrap_or_default())
    }

    async fn get_card_state(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Option<CardState>, StoreError> {
        Ok(self
            .lock()?
            .states
            .get(user_id)
            .and_then(|cards| cards.get(card_id))
            .cloned())
    }

    async fn get_daily_score(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyScore>, StoreError> {
        Ok(self.lock()?.scores.get(&(user_id.to_string(), date)).cloned())
    }

    async fn get_daily_scores(&self, user_id: &str) -> Result<Vec<DailyScore>, StoreError> {
        let inner = self.lock()?;
        let mut scores: Vec<DailyScore> = inner
            .scores
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|(_, score)| score.clone())
            .collect();
        scores.sort_by_key(|s| s.date);
        Ok(scores)
    }

    async fn upsert_card_state(
        &self,
        user_id: &str,
        state: &CardState,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.check_version(user_id, &state.card_id, expected_version)?;
        inner.put_state(user_id, state);
        Ok(())
    }

    async fn upsert_daily_score(
        &self,
        user_id: &str,
        date: NaiveDate,
        points_delta: u32,
        answers_delta: u32,
    ) -> Result<DailyScore, StoreError> {
        Ok(self.lock()?.add_score(user_id, date, points_delta, answers_delta))
    }

    async fn append_review(&self, review: &Review) -> Result<(), StoreError> {
        self.lock()?.reviews.push(review.clone());
        Ok(())
    }

    async fn list_members(&self, room_id: &str) -> Result<Vec<Learner>, StoreError> {
        Ok(self
            .lock()?
            .learners
            .iter()
            .filter(|l| l.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn commit_answer(&self, write: &AnswerWrite) -> Result<DailyScore, StoreError> {
        let mut inner = self.lock()?;
        inner.check_version(&write.user_id, &write.state.card_id, write.expected_version)?;
        inner.put_state(&write.user_id, &write.state);
        let score = inner.add_score(&write.user_id, write.date, write.points_delta, 1);
        inner.reviews.push(write.review.clone());
        Ok(score)
    }
}

#[async_trait]
impl Roster for MemoryStore {
    async fn register_learner(
        &self,
        room_code: &str,
        display_name: &str,
    ) -> Result<Learner, RosterError> {
        let code = normalize_room_code(room_code)?;
        let name = normalize_display_name(display_name)?;

        let mut inner = self.lock()?;
        let room_id = inner
            .rooms
            .entry(room_code_hash(&code))
            .or_insert_with(|| Uuid::new_v4().to_string())
            .clone();

        let key = display_name_key(&name);
        if let Some(existing) = inner
            .learners
            .iter()
            .find(|l| l.room_id == room_id && display_name_key(&l.display_name) == key)
        {
            return Ok(existing.clone());
        }

        let learner = Learner {
            user_id: Uuid::new_v4().to_string(),
            room_id,
            display_name: name,
        };
        inner.learners.push(learner.clone());
        tracing::debug!("registered {} in room {}", learner.display_name, learner.room_id);
        Ok(learner)
    }

    async fn find_learner(&self, user_id: &str) -> Result<Option<Learner>, StoreError> {
        Ok(self
            .lock()?
            .learners
            .iter()
            .find(|l| l.user_id == user_id)
            .cloned())
    }
}
