//! Trait definitions for the trainer's collaborators.
//!
//! The catalog source and progress store are implemented by the
//! `gramtrain-store` crate. The clock is injectable so scheduling and
//! grading stay deterministic under test.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::catalog::Catalog;
use crate::error::StoreError;
use crate::model::{Card, CardState, DailyScore, Learner, Review};

// ---------------------------------------------------------------------------
// Catalog source
// ---------------------------------------------------------------------------

/// Read-only access to the full card set.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn list_cards(&self) -> Result<Vec<Card>, StoreError>;
}

#[async_trait]
impl CatalogSource for Catalog {
    async fn list_cards(&self) -> Result<Vec<Card>, StoreError> {
        Ok(self.cards().to_vec())
    }
}

// ---------------------------------------------------------------------------
// Progress store
// ---------------------------------------------------------------------------

/// The writes produced by one graded answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerWrite {
    pub user_id: String,
    pub state: CardState,
    /// Version the stored state must have; `None` means no state may exist yet.
    pub expected_version: Option<u64>,
    pub date: NaiveDate,
    pub points_delta: u32,
    pub review: Review,
}

/// Per-learner progress persistence.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Human-readable backend name (e.g. "sqlite").
    fn name(&self) -> &str;

    /// All card states of a user, keyed by card id.
    async fn get_card_states(&self, user_id: &str) -> Result<HashMap<String, CardState>, StoreError>;

    /// The state of one card, if the user has answered it.
    async fn get_card_state(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Option<CardState>, StoreError> {
        Ok(self.get_card_states(user_id).await?.remove(card_id))
    }

    async fn get_daily_score(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyScore>, StoreError>;

    /// Every daily score of a user, any order.
    async fn get_daily_scores(&self, user_id: &str) -> Result<Vec<DailyScore>, StoreError>;

    /// Create or replace a card state, failing with `VersionConflict` if the
    /// stored version differs from `expected_version`.
    async fn upsert_card_state(
        &self,
        user_id: &str,
        state: &CardState,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError>;

    /// Additive upsert: create the row from the deltas, or add them to it.
    async fn upsert_daily_score(
        &self,
        user_id: &str,
        date: NaiveDate,
        points_delta: u32,
        answers_delta: u32,
    ) -> Result<DailyScore, StoreError>;

    async fn append_review(&self, review: &Review) -> Result<(), StoreError>;

    /// Learners registered in a room.
    async fn list_members(&self, room_id: &str) -> Result<Vec<Learner>, StoreError>;

    /// Apply all writes of one answer and return today's updated score.
    ///
    /// Stores with transactions override this to commit atomically. The
    /// fallback writes the card state first, then retries the daily score
    /// once before reporting failure. The review is appended last; once the
    /// state and score are written the answer counts, so a failed append is
    /// logged and the call still succeeds.
    async fn commit_answer(&self, write: &AnswerWrite) -> Result<DailyScore, StoreError> {
        self.upsert_card_state(&write.user_id, &write.state, write.expected_version)
            .await?;

        let score = match self
            .upsert_daily_score(&write.user_id, write.date, write.points_delta, 1)
            .await
        {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!(
                    "daily score write failed for {} ({e}), retrying once",
                    write.user_id
                );
                self.upsert_daily_score(&write.user_id, write.date, write.points_delta, 1)
                    .await?
            }
        };

        if let Err(e) = self.append_review(&write.review).await {
            tracing::warn!(
                "answer for {} on {} recorded without review log entry: {e}",
                write.user_id,
                write.review.card_id
            );
        }
        Ok(score)
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for tests and simulations.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
