//! Central trainer orchestrator.
//!
//! Wires the catalog source, the progress store and the clock to the four
//! core operations. Every call re-reads the catalog and the learner's
//! progress; nothing is cached between calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::dashboard::{compute_dashboard, DashboardData, MasteryModel};
use crate::error::TrainerError;
use crate::grader::{grade_answer, ScoringRules};
use crate::leaderboard::{rank_leaderboard, Leaderboard, LeaderboardRange, MemberProgress};
use crate::model::{AnswerResult, Learner, Review};
use crate::scheduler::{build_session, SessionLimits, SessionPlan, SessionSize};
use crate::traits::{AnswerWrite, CatalogSource, Clock, ProgressStore, SystemClock};

/// Entries kept in the lock table before idle ones are swept.
const LOCK_SWEEP_THRESHOLD: usize = 1024;

/// Configuration for the trainer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    #[serde(flatten)]
    pub scoring: ScoringRules,
    #[serde(flatten)]
    pub session: SessionLimits,
    #[serde(default)]
    pub mastery: MasteryModel,
}

/// A start-session call from the serving layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Requested size; clamped into the configured bounds.
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub unit_id: Option<String>,
    /// Onboarding warm-up: fixed size, no clamp.
    #[serde(default)]
    pub warmup: bool,
}

/// One submitted answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub card_id: String,
    pub choice: String,
    /// Time the learner took to answer.
    #[serde(default)]
    pub response_ms: i64,
}

/// Serializes grading per learner within this process. A learner's answers
/// on any card share one daily score and its cap.
#[derive(Default)]
struct LearnerLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LearnerLocks {
    fn acquire(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if map.len() >= LOCK_SWEEP_THRESHOLD {
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(map.entry(user_id.to_string()).or_default())
    }
}

/// The trainer.
pub struct Trainer {
    catalog: Arc<dyn CatalogSource>,
    store: Arc<dyn ProgressStore>,
    clock: Arc<dyn Clock>,
    config: TrainerConfig,
    locks: LearnerLocks,
}

impl Trainer {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        store: Arc<dyn ProgressStore>,
        config: TrainerConfig,
    ) -> Self {
        tracing::debug!("trainer using {} progress store", store.name());
        Self {
            catalog,
            store,
            clock: Arc::new(SystemClock),
            config,
            locks: LearnerLocks::default(),
        }
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    async fn load_catalog(&self) -> Result<Catalog, TrainerError> {
        Ok(Catalog::new(self.catalog.list_cards().await?))
    }

    /// Build the practice queue for a new session.
    ///
    /// An empty plan means there is nothing to practice.
    pub async fn start_session(
        &self,
        learner: &Learner,
        request: &SessionRequest,
    ) -> Result<SessionPlan, TrainerError> {
        let now = self.clock.now();
        let size = if request.warmup {
            SessionSize::exact(self.config.session.warmup_size)?
        } else {
            SessionSize::untrusted(request.size, &self.config.session)
        };

        let catalog = self.load_catalog().await?;
        let states = self.store.get_card_states(&learner.user_id).await?;
        let plan = build_session(
            &catalog,
            &states,
            size,
            request.unit_id.as_deref(),
            self.config.session.new_card_cap,
            now,
        )?;

        if plan.is_empty() {
            tracing::info!("nothing to practice for {}", learner.user_id);
        } else {
            tracing::info!(
                "session for {}: {} cards ({} due, {} new, {} near-due)",
                learner.user_id,
                plan.cards.len(),
                plan.counts.due,
                plan.counts.new,
                plan.counts.near_due
            );
        }
        Ok(plan)
    }

    /// Grade one answer and persist its effects.
    pub async fn submit_answer(
        &self,
        learner: &Learner,
        submission: &AnswerSubmission,
    ) -> Result<AnswerResult, TrainerError> {
        let response_ms = u64::try_from(submission.response_ms).map_err(|_| {
            TrainerError::InvalidInput("response_ms must be a non-negative number".into())
        })?;
        let card_id = submission.card_id.trim();
        if card_id.is_empty() {
            return Err(TrainerError::InvalidInput("card_id is required".into()));
        }

        let catalog = self.load_catalog().await?;
        let card = catalog
            .get(card_id)
            .ok_or_else(|| TrainerError::NotFound(format!("card {card_id}")))?;

        let lock = self.locks.acquire(&learner.user_id);
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let today = now.date_naive();
        let prior = self.store.get_card_state(&learner.user_id, card_id).await?;
        let today_score = self.store.get_daily_score(&learner.user_id, today).await?;

        let outcome = grade_answer(
            card,
            &submission.choice,
            prior.as_ref(),
            today_score.as_ref(),
            &self.config.scoring,
            now,
        )?;

        let write = AnswerWrite {
            user_id: learner.user_id.clone(),
            state: outcome.card_state.clone(),
            expected_version: prior.as_ref().map(|p| p.version),
            date: today,
            points_delta: outcome.points_delta,
            review: Review {
                user_id: learner.user_id.clone(),
                card_id: card.id.clone(),
                reviewed_at: now,
                correct: outcome.result.correct,
                choice: outcome.choice,
                response_ms,
            },
        };

        let stored = match self.store.commit_answer(&write).await {
            Ok(score) => score,
            Err(e) => {
                let err = TrainerError::from(e);
                if let TrainerError::Conflict { .. } = err {
                    tracing::warn!("{err}; answer not recorded");
                }
                return Err(err);
            }
        };

        let mut result = outcome.result;
        result.daily_points = stored.points;
        result.answers_today = stored.answers_count;

        tracing::info!(
            "graded {} for {}: correct={} box={} points={}",
            card.id,
            learner.user_id,
            result.correct,
            result.new_box,
            result.points_awarded
        );
        Ok(result)
    }

    /// Progress summary for one learner.
    pub async fn dashboard(&self, learner: &Learner) -> Result<DashboardData, TrainerError> {
        let now = self.clock.now();
        let catalog = self.load_catalog().await?;
        let states = self.store.get_card_states(&learner.user_id).await?;
        let today = self
            .store
            .get_daily_score(&learner.user_id, now.date_naive())
            .await?;
        Ok(compute_dashboard(
            &catalog,
            &states,
            today.as_ref(),
            &self.config.mastery,
            now,
        ))
    }

    /// Ranking of everyone in the learner's room.
    pub async fn leaderboard(
        &self,
        room_id: &str,
        range: LeaderboardRange,
    ) -> Result<Leaderboard, TrainerError> {
        let today = self.clock.now().date_naive();
        let members = self.store.list_members(room_id).await?;

        let progress = try_join_all(members.iter().map(|member| async move {
            let scores = self.store.get_daily_scores(&member.user_id).await?;
            let states = self.store.get_card_states(&member.user_id).await?;
            Ok::<_, TrainerError>(MemberProgress::from_states(
                member.display_name.clone(),
                scores,
                states.values(),
            ))
        }))
        .await?;

        tracing::debug!("ranking {} members of room {room_id}", progress.len());
        Ok(Leaderboard {
            range,
            rows: rank_leaderboard(&progress, range, today),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = TrainerConfig::default();
        assert_eq!(config.scoring.daily_cap, 60);
        assert_eq!(config.session.min_size, 10);
        assert_eq!(config.session.max_size, 20);
        assert_eq!(config.session.new_card_cap, 5);
        assert_eq!(config.mastery.name(), "subtopic_coverage");
    }

    #[test]
    fn config_from_flat_toml() {
        let toml_str = r#"
daily_cap = 40
max_session_size = 25

[mastery]
model = "card_count"
threshold = 10
"#;
        let config: TrainerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scoring.daily_cap, 40);
        assert_eq!(config.scoring.review_points, 2);
        assert_eq!(config.session.max_size, 25);
        assert_eq!(config.mastery, MasteryModel::CardCount { threshold: 10 });
    }

    #[test]
    fn locks_are_shared_per_learner() {
        let locks = LearnerLocks::default();
        let a = locks.acquire("u1");
        let b = locks.acquire("u1");
        let c = locks.acquire("u2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
