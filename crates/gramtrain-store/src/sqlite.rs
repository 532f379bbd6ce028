//! SQLite-backed progress store.
//!
//! One connection behind a mutex; every call runs on the blocking pool.
//! `commit_answer` runs in a single transaction, and card-state writes are
//! guarded by the stored `version` column.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use uuid::Uuid;

use gramtrain_core::model::{CardState, ChoiceKey, DailyScore, Learner, Review};
use gramtrain_core::traits::{AnswerWrite, ProgressStore};
use gramtrain_core::StoreError;

use crate::error::{sqlite_error, RosterError};
use crate::roster::{
    display_name_key, normalize_display_name, normalize_room_code, room_code_hash, Roster,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS rooms (
    id TEXT PRIMARY KEY,
    room_code_hash TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    room_id TEXT NOT NULL,
    display_name TEXT NOT NULL,
    name_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (room_id, name_key),
    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS user_card_state (
    user_id TEXT NOT NULL,
    card_id TEXT NOT NULL,
    box INTEGER NOT NULL CHECK (box BETWEEN 1 AND 4),
    due_date TEXT NOT NULL,
    correct_streak INTEGER NOT NULL DEFAULT 0,
    total_attempts INTEGER NOT NULL DEFAULT 0,
    last_seen_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, card_id)
);

CREATE TABLE IF NOT EXISTS daily_scores (
    user_id TEXT NOT NULL,
    date TEXT NOT NULL,
    points INTEGER NOT NULL DEFAULT 0,
    answers_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, date)
);

CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    card_id TEXT NOT NULL,
    reviewed_at TEXT NOT NULL,
    correct INTEGER NOT NULL,
    choice TEXT NOT NULL,
    response_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_room ON users(room_id);
CREATE INDEX IF NOT EXISTS idx_card_state_due ON user_card_state(user_id, due_date);
CREATE INDEX IF NOT EXISTS idx_reviews_user ON reviews(user_id, reviewed_at);
"#;

const DATE_FORMAT: &str = "%Y-%m-%d";

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("bad date {raw:?}: {e}")))
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {raw:?}: {e}")))
}

/// A card-state row as stored.
struct StateRow {
    card_id: String,
    box_level: u8,
    due_date: String,
    correct_streak: u32,
    total_attempts: u32,
    last_seen_at: String,
    version: u64,
}

impl StateRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            card_id: row.get(0)?,
            box_level: row.get(1)?,
            due_date: row.get(2)?,
            correct_streak: row.get(3)?,
            total_attempts: row.get(4)?,
            last_seen_at: row.get(5)?,
            version: row.get(6)?,
        })
    }

    fn into_state(self) -> Result<CardState, StoreError> {
        Ok(CardState {
            due_date: parse_instant(&self.due_date)?,
            last_seen_at: parse_instant(&self.last_seen_at)?,
            card_id: self.card_id,
            box_level: self.box_level,
            correct_streak: self.correct_streak,
            total_attempts: self.total_attempts,
            version: self.version,
        })
    }
}

const STATE_COLUMNS: &str =
    "card_id, box, due_date, correct_streak, total_attempts, last_seen_at, version";

fn score_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, u32, u32)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_score((date, points, answers_count): (String, u32, u32)) -> Result<DailyScore, StoreError> {
    Ok(DailyScore {
        date: parse_date(&date)?,
        points,
        answers_count,
    })
}

fn learner_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Learner> {
    Ok(Learner {
        user_id: row.get(0)?,
        room_id: row.get(1)?,
        display_name: row.get(2)?,
    })
}

/// Write a card state if the stored version still matches.
fn write_state(
    tx: &Transaction<'_>,
    user_id: &str,
    state: &CardState,
    expected_version: Option<u64>,
) -> Result<(), StoreError> {
    let due = state.due_date.to_rfc3339();
    let seen = state.last_seen_at.to_rfc3339();
    let changed = match expected_version {
        None => tx.execute(
            "INSERT INTO user_card_state
                 (user_id, card_id, box, due_date, correct_streak, total_attempts, last_seen_at, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (user_id, card_id) DO NOTHING",
            params![
                user_id,
                state.card_id,
                state.box_level,
                due,
                state.correct_streak,
                state.total_attempts,
                seen,
                state.version
            ],
        ),
        Some(expected) => tx.execute(
            "UPDATE user_card_state
             SET box = ?3, due_date = ?4, correct_streak = ?5, total_attempts = ?6,
                 last_seen_at = ?7, version = ?8
             WHERE user_id = ?1 AND card_id = ?2 AND version = ?9",
            params![
                user_id,
                state.card_id,
                state.box_level,
                due,
                state.correct_streak,
                state.total_attempts,
                seen,
                state.version,
                expected
            ],
        ),
    }
    .map_err(sqlite_error)?;

    if changed == 0 {
        return Err(StoreError::VersionConflict {
            user_id: user_id.to_string(),
            card_id: state.card_id.clone(),
        });
    }
    Ok(())
}

fn add_score(
    tx: &Transaction<'_>,
    user_id: &str,
    date: NaiveDate,
    points: u32,
    answers: u32,
) -> Result<DailyScore, StoreError> {
    let date = format_date(date);
    tx.execute(
        "INSERT INTO daily_scores (user_id, date, points, answers_count)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (user_id, date) DO UPDATE SET
             points = points + excluded.points,
             answers_count = answers_count + excluded.answers_count",
        params![user_id, date, points, answers],
    )
    .map_err(sqlite_error)?;
    let row = tx
        .query_row(
            "SELECT date, points, answers_count FROM daily_scores WHERE user_id = ?1 AND date = ?2",
            params![user_id, date],
            score_row,
        )
        .map_err(sqlite_error)?;
    into_score(row)
}

fn insert_review(tx: &Transaction<'_>, review: &Review) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO reviews (user_id, card_id, reviewed_at, correct, choice, response_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            review.user_id,
            review.card_id,
            review.reviewed_at.to_rfc3339(),
            review.correct,
            review.choice.to_string(),
            review.response_ms
        ],
    )
    .map_err(sqlite_error)?;
    Ok(())
}

/// A `ProgressStore` and `Roster` persisted in one SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path).map_err(sqlite_error)?;
        tracing::debug!("opened sqlite store at {}", path.display());
        Self::init(conn)
    }

    /// A private database that lives as long as the store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().map_err(sqlite_error)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(sqlite_error)?;
        conn.execute_batch(SCHEMA).map_err(sqlite_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".into()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
    }

    /// Run `f` inside a transaction that commits only if `f` succeeds.
    async fn in_transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError> + Send + 'static,
    {
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(sqlite_error)?;
            let value = f(&tx)?;
            tx.commit().map_err(sqlite_error)?;
            Ok(value)
        })
        .await
    }

    /// Number of reviews logged for a user.
    pub async fn review_count(&self, user_id: &str) -> Result<u64, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM reviews WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .map_err(sqlite_error)
        })
        .await
    }

    /// The most recent reviews of a user, newest first.
    pub async fn recent_reviews(&self, user_id: &str, limit: usize) -> Result<Vec<Review>, StoreError> {
        let owner = user_id.to_string();
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT card_id, reviewed_at, correct, choice, response_ms FROM reviews
                         WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
                    )
                    .map_err(sqlite_error)?;
                let rows = stmt
                    .query_map(params![owner, limit], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, bool>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, u64>(4)?,
                        ))
                    })
                    .map_err(sqlite_error)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(sqlite_error)?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(card_id, reviewed_at, correct, choice, response_ms)| {
                Ok(Review {
                    user_id: user_id.to_string(),
                    card_id,
                    reviewed_at: parse_instant(&reviewed_at)?,
                    correct,
                    choice: choice.parse::<ChoiceKey>().map_err(StoreError::Corrupt)?,
                    response_ms,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ProgressStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_card_states(&self, user_id: &str) -> Result<HashMap<String, CardState>, StoreError> {
        let user_id = user_id.to_string();
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {STATE_COLUMNS} FROM user_card_state WHERE user_id = ?1"
                    ))
                    .map_err(sqlite_error)?;
                let rows = stmt
                    .query_map(params![user_id], StateRow::from_row)
                    .map_err(sqlite_error)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(sqlite_error)?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|row| {
                let state = row.into_state()?;
                Ok((state.card_id.clone(), state))
            })
            .collect()
    }

    async fn get_card_state(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Option<CardState>, StoreError> {
        let (user_id, card_id) = (user_id.to_string(), card_id.to_string());
        let row = self
            .with_conn(move |conn| {
                conn.query_row(
                    &format!(
                        "SELECT {STATE_COLUMNS} FROM user_card_state
                         WHERE user_id = ?1 AND card_id = ?2"
                    ),
                    params![user_id, card_id],
                    StateRow::from_row,
                )
                .optional()
                .map_err(sqlite_error)
            })
            .await?;
        row.map(StateRow::into_state).transpose()
    }

    async fn get_daily_score(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyScore>, StoreError> {
        let user_id = user_id.to_string();
        let row = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT date, points, answers_count FROM daily_scores
                     WHERE user_id = ?1 AND date = ?2",
                    params![user_id, format_date(date)],
                    score_row,
                )
                .optional()
                .map_err(sqlite_error)
            })
            .await?;
        row.map(into_score).transpose()
    }

    async fn get_daily_scores(&self, user_id: &str) -> Result<Vec<DailyScore>, StoreError> {
        let user_id = user_id.to_string();
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT date, points, answers_count FROM daily_scores
                         WHERE user_id = ?1 ORDER BY date",
                    )
                    .map_err(sqlite_error)?;
                let rows = stmt
                    .query_map(params![user_id], score_row)
                    .map_err(sqlite_error)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(sqlite_error)?;
                Ok(rows)
            })
            .await?;
        rows.into_iter().map(into_score).collect()
    }

    async fn upsert_card_state(
        &self,
        user_id: &str,
        state: &CardState,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError> {
        let (user_id, state) = (user_id.to_string(), state.clone());
        self.in_transaction(move |tx| write_state(tx, &user_id, &state, expected_version))
            .await
    }

    async fn upsert_daily_score(
        &self,
        user_id: &str,
        date: NaiveDate,
        points_delta: u32,
        answers_delta: u32,
    ) -> Result<DailyScore, StoreError> {
        let user_id = user_id.to_string();
        self.in_transaction(move |tx| add_score(tx, &user_id, date, points_delta, answers_delta))
            .await
    }

    async fn append_review(&self, review: &Review) -> Result<(), StoreError> {
        let review = review.clone();
        self.in_transaction(move |tx| insert_review(tx, &review)).await
    }

    async fn list_members(&self, room_id: &str) -> Result<Vec<Learner>, StoreError> {
        let room_id = room_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, room_id, display_name FROM users
                     WHERE room_id = ?1 ORDER BY display_name",
                )
                .map_err(sqlite_error)?;
            let members = stmt
                .query_map(params![room_id], learner_row)
                .map_err(sqlite_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(sqlite_error)?;
            Ok(members)
        })
        .await
    }

    async fn commit_answer(&self, write: &AnswerWrite) -> Result<DailyScore, StoreError> {
        let write = write.clone();
        self.in_transaction(move |tx| {
            write_state(tx, &write.user_id, &write.state, write.expected_version)?;
            let score = add_score(tx, &write.user_id, write.date, write.points_delta, 1)?;
            insert_review(tx, &write.review)?;
            Ok(score)
        })
        .await
    }
}

#[async_trait]
impl Roster for SqliteStore {
    async fn register_learner(
        &self,
        room_code: &str,
        display_name: &str,
    ) -> Result<Learner, RosterError> {
        let code = normalize_room_code(room_code)?;
        let name = normalize_display_name(display_name)?;
        let hash = room_code_hash(&code);

        let learner = self
            .in_transaction(move |tx| {
                tx.execute(
                    "INSERT INTO rooms (id, room_code_hash) VALUES (?1, ?2)
                     ON CONFLICT (room_code_hash) DO NOTHING",
                    params![Uuid::new_v4().to_string(), hash],
                )
                .map_err(sqlite_error)?;
                let room_id: String = tx
                    .query_row(
                        "SELECT id FROM rooms WHERE room_code_hash = ?1",
                        params![hash],
                        |row| row.get(0),
                    )
                    .map_err(sqlite_error)?;

                let key = display_name_key(&name);
                tx.execute(
                    "INSERT INTO users (id, room_id, display_name, name_key) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (room_id, name_key) DO NOTHING",
                    params![Uuid::new_v4().to_string(), room_id, name, key],
                )
                .map_err(sqlite_error)?;
                tx.query_row(
                    "SELECT id, room_id, display_name FROM users
                     WHERE room_id = ?1 AND name_key = ?2",
                    params![room_id, key],
                    learner_row,
                )
                .map_err(sqlite_error)
            })
            .await?;

        tracing::debug!("learner {} joined room {}", learner.user_id, learner.room_id);
        Ok(learner)
    }

    async fn find_learner(&self, user_id: &str) -> Result<Option<Learner>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, room_id, display_name FROM users WHERE id = ?1",
                params![user_id],
                learner_row,
            )
            .optional()
            .map_err(sqlite_error)
        })
        .await
    }
}
