//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use gramtrain_core::catalog::load_catalog;
use gramtrain_core::model::Learner;
use gramtrain_core::trainer::Trainer;
use gramtrain_store::{load_config_from, GramtrainConfig, Roster, SqliteStore};

pub mod answer;
pub mod dashboard;
pub mod init;
pub mod join;
pub mod leaderboard;
pub mod practice;
pub mod session;
pub mod validate;

/// Everything a learner-facing command needs.
pub struct App {
    pub store: Arc<SqliteStore>,
    pub trainer: Trainer,
}

impl App {
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config_from(config_path)?;
        let store = Arc::new(open_store(&config)?);
        let catalog = load_catalog(&config.catalog)
            .with_context(|| format!("failed to load catalog: {}", config.catalog.display()))?;
        tracing::debug!("catalog has {} cards", catalog.len());
        let trainer = Trainer::new(Arc::new(catalog), store.clone(), config.trainer.clone());
        Ok(Self { store, trainer })
    }

    /// Look up a learner registered with `join`.
    pub async fn learner(&self, user_id: &str) -> Result<Learner> {
        self.store
            .find_learner(user_id)
            .await?
            .with_context(|| format!("unknown learner {user_id}; run `gramtrain join` first"))
    }
}

pub fn open_store(config: &GramtrainConfig) -> Result<SqliteStore> {
    SqliteStore::open(&config.database)
        .with_context(|| format!("failed to open database: {}", config.database.display()))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
