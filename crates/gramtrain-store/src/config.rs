//! Application configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use gramtrain_core::trainer::TrainerConfig;

/// Top-level gramtrain configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GramtrainConfig {
    /// SQLite database file.
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Card dataset: a JSON file or a directory of them.
    #[serde(default = "default_catalog")]
    pub catalog: PathBuf,
    #[serde(default)]
    pub trainer: TrainerConfig,
}

fn default_database() -> PathBuf {
    PathBuf::from("gramtrain.db")
}
fn default_catalog() -> PathBuf {
    PathBuf::from("cards")
}

impl Default for GramtrainConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            catalog: default_catalog(),
            trainer: TrainerConfig::default(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `gramtrain.toml` in the current directory
/// 2. `~/.config/gramtrain/config.toml`
///
/// Environment variable overrides: `GRAMTRAIN_DATABASE`, `GRAMTRAIN_CATALOG`.
pub fn load_config() -> Result<GramtrainConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<GramtrainConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("gramtrain.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!("loaded config from {}", path.display());
            config
        }
        None => GramtrainConfig::default(),
    };

    if let Ok(database) = std::env::var("GRAMTRAIN_DATABASE") {
        config.database = PathBuf::from(database);
    }
    if let Ok(catalog) = std::env::var("GRAMTRAIN_CATALOG") {
        config.catalog = PathBuf::from(catalog);
    }

    config.database = resolve_path(&config.database);
    config.catalog = resolve_path(&config.catalog);
    validate(&config)?;
    Ok(config)
}

/// Parse a config document without touching the environment.
pub fn parse_config(content: &str) -> Result<GramtrainConfig> {
    Ok(toml::from_str(content)?)
}

fn validate(config: &GramtrainConfig) -> Result<()> {
    let limits = &config.trainer.session;
    if limits.min_size == 0 || limits.min_size > limits.max_size {
        anyhow::bail!(
            "invalid session bounds: min_session_size {} / max_session_size {}",
            limits.min_size,
            limits.max_size
        );
    }
    if limits.warmup_size == 0 {
        anyhow::bail!("warmup_size must be at least 1");
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("gramtrain"))
}

/// The starter config written by `gramtrain init`.
pub fn default_config_toml() -> String {
    r#"# gramtrain configuration
database = "gramtrain.db"
catalog = "cards"

[trainer]
daily_cap = 60
new_card_cap = 5
min_session_size = 10
max_session_size = 20
warmup_size = 5

[trainer.mastery]
model = "subtopic_coverage"
min_per_subtopic = 3
completion_fraction = 0.8
"#
    .to_string()
}
