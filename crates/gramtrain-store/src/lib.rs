//! gramtrain-store: Progress stores, roster and configuration.
//!
//! Implements the `ProgressStore` trait in memory and on SQLite, registers
//! learners into rooms, and loads `gramtrain.toml`.

pub mod config;
pub mod error;
pub mod memory;
pub mod roster;
pub mod sqlite;

pub use config::{load_config, load_config_from, GramtrainConfig};
pub use error::RosterError;
pub use memory::MemoryStore;
pub use roster::Roster;
pub use sqlite::SqliteStore;
