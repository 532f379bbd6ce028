//! The `gramtrain validate` command.

use std::path::PathBuf;

use anyhow::Result;

use gramtrain_core::catalog::{load_dataset, validate_dataset};

pub fn execute(catalog: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let path = match catalog {
        Some(path) => path,
        None => gramtrain_store::load_config_from(config_path.as_deref())?.catalog,
    };

    let cards = load_dataset(&path)?;
    println!("Dataset: {} ({} cards)", path.display(), cards.len());

    let warnings = validate_dataset(&cards);
    for w in &warnings {
        println!("  [#{} {}] WARNING: {}", w.index, w.card_id, w.message);
    }

    if warnings.is_empty() {
        println!("All cards valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
