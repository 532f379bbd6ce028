//! The `gramtrain join` command.

use std::path::PathBuf;

use anyhow::Result;

use gramtrain_store::Roster;

use super::{open_store, print_json};

pub async fn execute(
    room: String,
    name: String,
    config_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let config = gramtrain_store::load_config_from(config_path.as_deref())?;
    let store = open_store(&config)?;
    let learner = store.register_learner(&room, &name).await?;

    if json {
        return print_json(&learner);
    }
    println!("Joined as {}", learner.display_name);
    println!("User id: {}", learner.user_id);
    Ok(())
}
