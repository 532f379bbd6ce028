//! The `gramtrain leaderboard` command.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use comfy_table::{Cell, Table};

use gramtrain_core::leaderboard::LeaderboardRange;

use super::{print_json, App};

pub async fn execute(
    user: String,
    range: String,
    config_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let range: LeaderboardRange = range.parse().map_err(|e: String| anyhow!(e))?;
    let app = App::open(config_path.as_deref())?;
    let learner = app.learner(&user).await?;
    let board = app.trainer.leaderboard(&learner.room_id, range).await?;

    if json {
        return print_json(&board);
    }

    let mut table = Table::new();
    table.set_header(vec!["Rank", "Name", "Points", "Mastered", "Streak"]);
    for (i, row) in board.rows.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&row.display_name),
            Cell::new(row.points),
            Cell::new(row.mastered),
            Cell::new(format!("{}d", row.streak)),
        ]);
    }
    println!("Leaderboard ({})", board.range);
    println!("{table}");
    Ok(())
}
