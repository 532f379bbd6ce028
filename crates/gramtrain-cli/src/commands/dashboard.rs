//! The `gramtrain dashboard` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::{print_json, App};

pub async fn execute(user: String, config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let app = App::open(config_path.as_deref())?;
    let learner = app.learner(&user).await?;
    let data = app.trainer.dashboard(&learner).await?;

    if json {
        return print_json(&data);
    }

    println!("{}", learner.display_name);
    println!(
        "Due now: {} · Today: {} points, {} answers",
        data.due_count, data.daily_points, data.answers_today
    );

    let mut table = Table::new();
    table.set_header(vec!["Unit", "Seen", "Mastered", "Progress", "Complete"]);
    for unit in &data.unit_mastery {
        table.add_row(vec![
            Cell::new(&unit.unit_id),
            Cell::new(format!("{}/{}", unit.seen_cards, unit.total_cards)),
            Cell::new(unit.mastered_cards),
            Cell::new(format!("{:.0}%", unit.mastery_ratio * 100.0)),
            Cell::new(if unit.completed { "yes" } else { "" }),
        ]);
    }
    println!("{table}");
    println!("Mastery model: {}", data.mastery_model);
    Ok(())
}
