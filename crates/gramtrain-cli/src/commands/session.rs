//! The `gramtrain session` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use gramtrain_core::scheduler::SessionPlan;
use gramtrain_core::trainer::SessionRequest;

use super::{print_json, App};

pub async fn execute(
    user: String,
    size: Option<i64>,
    unit: Option<String>,
    warmup: bool,
    config_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let app = App::open(config_path.as_deref())?;
    let learner = app.learner(&user).await?;
    let request = SessionRequest {
        size,
        unit_id: unit,
        warmup,
    };
    let plan = app.trainer.start_session(&learner, &request).await?;

    if json {
        return print_json(&plan);
    }
    if plan.is_empty() {
        println!("Nothing to practice right now.");
        return Ok(());
    }
    print_plan(&plan);
    Ok(())
}

fn print_plan(plan: &SessionPlan) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Card", "Unit", "Source", "Box", "Prompt"]);

    for (i, card) in plan.cards.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&card.id),
            Cell::new(&card.unit_id),
            Cell::new(card.source),
            Cell::new(card.current_box.map_or("-".to_string(), |b| b.to_string())),
            Cell::new(&card.prompt),
        ]);
    }

    println!("{table}");
    println!(
        "{} cards: {} due, {} new, {} near-due",
        plan.cards.len(),
        plan.counts.due,
        plan.counts.new,
        plan.counts.near_due
    );
}
