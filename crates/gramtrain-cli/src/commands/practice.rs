//! The `gramtrain practice` command: an interactive session on stdin.

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use gramtrain_core::model::SessionCard;
use gramtrain_core::queue::PracticeQueue;
use gramtrain_core::trainer::{AnswerSubmission, SessionRequest};
use gramtrain_core::TrainerError;

use super::answer::print_feedback;
use super::App;

pub async fn execute(
    user: String,
    size: Option<i64>,
    unit: Option<String>,
    warmup: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let app = App::open(config_path.as_deref())?;
    let learner = app.learner(&user).await?;
    let request = SessionRequest {
        size,
        unit_id: unit,
        warmup,
    };
    let plan = app.trainer.start_session(&learner, &request).await?;
    if plan.is_empty() {
        println!("Nothing to practice right now.");
        return Ok(());
    }

    println!(
        "{} cards ({} due, {} new, {} near-due). Answer A-D, q to stop.",
        plan.cards.len(),
        plan.counts.due,
        plan.counts.new,
        plan.counts.near_due
    );

    let mut queue = PracticeQueue::new(plan.cards);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(card) = queue.current().cloned() {
        show_card(&card, queue.remaining())?;
        let asked = Instant::now();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            break;
        }

        let submission = AnswerSubmission {
            card_id: card.id.clone(),
            choice: line.to_string(),
            response_ms: i64::try_from(asked.elapsed().as_millis()).unwrap_or(i64::MAX),
        };
        match app.trainer.submit_answer(&learner, &submission).await {
            Ok(result) => {
                print_feedback(&result);
                queue.record(&result)?;
            }
            Err(TrainerError::InvalidInput(msg)) => println!("{msg}. Try again."),
            Err(e) => return Err(e.into()),
        }
    }

    let progress = queue.progress();
    println!(
        "\nSession over: {}/{} cards cleared, {} of {} answers correct, {} points.",
        progress.retired, progress.total, progress.correct, progress.attempts, progress.points
    );
    Ok(())
}

fn show_card(card: &SessionCard, remaining: usize) -> Result<()> {
    println!("\n[{}] {} ({} left)", card.unit_id, card.prompt, remaining);
    for (key, text) in &card.choices {
        println!("  {key}) {text}");
    }
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}
