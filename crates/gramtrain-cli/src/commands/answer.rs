//! The `gramtrain answer` command.

use std::path::PathBuf;

use anyhow::Result;

use gramtrain_core::model::AnswerResult;
use gramtrain_core::trainer::AnswerSubmission;

use super::{print_json, App};

pub async fn execute(
    user: String,
    card: String,
    choice: String,
    response_ms: i64,
    config_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let app = App::open(config_path.as_deref())?;
    let learner = app.learner(&user).await?;
    let submission = AnswerSubmission {
        card_id: card,
        choice,
        response_ms,
    };
    let result = app.trainer.submit_answer(&learner, &submission).await?;

    if json {
        return print_json(&result);
    }
    print_feedback(&result);
    Ok(())
}

pub fn print_feedback(result: &AnswerResult) {
    if result.correct {
        println!("Correct! +{} points", result.points_awarded);
    } else {
        println!("Incorrect. The answer is {}.", result.correct_choice);
    }
    if !result.explanation.is_empty() {
        println!("  {}", result.explanation);
    }
    println!(
        "  box {} · next review {} · today {} points from {} answers",
        result.new_box,
        result.due_date.format("%Y-%m-%d %H:%M UTC"),
        result.daily_points,
        result.answers_today
    );
}
