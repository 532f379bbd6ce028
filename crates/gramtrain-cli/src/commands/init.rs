//! The `gramtrain init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("gramtrain.toml").exists() {
        println!("gramtrain.toml already exists, skipping.");
    } else {
        std::fs::write("gramtrain.toml", gramtrain_store::config::default_config_toml())?;
        println!("Created gramtrain.toml");
    }

    std::fs::create_dir_all("cards")?;
    let example_path = std::path::Path::new("cards/example.json");
    if example_path.exists() {
        println!("cards/example.json already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_DATASET)?;
        println!("Created cards/example.json");
    }

    println!("\nNext steps:");
    println!("  1. Run: gramtrain validate");
    println!("  2. Run: gramtrain join --room <CODE> --name <NAME>");
    println!("  3. Run: gramtrain practice --user <ID> --warmup");

    Ok(())
}

const EXAMPLE_DATASET: &str = r#"[
  {
    "unit": "present-perfect",
    "subtopic": "for-since",
    "prompt": "She has lived here ___ 2019.",
    "choices": { "A": "for", "B": "since", "C": "from", "D": "during" },
    "correct_answer": "B",
    "explanation": "Use 'since' with a starting point in time.",
    "difficulty": 1,
    "card_type": "best_choice"
  },
  {
    "unit": "present-perfect",
    "subtopic": "for-since",
    "prompt": "We have waited ___ two hours.",
    "choices": { "A": "since", "B": "during", "C": "for", "D": "ago" },
    "correct_answer": "C",
    "explanation": "Use 'for' with a length of time.",
    "difficulty": 1,
    "card_type": "best_choice"
  },
  {
    "unit": "present-perfect",
    "subtopic": "already-yet",
    "prompt": "Have you finished your homework ___?",
    "choices": { "A": "already", "B": "still", "C": "yet", "D": "just" },
    "correct_answer": "C",
    "explanation": "'Yet' goes at the end of questions and negatives.",
    "difficulty": 2,
    "card_type": "best_choice"
  },
  {
    "unit": "articles",
    "subtopic": "a-an",
    "prompt": "He is ___ honest man.",
    "choices": { "A": "a", "B": "an", "C": "the", "D": "no article" },
    "correct_answer": "B",
    "explanation": "'Honest' starts with a vowel sound.",
    "difficulty": 1,
    "card_type": "best_choice"
  },
  {
    "unit": "articles",
    "subtopic": "zero-article",
    "prompt": "Which sentence contains an error?",
    "choices": {
      "A": "I love music.",
      "B": "The music at the party was loud.",
      "C": "She plays the piano.",
      "D": "The life is beautiful."
    },
    "correct_answer": "D",
    "explanation": "Abstract nouns used in general take no article.",
    "difficulty": 2,
    "card_type": "error_id"
  }
]
"#;
