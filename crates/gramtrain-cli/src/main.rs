//! gramtrain CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "gramtrain",
    version,
    about = "Grammar flashcards with Leitner review and room leaderboards"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print plain JSON records instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and an example card dataset
    Init,

    /// Validate card dataset files
    Validate {
        /// Dataset file or directory (defaults to the configured catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Join a room, creating it on first use
    Join {
        /// Room code shared by the class
        #[arg(long)]
        room: String,

        /// Display name, unique within the room
        #[arg(long)]
        name: String,
    },

    /// Build a practice session
    Session {
        /// Learner id printed by `join`
        #[arg(long)]
        user: String,

        /// Number of cards (clamped to the configured bounds)
        #[arg(long)]
        size: Option<i64>,

        /// Restrict to one unit
        #[arg(long)]
        unit: Option<String>,

        /// Short onboarding session
        #[arg(long)]
        warmup: bool,
    },

    /// Grade one answer
    Answer {
        #[arg(long)]
        user: String,

        #[arg(long)]
        card: String,

        /// Option key: A, B, C or D
        #[arg(long)]
        choice: String,

        /// Time taken to answer, in milliseconds
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        response_ms: i64,
    },

    /// Run an interactive session on the terminal
    Practice {
        #[arg(long)]
        user: String,

        #[arg(long)]
        size: Option<i64>,

        #[arg(long)]
        unit: Option<String>,

        #[arg(long)]
        warmup: bool,
    },

    /// Show a learner's progress
    Dashboard {
        #[arg(long)]
        user: String,
    },

    /// Rank the learner's room
    Leaderboard {
        #[arg(long)]
        user: String,

        /// today, week or all
        #[arg(long, default_value = "today")]
        range: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "gramtrain=info"
                    .parse()
                    .unwrap_or_else(|_| LevelFilter::INFO.into()),
            ),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;
    let json = cli.json;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { catalog } => commands::validate::execute(catalog, config),
        Commands::Join { room, name } => commands::join::execute(room, name, config, json).await,
        Commands::Session {
            user,
            size,
            unit,
            warmup,
        } => commands::session::execute(user, size, unit, warmup, config, json).await,
        Commands::Answer {
            user,
            card,
            choice,
            response_ms,
        } => commands::answer::execute(user, card, choice, response_ms, config, json).await,
        Commands::Practice {
            user,
            size,
            unit,
            warmup,
        } => commands::practice::execute(user, size, unit, warmup, config).await,
        Commands::Dashboard { user } => commands::dashboard::execute(user, config, json).await,
        Commands::Leaderboard { user, range } => {
            commands::leaderboard::execute(user, range, config, json).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
