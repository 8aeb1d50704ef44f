mod cli;
mod confidence;
mod db;
mod errors;
mod export;
mod ingest;
mod models;
mod services;
mod teams;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pickem")]
#[command(about = "An NFL confidence-pool pick tracker and predictor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    InitDb,
    /// Seed the 32 NFL teams
    SeedTeams,
    /// Import an expert-picks JSON file
    ImportPicks {
        /// Path to the picks file
        #[arg(short, long)]
        file: String,
    },
    /// Fetch live odds for a week's stored games
    FetchOdds {
        #[arg(short, long)]
        season: i32,
        #[arg(short, long)]
        week: i32,
    },
    /// Generate and rank picks for a week
    GeneratePicks {
        #[arg(short, long)]
        season: i32,
        #[arg(short, long)]
        week: i32,
        /// Prediction strategy: auto, consensus, model, or default
        #[arg(long, default_value = "auto")]
        strategy: String,
        /// Game ids already resolved (e.g. Thursday night), excluded from ranking
        #[arg(short, long)]
        exclude: Vec<i64>,
        /// Store the generated picks
        #[arg(long)]
        save: bool,
        #[arg(long, default_value = cli::DEFAULT_MODEL_PATH)]
        model: String,
    },
    /// Score a week's picks and pool entries against final scores
    ScoreWeek {
        #[arg(short, long)]
        season: i32,
        #[arg(short, long)]
        week: i32,
    },
    /// Export a week's picks as CSV or Markdown
    ExportPicks {
        #[arg(short, long)]
        season: i32,
        #[arg(short, long)]
        week: i32,
        #[arg(short, long, default_value = "markdown")]
        format: String,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Show pool standings for a week
    Standings {
        #[arg(short, long)]
        season: i32,
        #[arg(short, long)]
        week: i32,
    },
    /// Train the prediction model on resolved picks
    Train {
        #[arg(short, long)]
        season: i32,
        /// Weight multiplier for current-season examples
        #[arg(long, default_value = "3.0")]
        current_weight: f64,
        #[arg(long, default_value = cli::DEFAULT_MODEL_PATH)]
        model: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            tracing::info!("Initializing database...");
            cli::init_db().await?;
        }
        Commands::SeedTeams => {
            cli::seed().await?;
        }
        Commands::ImportPicks { file } => {
            cli::import_picks(&file).await?;
        }
        Commands::FetchOdds { season, week } => {
            cli::fetch_odds(season, week).await?;
        }
        Commands::GeneratePicks { season, week, strategy, exclude, save, model } => {
            cli::generate_picks(season, week, &strategy, &exclude, save, &model).await?;
        }
        Commands::ScoreWeek { season, week } => {
            cli::score_week(season, week).await?;
        }
        Commands::ExportPicks { season, week, format, output } => {
            cli::export_picks(season, week, &format, output.as_deref()).await?;
        }
        Commands::Standings { season, week } => {
            cli::standings(season, week).await?;
        }
        Commands::Train { season, current_weight, model } => {
            tracing::info!("Training model on resolved picks...");
            cli::train(season, current_weight, &model).await?;
        }
    }

    Ok(())
}
