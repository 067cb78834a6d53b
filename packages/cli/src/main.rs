//! Demo harness for the scoring engine and apply orchestrator.
//!
//! Not a production service surface — no persistence beyond the in-memory
//! stores, intended for trying the pipeline against real rule tables and
//! job records from a shell.

mod queue;
mod score;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "jobscore")]
#[command(about = "Score job postings and drive the apply queue from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one job record against a rule table and print the result
    Score {
        /// Path to the rule table JSON document
        #[arg(long)]
        rules: String,

        /// Path to a JobRecord JSON document
        #[arg(long)]
        job: String,

        /// Also run the decision explainer and print its verdict
        #[arg(long)]
        decide: bool,
    },

    /// Enqueue a demo apply task against an in-memory queue and print its id
    Enqueue {
        #[arg(long)]
        user_id: String,

        #[arg(long)]
        job_id: String,

        #[arg(long, default_value = "500.0")]
        score: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Score { rules, job, decide } => score::run(&rules, &job, decide),
        Commands::Enqueue { user_id, job_id, score } => queue::run(&user_id, &job_id, score).await,
    }
}
