//! gellyfish CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "gellyfish", version, about = "Gelly tutorial toolkit for gelly.fish")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Environment from the config (default: the configured default)
    #[arg(long, global = true)]
    env: Option<String>,

    /// Use an empty in-memory backend instead of the hosted API
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and an example challenge
    Init,

    /// Check .gelly challenge files for authoring mistakes
    Validate {
        /// A .gelly file or a directory of them
        #[arg(long, default_value = "challenges")]
        path: PathBuf,
    },

    /// Grade a saved query result against a challenge, without a backend
    Grade {
        /// Challenge .gelly file holding the solution and expected output
        #[arg(long, conflicts_with = "expected")]
        challenge: Option<PathBuf>,

        /// Expected output text, as JSON or `key: value` pairs
        #[arg(long)]
        expected: Option<String>,

        /// JSON file with the query result
        #[arg(long)]
        result: PathBuf,

        /// File with the submitted query
        #[arg(long)]
        query: Option<PathBuf>,

        /// Print the grade as JSON
        #[arg(long)]
        json: bool,

        /// Exit code 1 if the result does not pass
        #[arg(long)]
        fail_on_mismatch: bool,
    },

    /// Run a query for a challenge against the backend and record progress
    Run {
        /// Challenge number
        #[arg(long)]
        challenge: u32,

        /// File with the Gelly query
        #[arg(long)]
        query: PathBuf,

        /// Signed-in user id; progress is kept locally without one
        #[arg(long)]
        user: Option<String>,
    },

    /// Inspect and manage challenge progress
    Progress {
        #[command(subcommand)]
        action: ProgressAction,
    },

    /// Show the fields of backend models
    Schema {
        /// Model api identifiers, e.g. jellyfish food
        #[arg(required = true)]
        models: Vec<String>,

        /// Print the schemas as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create challenges from a directory of .gelly files
    Seed {
        /// Directory of .gelly files
        #[arg(long, default_value = "challenges")]
        dir: PathBuf,

        /// Also write the report to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Copy all records from one environment to another
    CopyData {
        /// Source environment
        #[arg(long, default_value = "development")]
        from: String,

        /// Target environment
        #[arg(long, default_value = "production")]
        to: String,

        /// Also write the report to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Give every jellyfish one to three random non-plant foods
    AssignFoods {
        /// Seed for a reproducible assignment
        #[arg(long)]
        seed: Option<u64>,

        /// Also write the report to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ProgressAction {
    /// List completed challenge ids
    List {
        #[arg(long)]
        user: Option<String>,
    },

    /// Mark a challenge as completed
    Complete {
        /// Challenge record id
        challenge_id: String,

        /// File with the solving query (required with --user)
        #[arg(long)]
        solution: Option<PathBuf>,

        #[arg(long)]
        user: Option<String>,
    },

    /// Print the recorded solution of a challenge
    Solution {
        /// Challenge record id
        challenge_id: String,

        #[arg(long)]
        user: Option<String>,
    },

    /// Push local progress to a user's account and clear it locally
    Sync {
        #[arg(long)]
        user: String,
    },

    /// Delete local progress
    Clear,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gellyfish=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context {
        config_path: cli.config,
        env: cli.env,
        offline: cli.offline,
    };

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { path } => commands::validate::execute(path),
        Commands::Grade {
            challenge,
            expected,
            result,
            query,
            json,
            fail_on_mismatch,
        } => commands::grade::execute(challenge, expected, result, query, json, fail_on_mismatch),
        Commands::Run {
            challenge,
            query,
            user,
        } => commands::run::execute(&ctx, challenge, query, user).await,
        Commands::Progress { action } => commands::progress::execute(&ctx, action).await,
        Commands::Schema { models, json } => commands::schema::execute(&ctx, models, json).await,
        Commands::Seed { dir, output } => commands::seed::execute(&ctx, dir, output).await,
        Commands::CopyData { from, to, output } => {
            commands::copy_data::execute(&ctx, from, to, output).await
        }
        Commands::AssignFoods { seed, output } => {
            commands::assign_foods::execute(&ctx, seed, output).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
