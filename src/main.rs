//! mdo command-line entry point

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mdo::{Config, EntityKind, ImportMode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

/// mdo: Medical-Device Service Ontology
#[derive(Parser, Debug)]
#[command(name = "mdo")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import entities and relationships from a JSON payload
    Import {
        /// Path to the payload file
        input: PathBuf,
        /// Import mode (merge or replace); defaults to the configured mode
        #[arg(short, long)]
        mode: Option<ImportMode>,
        /// Run every check without committing
        #[arg(long)]
        validate_only: bool,
    },
    /// Show how an import would change the ontology, without committing
    Diff {
        /// Path to the payload file
        input: PathBuf,
        /// Import mode (merge or replace); defaults to the configured mode
        #[arg(short, long)]
        mode: Option<ImportMode>,
    },
    /// Load extracted candidate records
    Load {
        /// Path to a JSON array of candidate records
        input: PathBuf,
    },
    /// Export the ontology as JSON-LD
    Export {
        /// Output file path
        output: PathBuf,
        /// Only export these entity kinds (repeatable)
        #[arg(short, long = "kind")]
        kinds: Vec<EntityKind>,
        /// Leave relationship nodes out
        #[arg(long)]
        no_relationships: bool,
    },
    /// Show ontology statistics
    Stats,
    /// Run consistency checks
    Validate,
    /// List entities with near-identical labels
    Duplicates {
        /// Jaro-Winkler similarity threshold; defaults to the configured value
        #[arg(short, long)]
        threshold: Option<f32>,
    },
    /// Suggest containment relationships implied by existing ones
    Suggest,
    /// Remove every entity and relationship
    Clear,
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = if let Some(path) = &args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    match args.command {
        Command::Import {
            input,
            mode,
            validate_only,
        } => cli::run_import(config, input, mode, validate_only, args.json).await,
        Command::Diff { input, mode } => cli::run_diff(config, input, mode, args.json).await,
        Command::Load { input } => cli::run_load(config, input, args.json).await,
        Command::Export {
            output,
            kinds,
            no_relationships,
        } => cli::run_export(config, output, kinds, no_relationships, args.json).await,
        Command::Stats => cli::run_stats(config, args.json).await,
        Command::Validate => cli::run_validate(config, args.json).await,
        Command::Duplicates { threshold } => cli::run_duplicates(config, threshold, args.json).await,
        Command::Suggest => cli::run_suggest(config, args.json).await,
        Command::Clear => cli::run_clear(config, args.json).await,
    }
}
