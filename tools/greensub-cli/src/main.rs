//! GreenSub CLI: burn subtitles onto a chroma-key background.
//!
//! Usage:
//!   greensub preview <SOURCE> --at <SECS> -o <PNG>   Render one frame
//!   greensub render <SOURCE> -o <OUT>                Render the whole clip
//!   greensub plan <SOURCE>                           Print the engine command
//!   greensub check                                   Check engine availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod args;
mod commands;

use args::JobArgs;

#[derive(Parser)]
#[command(
    name = "greensub",
    about = "Subtitle burn-in on green screen for video editors",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/greensub/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a single preview frame to a PNG file
    Preview {
        /// Source video
        source: PathBuf,

        /// Timestamp in seconds
        #[arg(long, default_value = "0")]
        at: f64,

        /// Output image path
        #[arg(short, long, default_value = "preview.png")]
        output: PathBuf,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Render the full clip
    Render {
        /// Source video
        source: PathBuf,

        /// Output file path (defaults to <SOURCE>_greensub.<container>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Print the engine command without running it
    Plan {
        /// Source video
        source: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Plan a preview at this timestamp instead of a render
        #[arg(long)]
        at: Option<f64>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Check that the engine and probe binaries are available
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => greensub_common::config::AppConfig::load_from(path),
        None => greensub_common::config::AppConfig::load(),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    greensub_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Preview {
            source,
            at,
            output,
            job,
        } => commands::preview::run(&config, source, at, output, job).await,
        Commands::Render {
            source,
            output,
            job,
        } => commands::render::run(&config, source, output, job).await,
        Commands::Plan {
            source,
            output,
            at,
            json,
            job,
        } => commands::plan::run(&config, source, output, at, json, job),
        Commands::Check => commands::check::run(&config),
    }
}
