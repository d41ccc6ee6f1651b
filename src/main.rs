use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use sceneforge::commands::{
    cleanup_project, init_project, print_cleanup_result, print_validation_result,
    render_animation, show_status, validate_project, RenderOptions,
};
use sceneforge::models::{OutputFormat, QualityTier};

/// SceneForge - turn animation requests into rendered Manim videos
#[derive(Parser)]
#[command(name = "sceneforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new SceneForge project
    Init {
        /// Project directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Render an animation from a description
    Render {
        /// What to animate (prompted for when omitted)
        query: Option<String>,

        /// Quality tier
        #[arg(short, long, value_enum, default_value = "low")]
        quality: QualityTier,

        /// Output format
        #[arg(short, long, value_enum, default_value = "mp4")]
        format: OutputFormat,

        /// Output resolution, WIDTHxHEIGHT
        #[arg(short, long, default_value = "1920x1080")]
        resolution: String,

        /// Prior conversation this request continues
        #[arg(long)]
        conversation: Option<String>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,

        /// Override the model to use
        #[arg(long)]
        model: Option<String>,

        /// Override the Ollama URL
        #[arg(long)]
        url: Option<String>,

        /// Override the LLM timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Disable streaming output
        #[arg(long)]
        no_stream: bool,
    },

    /// Show run status
    Status {
        /// Show every recorded run
        #[arg(short, long)]
        verbose: bool,

        /// Show one run in detail
        #[arg(long)]
        run: Option<String>,
    },

    /// Validate config, rule files, renderer and model server
    Validate {
        /// Skip the renderer and Ollama checks
        #[arg(long)]
        offline: bool,
    },

    /// Remove leftover staged sources and prune finished runs
    Cleanup {
        /// Also mark runs still recorded as running as failed
        #[arg(long)]
        interrupted: bool,

        /// Show what would be removed without removing it
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Dispatch a command; `Ok(false)` means it ran but did not succeed
async fn run(command: Commands) -> anyhow::Result<bool> {
    let current_dir = std::env::current_dir().context("cannot determine the current directory")?;

    match command {
        Commands::Init { path } => {
            let project_root = path.unwrap_or(current_dir);
            init_project(&project_root)?;
            Ok(true)
        }

        Commands::Render {
            query,
            quality,
            format,
            resolution,
            conversation,
            json,
            model,
            url,
            timeout,
            no_stream,
        } => {
            let options = RenderOptions {
                query,
                quality: quality.code().to_string(),
                format: format.extension().to_string(),
                resolution,
                conversation,
                json,
                model,
                url,
                timeout,
                no_stream,
            };
            Ok(render_animation(&current_dir, options).await?)
        }

        Commands::Status { verbose, run } => {
            show_status(&current_dir, verbose, run.as_deref())?;
            Ok(true)
        }

        Commands::Validate { offline } => {
            let result = validate_project(&current_dir, offline).await?;
            print_validation_result(&result);
            Ok(result.valid)
        }

        Commands::Cleanup { interrupted, dry_run } => {
            let result = cleanup_project(&current_dir, interrupted, dry_run)
                .context("cleanup failed")?;
            print_cleanup_result(&result, dry_run);
            Ok(true)
        }
    }
}
