use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "telephone")]
#[command(
    version,
    about = "Introspection by telephone: iterative prompt distillation experiments"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Path to the config file. Defaults to ./telephone.toml when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full five-phase experiment and save reports
    Run {
        /// Model used for responses and distillation
        #[arg(long)]
        model: Option<String>,

        /// Model used for cross-context evaluation
        #[arg(long)]
        evaluator_model: Option<String>,

        /// Iteration bound per distillation
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Directory for the JSON and Markdown reports
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Generator backend: fallback, command, http
        #[arg(long)]
        backend: Option<String>,

        /// Print the resolved configuration without generating anything
        #[arg(long)]
        dry_run: bool,

        /// Disable the progress display
        #[arg(long)]
        no_progress: bool,
    },
    /// List the experimental contexts
    Contexts {
        /// Only contexts framed as embodied
        #[arg(long)]
        embodied: bool,

        /// Only contexts framed as an AI assistant
        #[arg(long)]
        ai_assistant: bool,

        /// Only contexts with this valence: positive, neutral, negative
        #[arg(long)]
        valence: Option<String>,
    },
    /// Show one context
    Context { name: String },
    /// Distill a single text and print the iteration trail
    Distill {
        /// Text to distill
        text: String,

        /// Distillation method: with_history, telephone
        #[arg(short, long, default_value = "with_history")]
        method: String,

        /// Context to frame the conversation with
        #[arg(long)]
        context: Option<String>,

        /// Treat the text as a model response rather than a prompt
        #[arg(long)]
        response: bool,

        /// Iteration bound
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Generator backend: fallback, command, http
        #[arg(long)]
        backend: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default telephone.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    telephone::logging::init_subscriber(cli.verbose, cli.log_json);

    let project_dir = std::env::current_dir().context("Failed to get current directory")?;

    match &cli.command {
        Commands::Run {
            model,
            evaluator_model,
            max_iterations,
            output_dir,
            backend,
            dry_run,
            no_progress,
        } => {
            let overrides = cmd::cli_overrides(
                backend.as_deref(),
                model.clone(),
                evaluator_model.clone(),
                *max_iterations,
                output_dir.clone(),
            )?;
            cmd::cmd_run(&cli, &project_dir, overrides, *dry_run, *no_progress).await?;
        }
        Commands::Contexts {
            embodied,
            ai_assistant,
            valence,
        } => cmd::cmd_contexts(*embodied, *ai_assistant, valence.as_deref())?,
        Commands::Context { name } => cmd::cmd_context(name)?,
        Commands::Distill {
            text,
            method,
            context,
            response,
            max_iterations,
            backend,
            json,
        } => {
            let overrides =
                cmd::cli_overrides(backend.as_deref(), None, None, *max_iterations, None)?;
            cmd::cmd_distill(
                &cli,
                &project_dir,
                overrides,
                cmd::DistillArgs {
                    text,
                    method,
                    context: context.as_deref(),
                    response: *response,
                    json: *json,
                },
            )
            .await?;
        }
        Commands::Config { command } => {
            cmd::cmd_config(&project_dir, cli.config.as_deref(), command.clone())?
        }
    }

    Ok(())
}
