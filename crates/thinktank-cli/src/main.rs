//! `thinktank` -- send one prompt to many LLM providers at once.
//!
//! Provides the following subcommands:
//!
//! - `thinktank run` -- query several models concurrently and print each answer.
//! - `thinktank models` -- list the models each provider offers.
//! - `thinktank config` -- show the resolved configuration.

use clap::{Parser, Subcommand};

use thinktank_types::ThinktankError;

mod commands;
mod config_loader;
mod credentials;

/// thinktank multi-provider LLM CLI.
#[derive(Parser)]
#[command(name = "thinktank", about = "Send one prompt to many LLM providers", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Send a prompt to one or more models concurrently.
    Run(commands::run::RunArgs),

    /// List models available from the configured providers.
    Models(commands::models::ModelsArgs),

    /// Show resolved configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },
}

/// Subcommands for `thinktank config`.
#[derive(Subcommand)]
enum ConfigCmd {
    /// Display the full resolved configuration as JSON.
    Show {
        /// Config file path (overrides auto-discovery).
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Show which config file is used.
    Path {
        /// Config file path (overrides auto-discovery).
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries model output.
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dispatch(cli.command).await {
        report(&e);
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Models(args) => commands::models::run(args).await,
        Commands::Config { action } => match action {
            ConfigCmd::Show { config } => {
                let cfg = commands::load_config(config.as_deref())?;
                commands::config_cmd::config_show(&cfg)
            }
            ConfigCmd::Path { config } => {
                commands::config_cmd::config_path(config.as_deref());
                Ok(())
            }
        },
    }
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<ThinktankError>() {
        Some(e) => e.print(),
        None => eprintln!("error: {err:#}"),
    }
}
