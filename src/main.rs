//! readwise-notion-sync CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use readwise_notion_sync::{
    commands::{
        cmd_init, cmd_status, cmd_sync, print_init_report, print_status, print_sync_report,
        InitOptions,
    },
    config::Config,
    error::Result,
    progress::LogWriterFactory,
    state::StateDb,
    sync::SyncWindow,
};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "readwise-notion-sync")]
#[command(version, about = "Incrementally mirror Readwise highlights into a Notion database", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file and create the state database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Sync highlights into Notion
    Sync {
        /// Only look at items highlighted in the last N days (ignores the watermark)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..), conflicts_with = "all")]
        days: Option<u32>,

        /// Full sync: look at every item regardless of the watermark
        #[arg(long)]
        all: bool,
    },

    /// Show watermark, credentials and the last run
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            let report = cmd_init(InitOptions::from_config_arg(cli.config, force)).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_init_report(&report);
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "readwise-notion-sync", &mut std::io::stdout());
        }

        Commands::Sync { days, all } => {
            let config = load_config(cli.config.as_deref())?;
            let db = StateDb::connect(&config).await?;

            let window = match (days, all) {
                (_, true) => SyncWindow::All,
                (Some(days), false) => SyncWindow::Days(days),
                (None, false) => SyncWindow::SinceWatermark,
            };

            let report = cmd_sync(&config, &db, window, !cli.json).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_sync_report(&report);
            }
        }

        Commands::Status => {
            let config = load_config(cli.config.as_deref())?;
            let db = StateDb::connect(&config).await?;
            let status = cmd_status(&config, &db).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

/// Load the config file, falling back to defaults plus environment when absent
fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    Config::load(&config_path)
}
